use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use super::sparse::{
    conj::RealImage,
    stack::{csc_hstack, csc_vstack},
};

#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[allow(non_snake_case)]
/// A trait for solving sparse linear systems.
pub trait Solve {
    /// Solves the sparse linear system in place.
    ///
    /// # Parameters
    ///
    /// * `Ap` - Column pointers of the matrix.
    /// * `Ai` - Row indices of the matrix.
    /// * `Ax` - Non-zero values of the matrix.
    /// * `b` - Right-hand side vector, overwritten with the solution.
    /// * `n` - Dimension of the system.
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        self.factorize(Ap, Ai, Ax, n)?;
        self.substitute(b)
    }

    /// Factorizes the matrix numerically and keeps the factors for [`Solve::substitute`].
    fn factorize(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Solves in place with the factors of the last [`Solve::factorize`].
    fn substitute(&mut self, b: &mut [f64]) -> Result<(), &'static str>;

    /// Drops the cached symbolic analysis and factors so the next call may use a new pattern.
    fn reset(&mut self);
}

/// A complex sparse system `A x = b` kept in its real block form
///
/// ```text
/// [ G  -B ] [ xr ]   [ br ]
/// [ B   G ] [ xi ] = [ bi ]
/// ```
///
/// so the real-valued backends behind [`Solve`] can factorize it.
/// The matrix is constant: it is factorized on the first solve and later
/// right-hand sides only substitute. A system must always be solved with the
/// same backend.
#[derive(Debug, Clone)]
pub(crate) struct ComplexSystem {
    col_offsets: Vec<usize>,
    row_indices: Vec<usize>,
    values: Vec<f64>,
    n: usize,
    factorized: bool,
}

impl ComplexSystem {
    pub fn new(a: &CscMatrix<Complex64>) -> Self {
        let n = a.nrows();
        let (g, b) = a.real_imag();
        let mut neg_b = b.clone();
        neg_b.values_mut().iter_mut().for_each(|x| *x = -*x);
        let expanded = csc_vstack(&[&csc_hstack(&[&g, &neg_b]), &csc_hstack(&[&b, &g])]);
        let (col_offsets, row_indices, values) = expanded.disassemble();
        Self {
            col_offsets,
            row_indices,
            values,
            n,
            factorized: false,
        }
    }

    pub fn solve<S: Solve>(
        &mut self,
        solver: &mut S,
        rhs: &DVector<Complex64>,
    ) -> Result<DVector<Complex64>, &'static str> {
        let n = self.n;
        if n == 0 {
            return Ok(DVector::zeros(0));
        }
        let mut b = vec![0.0; 2 * n];
        for (k, value) in rhs.iter().enumerate() {
            b[k] = value.re;
            b[k + n] = value.im;
        }
        if !self.factorized {
            solver.factorize(
                &mut self.col_offsets,
                &mut self.row_indices,
                &mut self.values,
                2 * n,
            )?;
            self.factorized = true;
        }
        solver.substitute(&mut b)?;
        Ok(DVector::from_fn(n, |k, _| Complex64::new(b[k], b[k + n])))
    }
}
