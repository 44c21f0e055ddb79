use faer::{
    MatMut,
    linalg::solvers::Solve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::Solve as PoSolve;

/// Sparse LU backend on top of `faer`, caching the symbolic factorization
/// and the factors of the last numeric factorization.
#[derive(Default)]
pub struct FaerSolver {
    symbolic: Option<SymbolicLu<usize>>,
    numeric: Option<Lu<usize, f64>>,
}

#[allow(non_snake_case)]
impl PoSolve for FaerSolver {
    fn factorize(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        self.numeric = None;
        let s = SymbolicSparseColMatRef::new_checked(n, n, Ap, None, Ai);
        let mat = SparseColMatRef::new(s, Ax);
        let symbolic = match self.symbolic.take() {
            Some(symbolic) => symbolic,
            None => SymbolicLu::try_new(s).map_err(|_| "Faer symbolic error")?,
        };
        let lu = Lu::try_new_with_symbolic(symbolic.clone(), mat)
            .map_err(|_| "Faer numerical error")?;
        self.symbolic = Some(symbolic);
        self.numeric = Some(lu);
        Ok(())
    }

    fn substitute(&mut self, b: &mut [f64]) -> Result<(), &'static str> {
        let lu = self.numeric.as_ref().ok_or("no factorization to solve with")?;
        let n = b.len();
        lu.solve_in_place(MatMut::from_column_major_slice_mut(b, n, 1));
        if b.iter().any(|v| !v.is_finite()) {
            return Err("LU solve produced non-finite values");
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
        self.numeric = None;
    }
}
