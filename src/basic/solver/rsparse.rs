use rsparse::{
    data::{self, Nmrc, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// Sparse LU backend on top of `rsparse`.
///
/// The column ordering is computed on the first factorization and kept until
/// [`Solve::reset`]. The factors of the last factorization are kept for
/// [`Solve::substitute`].
#[derive(Default)]
pub struct RSparseSolver {
    work: Vec<f64>,
    symbolic: Option<Symb>,
    numeric: Option<Nmrc<f64>>,
}

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
    fn factorize(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        if Ap.len() != n + 1 {
            return Err("dimension mismatch");
        }
        let a = data::Sprs {
            m: n,
            n,
            i: Ai.to_vec(),
            p: Ap.iter().map(|&v| v as isize).collect(),
            x: Ax.to_vec(),
            nzmax: Ax.len(),
        };
        let symbolic = self.symbolic.get_or_insert_with(|| sqr(&a, 1, false));
        self.numeric = None;
        let numeric = lu(&a, symbolic, 1e-6).map_err(|_| "LU factorization failed")?;
        self.numeric = Some(numeric);
        self.work.resize(n, 0.0);
        Ok(())
    }

    fn substitute(&mut self, b: &mut [f64]) -> Result<(), &'static str> {
        let (Some(symbolic), Some(numeric)) = (&self.symbolic, &self.numeric) else {
            return Err("no factorization to solve with");
        };
        if b.len() != self.work.len() {
            return Err("dimension mismatch");
        }
        permute(&numeric.pinv, b, &mut self.work); // x = P*b
        lsolve(&numeric.l, &mut self.work); // x = L\x
        usolve(&numeric.u, &mut self.work); // x = U\x
        permute(&symbolic.q, &self.work, b); // b = Q*x
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

fn permute(p: &Option<Vec<isize>>, b: &[f64], x: &mut [f64]) {
    match p {
        Some(p) => {
            for (k, &value) in b.iter().enumerate() {
                x[p[k] as usize] = value;
            }
        }
        None => x.copy_from_slice(b),
    }
}
