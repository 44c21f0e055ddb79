use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;
use simba::simd::SimdComplexField;

use super::{
    solver::Solve,
    sparse::{
        conj::{Conjugate, RealImage},
        slice::slice_csc_matrix_block,
        stack::{csc_hstack, csc_vstack},
    },
};

/// Final state of a Newton-Raphson run.
#[derive(Debug, Clone)]
pub struct NewtonOutcome {
    pub v: DVector<Complex64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Balanced Newton-Raphson power flow in polar coordinates.
///
/// The first `npq` buses are PQ buses with specified injections `Sbus`; all remaining buses are
/// slack buses held at their entry in `v_init`. Returns `Err` only when the linear solver fails;
/// running out of iterations is reported through [`NewtonOutcome::converged`].
#[allow(non_snake_case)]
pub fn newton_pf<Solver: Solve>(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    npq: usize,
    tolerance: Option<f64>,
    max_iter: Option<usize>,
    solver: &mut Solver,
) -> Result<NewtonOutcome, &'static str> {
    let max_iter = max_iter.unwrap_or(20);
    let tol = tolerance.unwrap_or(1e-8);
    let mut v = v_init.clone();

    let mut F = mismatch(Ybus, Sbus, &v, npq);
    if npq == 0 || F.amax() < tol {
        return Ok(NewtonOutcome {
            v,
            iterations: 0,
            converged: true,
        });
    }

    solver.reset();
    let mut v_m = v.map(|e| e.simd_modulus());
    let mut v_a = v.map(|e| e.simd_argument());
    for iterations in 1..=max_iter {
        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v);
        let jacobian = build_jacobian(&dS_dVm, &dS_dVa, npq);
        let n = jacobian.nrows();
        let (mut Ap, mut Ai, mut Ax) = jacobian.disassemble();
        solver.solve(&mut Ap, &mut Ai, &mut Ax, F.as_mut_slice(), n)?;

        update_v(&mut v, &mut v_a, &mut v_m, &F, npq);
        F = mismatch(Ybus, Sbus, &v, npq);
        if !F.iter().all(|x| x.is_finite()) {
            return Ok(NewtonOutcome {
                v,
                iterations,
                converged: false,
            });
        }
        if F.amax() < tol {
            return Ok(NewtonOutcome {
                v,
                iterations,
                converged: true,
            });
        }
    }
    Ok(NewtonOutcome {
        v,
        iterations: max_iter,
        converged: false,
    })
}

/// Stacked real/imaginary power mismatch of the PQ buses.
#[allow(non_snake_case)]
fn mismatch(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v: &DVector<Complex64>,
    npq: usize,
) -> DVector<f64> {
    let mis = v.component_mul(&(Ybus * v).conjugate()) - Sbus;
    DVector::from_fn(2 * npq, |k, _| {
        if k < npq {
            mis[k].re
        } else {
            mis[k - npq].im
        }
    })
}

#[inline(always)]
fn update_v(
    v: &mut DVector<Complex64>,
    v_a: &mut DVector<f64>,
    v_m: &mut DVector<f64>,
    dx: &DVector<f64>,
    npq: usize,
) {
    for k in 0..npq {
        v_a[k] -= dx[k];
        v_m[k] -= dx[npq + k];
        v[k] = Complex64::from_polar(v_m[k], v_a[k]);
    }
}

#[inline(always)]
fn diag(values: &DVector<Complex64>) -> CscMatrix<Complex64> {
    let mut d = CscMatrix::identity(values.len());
    d.values_mut().copy_from_slice(values.as_slice());
    d
}

/// Partial derivatives of the complex bus injections with respect to voltage magnitude and angle.
///
/// Complex matrix formulation from R. D. Zimmerman, "AC Power Flows, Generalized OPF Costs and
/// their Derivatives using Complex Matrix Notation", MATPOWER Technical Note 2, 2010.
#[allow(non_snake_case)]
fn dSbus_dV(
    Ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let ibus = Ybus * v;
    let diagV = diag(v);
    let diagVnorm = diag(&v.map(|e| e.simd_signum()));
    let diagIbus = diag(&ibus);

    let dS_dVm = &diagV * (Ybus * &diagVnorm).conjugate() + diagIbus.conjugate() * &diagVnorm;
    let dS_dVa = &diagV * (diagIbus - Ybus * &diagV).conjugate() * Complex64::i();
    (dS_dVm, dS_dVa)
}

/// Assembles `[[dP/dVa, dP/dVm], [dQ/dVa, dQ/dVm]]` restricted to the PQ buses.
#[allow(non_snake_case)]
#[inline(always)]
fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    npq: usize,
) -> CscMatrix<f64> {
    let (J11, J21) = slice_csc_matrix_block(ds_dva, (0, 0), (npq, npq)).real_imag();
    let (J12, J22) = slice_csc_matrix_block(ds_dvm, (0, 0), (npq, npq)).real_imag();
    csc_vstack(&[&csc_hstack(&[&J11, &J12]), &csc_hstack(&[&J21, &J22])])
}
