use std::iter::once;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use serde::Serialize;
use tracing::{debug, warn};

use super::{
    fortescue::Triplet,
    island::BusIndexMap,
    network::{BranchKind, Sequence, SequenceBranch, SequenceModel},
    sequence_net::SequenceNetworks,
};
use crate::basic::{
    newtonpf::{newton_pf, NewtonOutcome},
    solver::Solve,
    sparse::cast::Cast,
};

/// Permutation that moves the source bus to the end, keeping the order of the others.
fn slack_last_permutation(n: usize, source: usize) -> CscMatrix<Complex64> {
    let mut perm = CooMatrix::<f64>::new(n, n);
    (0..n)
        .filter(|&bus| bus != source)
        .chain(once(source))
        .enumerate()
        .for_each(|(row, bus)| perm.push(row, bus, 1.0));
    CscMatrix::from(&perm).cast()
}

/// Balanced injection per bus: the negated mean of its phase demands.
pub fn balanced_injection(demand: &[Triplet]) -> DVector<Complex64> {
    DVector::from_iterator(
        demand.len(),
        demand.iter().map(|s| -(s[0] + s[1] + s[2]) / 3.0),
    )
}

/// Every internal bus at the source voltage.
pub fn flat_start(nets: &SequenceNetworks) -> DVector<Complex64> {
    DVector::from_element(nets.n_bus(), nets.v_source)
}

/// Newton-Raphson on the positive-sequence network with the source as slack.
///
/// Voltages are returned over the internal index.
pub fn solve_positive_sequence<S: Solve + Default>(
    nets: &SequenceNetworks,
    demand: &[Triplet],
    tol: f64,
    max_it: usize,
) -> Result<NewtonOutcome, &'static str> {
    let n = nets.n_bus();
    let perm = slack_last_permutation(n, nets.source);
    let perm_t = perm.transpose();
    let y_bus = &perm * &(nets.matrix(Sequence::Positive) * &perm_t);
    let s_bus = &perm * &balanced_injection(demand);
    let v_init = &perm * &flat_start(nets);

    let mut solver = S::default();
    let outcome = newton_pf(
        &y_bus,
        &s_bus,
        &v_init,
        n - 1,
        Some(tol),
        Some(max_it),
        &mut solver,
    )?;
    Ok(NewtonOutcome {
        v: &perm_t * &outcome.v,
        ..outcome
    })
}

/// Positive-sequence seed for the unbalanced iteration.
///
/// Falls back to a flat start when the balanced solve fails or does not converge.
pub fn balanced_seed<S: Solve + Default>(
    nets: &SequenceNetworks,
    demand: &[Triplet],
    tol: f64,
    max_it: usize,
) -> DVector<Complex64> {
    match solve_positive_sequence::<S>(nets, demand, tol, max_it) {
        Ok(outcome) if outcome.converged => {
            debug!(iterations = outcome.iterations, "balanced seed ready");
            outcome.v
        }
        Ok(outcome) => {
            warn!(
                iterations = outcome.iterations,
                "balanced seed did not converge, using flat start"
            );
            flat_start(nets)
        }
        Err(msg) => {
            warn!(reason = msg, "balanced seed failed, using flat start");
            flat_start(nets)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalancedBusResult {
    pub index: i64,
    pub vm_pu: f64,
    pub va_degree: f64,
}

/// Three-phase totals of a branch under balanced operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalancedBranchResult {
    pub index: i64,
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub i_from_ka: f64,
    pub i_to_ka: f64,
    pub loading_percent: f64,
}

impl BalancedBranchResult {
    fn excluded(index: i64) -> Self {
        Self {
            index,
            p_from_mw: f64::NAN,
            q_from_mvar: f64::NAN,
            p_to_mw: f64::NAN,
            q_to_mvar: f64::NAN,
            i_from_ka: f64::NAN,
            i_to_ka: f64::NAN,
            loading_percent: f64::NAN,
        }
    }
}

/// Positive-sequence load flow, rows in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BalancedPfResult {
    pub bus: Vec<BalancedBusResult>,
    pub line: Vec<BalancedBranchResult>,
    pub impedance: Vec<BalancedBranchResult>,
    pub iterations: usize,
    pub converged: bool,
}

fn balanced_branch(
    model: &SequenceModel,
    map: &BusIndexMap,
    branch: &SequenceBranch,
    v: &DVector<Complex64>,
) -> BalancedBranchResult {
    let ends = branch
        .in_service
        .then(|| map.branch(branch.from, branch.to))
        .flatten();
    let Some((f, t)) = ends else {
        return BalancedBranchResult::excluded(branch.index);
    };
    let pi = branch.pi[Sequence::Positive.index()].unwrap_or_default();
    let (v_f, v_t) = (v[f], v[t]);
    let i_f = (pi.series + pi.shunt_from) * v_f - pi.series * v_t;
    let i_t = (pi.series + pi.shunt_to) * v_t - pi.series * v_f;
    let s_f = v_f * i_f.conj() * model.sn_mva;
    let s_t = v_t * i_t.conj() * model.sn_mva;
    let i_from_ka = i_f.norm() * model.i_base_ka(branch.from);
    let i_to_ka = i_t.norm() * model.i_base_ka(branch.to);
    BalancedBranchResult {
        index: branch.index,
        p_from_mw: s_f.re,
        q_from_mvar: s_f.im,
        p_to_mw: s_t.re,
        q_to_mvar: s_t.im,
        i_from_ka,
        i_to_ka,
        loading_percent: i_from_ka.max(i_to_ka) / branch.rated_ka * 100.0,
    }
}

/// Maps internal positive-sequence voltages back to the input tables.
pub fn balanced_results(
    model: &SequenceModel,
    map: &BusIndexMap,
    outcome: &NewtonOutcome,
) -> BalancedPfResult {
    let v = &outcome.v;
    let bus = (0..model.buses.len())
        .map(|position| {
            let (vm_pu, va_degree) = match map.internal(position) {
                Some(k) => (v[k].norm(), v[k].arg().to_degrees()),
                None => (f64::NAN, f64::NAN),
            };
            BalancedBusResult {
                index: model.buses.ids[position],
                vm_pu,
                va_degree,
            }
        })
        .collect();
    let branches = |kind: BranchKind| -> Vec<BalancedBranchResult> {
        model
            .branches_of(kind)
            .map(|b| balanced_branch(model, map, b, v))
            .collect()
    };
    BalancedPfResult {
        bus,
        line: branches(BranchKind::Line),
        impedance: branches(BranchKind::Impedance),
        iterations: outcome.iterations,
        converged: outcome.converged,
    }
}
