//! Per-phase result tables of the unbalanced load flow.
//!
//! Rows follow the order of the input tables, including out-of-service and de-energized
//! entries. Excluded buses carry NaN voltages and zero power; excluded branches are NaN
//! throughout.

use num_complex::Complex64;
use serde::Serialize;

use super::{
    fortescue::{phase_admittance, sequence_to_phase, Triplet},
    island::BusIndexMap,
    loadflow::{SequenceLoadFlow, SequenceVoltages},
    network::{BranchKind, SequenceBranch, SequenceModel},
    sequence_net::SequenceNetworks,
};
use crate::basic::error::SolveFailure;

const NAN3: [f64; 3] = [f64::NAN; 3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BusResult3ph {
    pub index: i64,
    pub vm_pu: [f64; 3],
    pub va_degree: [f64; 3],
    /// Consumption positive.
    pub p_mw: [f64; 3],
    pub q_mvar: [f64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BranchResult3ph {
    pub index: i64,
    pub p_from_mw: [f64; 3],
    pub q_from_mvar: [f64; 3],
    pub p_to_mw: [f64; 3],
    pub q_to_mvar: [f64; 3],
    pub i_from_ka: [f64; 3],
    pub i_to_ka: [f64; 3],
    pub loading_percent_phase: [f64; 3],
    /// Highest phase loading.
    pub loading_percent: f64,
}

impl BranchResult3ph {
    fn excluded(index: i64) -> Self {
        Self {
            index,
            p_from_mw: NAN3,
            q_from_mvar: NAN3,
            p_to_mw: NAN3,
            q_to_mvar: NAN3,
            i_from_ka: NAN3,
            i_to_ka: NAN3,
            loading_percent_phase: NAN3,
            loading_percent: f64::NAN,
        }
    }

    /// Sum of the phase active powers at the from end.
    pub fn p_from_total_mw(&self) -> f64 {
        self.p_from_mw.iter().sum()
    }
}

/// Per-phase power delivered by the external grid into its bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtGridResult3ph {
    pub bus: i64,
    pub p_mw: [f64; 3],
    pub q_mvar: [f64; 3],
}

/// Outcome of [`run_pf_3ph`](super::run_pf_3ph).
#[derive(Debug, Clone, Serialize)]
pub struct UnbalancedPfResult {
    pub bus: Vec<BusResult3ph>,
    pub line: Vec<BranchResult3ph>,
    pub impedance: Vec<BranchResult3ph>,
    pub ext_grid: ExtGridResult3ph,
    pub iterations: usize,
    pub converged: bool,
    pub failure: Option<SolveFailure>,
}

fn split(s: &Triplet, scale: f64) -> ([f64; 3], [f64; 3]) {
    (
        std::array::from_fn(|p| s[p].re * scale),
        std::array::from_fn(|p| s[p].im * scale),
    )
}

/// Phase currents at both terminals of a branch, in per unit.
fn terminal_currents(branch: &SequenceBranch, v_f: &Triplet, v_t: &Triplet) -> (Triplet, Triplet) {
    let y_series = phase_admittance(&branch.series());
    let y_ff = phase_admittance(&(branch.series() + branch.shunt_from()));
    let y_tt = phase_admittance(&(branch.series() + branch.shunt_to()));
    (y_ff * v_f - y_series * v_t, y_tt * v_t - y_series * v_f)
}

fn branch_result(
    model: &SequenceModel,
    map: &BusIndexMap,
    branch: &SequenceBranch,
    v_abc: &[Triplet],
) -> BranchResult3ph {
    let ends = branch
        .in_service
        .then(|| map.branch(branch.from, branch.to))
        .flatten();
    let Some((f, t)) = ends else {
        return BranchResult3ph::excluded(branch.index);
    };
    let (v_f, v_t) = (&v_abc[f], &v_abc[t]);
    let (i_f, i_t) = terminal_currents(branch, v_f, v_t);

    let phase_base = model.sn_mva / 3.0;
    let (p_from_mw, q_from_mvar) = split(&v_f.component_mul(&i_f.conjugate()), phase_base);
    let (p_to_mw, q_to_mvar) = split(&v_t.component_mul(&i_t.conjugate()), phase_base);
    let (ib_f, ib_t) = (model.i_base_ka(branch.from), model.i_base_ka(branch.to));
    let i_from_ka: [f64; 3] = std::array::from_fn(|p| i_f[p].norm() * ib_f);
    let i_to_ka: [f64; 3] = std::array::from_fn(|p| i_t[p].norm() * ib_t);
    let loading_percent_phase: [f64; 3] =
        std::array::from_fn(|p| i_from_ka[p].max(i_to_ka[p]) / branch.rated_ka * 100.0);

    BranchResult3ph {
        index: branch.index,
        p_from_mw,
        q_from_mvar,
        p_to_mw,
        q_to_mvar,
        i_from_ka,
        i_to_ka,
        loading_percent_phase,
        loading_percent: loading_percent_phase.iter().copied().fold(f64::NAN, f64::max),
    }
}

/// Builds the result tables from the final sequence voltages.
pub fn extract_results(
    model: &SequenceModel,
    map: &BusIndexMap,
    nets: &SequenceNetworks,
    flow: &SequenceLoadFlow,
) -> UnbalancedPfResult {
    let v: &SequenceVoltages = &flow.v;
    let v_abc = v.to_phase();
    let i_net = nets.network_currents(v);
    let phase_base = model.sn_mva / 3.0;

    // network injection seen from each bus, generation positive
    let s_inj: Vec<Triplet> = (0..map.len())
        .map(|k| v_abc[k].component_mul(&sequence_to_phase(&i_net.at(k)).conjugate()))
        .collect();

    let bus = (0..model.buses.len())
        .map(|position| {
            let index = model.buses.ids[position];
            match map.internal(position) {
                Some(k) => {
                    let (p_mw, q_mvar) = split(&(-s_inj[k]), phase_base);
                    BusResult3ph {
                        index,
                        vm_pu: std::array::from_fn(|p| v_abc[k][p].norm()),
                        va_degree: std::array::from_fn(|p| v_abc[k][p].arg().to_degrees()),
                        p_mw,
                        q_mvar,
                    }
                }
                None => BusResult3ph {
                    index,
                    vm_pu: NAN3,
                    va_degree: NAN3,
                    p_mw: [0.0; 3],
                    q_mvar: [0.0; 3],
                },
            }
        })
        .collect();

    let branches = |kind: BranchKind| -> Vec<BranchResult3ph> {
        model
            .branches_of(kind)
            .map(|b| branch_result(model, map, b, &v_abc))
            .collect()
    };

    let src = map.source();
    let supplied: Triplet = s_inj[src] + model.demand[model.source.bus];
    let (p_mw, q_mvar) = split(&supplied, phase_base);

    UnbalancedPfResult {
        bus,
        line: branches(BranchKind::Line),
        impedance: branches(BranchKind::Impedance),
        ext_grid: ExtGridResult3ph {
            bus: model.buses.ids[model.source.bus],
            p_mw,
            q_mvar,
        },
        iterations: flow.iterations,
        converged: flow.converged,
        failure: flow.failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::three_phase::{fortescue::phase_to_sequence, network::SequencePi};

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_terminal_currents_match_sequence_pi() {
        let series = c(3.0, -12.0);
        let sh = c(0.0, 0.02);
        let pi1 = SequencePi {
            series,
            shunt_from: sh,
            shunt_to: sh,
        };
        let pi0 = SequencePi {
            series: c(1.0, -4.0),
            shunt_from: c(0.0, 0.01),
            shunt_to: c(0.0, 0.01),
        };
        let branch = SequenceBranch {
            kind: BranchKind::Line,
            index: 0,
            position: 0,
            from: 0,
            to: 1,
            in_service: true,
            rated_ka: 1.0,
            pi: [Some(pi0), Some(pi1), Some(pi1)],
        };
        let v_f012 = Triplet::new(c(0.01, 0.0), c(1.0, 0.0), c(0.0, 0.01));
        let v_t012 = Triplet::new(c(0.03, -0.01), c(0.95, -0.04), c(0.01, 0.02));
        let (i_f, i_t) = terminal_currents(
            &branch,
            &sequence_to_phase(&v_f012),
            &sequence_to_phase(&v_t012),
        );
        for (s, pi) in [pi0, pi1, pi1].iter().enumerate() {
            let expected_f = (pi.series + pi.shunt_from) * v_f012[s] - pi.series * v_t012[s];
            let expected_t = (pi.series + pi.shunt_to) * v_t012[s] - pi.series * v_f012[s];
            let got_f = phase_to_sequence(&i_f)[s];
            let got_t = phase_to_sequence(&i_t)[s];
            assert!((got_f - expected_f).norm() < 1e-12, "from, sequence {s}");
            assert!((got_t - expected_t).norm() < 1e-12, "to, sequence {s}");
        }
    }

    #[test]
    fn test_open_zero_sequence_blocks_common_mode_current() {
        let pi1 = SequencePi {
            series: c(3.0, -12.0),
            ..Default::default()
        };
        let branch = SequenceBranch {
            kind: BranchKind::Impedance,
            index: 0,
            position: 0,
            from: 0,
            to: 1,
            in_service: true,
            rated_ka: f64::NAN,
            pi: [None, Some(pi1), Some(pi1)],
        };
        let v0 = c(0.1, 0.0);
        let (i_f, _) = terminal_currents(
            &branch,
            &Triplet::new(v0, v0, v0),
            &Triplet::zeros(),
        );
        assert!(i_f.iter().all(|i| i.norm() < 1e-14));
    }

    #[test]
    fn test_aggregate_loading_is_phase_maximum() {
        let loading = [12.0, 47.5, 30.0];
        assert_eq!(loading.iter().copied().fold(f64::NAN, f64::max), 47.5);
        let excluded = BranchResult3ph::excluded(8);
        assert_eq!(excluded.index, 8);
        assert!(excluded.loading_percent.is_nan());
        assert!(excluded.p_from_total_mw().is_nan());
    }
}
