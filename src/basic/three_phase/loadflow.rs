//! Fixed-point iteration on the decoupled sequence networks.
//!
//! Each step maps the sequence voltages to phase voltages, evaluates the constant-power
//! phase currents, transforms them back, and solves the three sequence systems:
//!
//! ```text
//! Y0 · V0 = I0
//! Y1ff · V1f = I1f − Y1fs · V_source
//! Y2 · V2 = I2
//! ```

use derive_more::{Deref, DerefMut};
use nalgebra::DVector;
use num_complex::Complex64;
use tracing::{debug, info, warn};

use super::{
    fortescue::{phase_to_sequence_buses, sequence_to_phase_buses, Triplet},
    network::Sequence,
    sequence_net::SequenceNetworks,
};
use crate::basic::{
    error::SolveFailure,
    solver::{ComplexSystem, Solve},
};

/// Bus voltages per sequence, `[V0, V1, V2]`, over the internal index.
#[derive(Debug, Clone, PartialEq, Deref, DerefMut)]
pub struct SequenceVoltages(pub [DVector<Complex64>; 3]);

/// Bus current injections per sequence, `[I0, I1, I2]`, over the internal index.
#[derive(Debug, Clone, PartialEq, Deref, DerefMut)]
pub struct SequenceCurrents(pub [DVector<Complex64>; 3]);

impl SequenceVoltages {
    /// `V1 = seed`, `V1[source] = v_source`, `V0 = V2 = 0`.
    pub fn initial(seed: &DVector<Complex64>, source: usize, v_source: Complex64) -> Self {
        let n = seed.len();
        let mut v1 = seed.clone();
        if source < n {
            v1[source] = v_source;
        }
        Self([DVector::zeros(n), v1, DVector::zeros(n)])
    }

    pub fn n_bus(&self) -> usize {
        self.0[1].len()
    }

    /// Sequence components of one bus.
    pub fn at(&self, bus: usize) -> Triplet {
        Triplet::new(self.0[0][bus], self.0[1][bus], self.0[2][bus])
    }

    pub fn to_phase(&self) -> Vec<Triplet> {
        sequence_to_phase_buses(&self.0)
    }

    /// Largest complex change over all buses and sequences.
    pub fn max_delta(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .flat_map(|(a, b)| a.iter().zip(b.iter()).map(|(x, y)| (x - y).norm()))
            .fold(0.0, f64::max)
    }

    fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.iter().all(|x| x.is_finite()))
    }
}

impl SequenceCurrents {
    pub fn at(&self, bus: usize) -> Triplet {
        Triplet::new(self.0[0][bus], self.0[1][bus], self.0[2][bus])
    }

    fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.iter().all(|x| x.is_finite()))
    }
}

/// Constant-power phase currents in injection convention, as sequence components.
///
/// `I_abc = conj(−S_abc / V_abc)` per bus and phase; phases without demand inject nothing,
/// whatever their voltage.
pub fn load_currents(v: &SequenceVoltages, demand: &[Triplet]) -> SequenceCurrents {
    let i_abc: Vec<Triplet> = v
        .to_phase()
        .iter()
        .zip(demand)
        .map(|(v_abc, s_abc)| {
            Triplet::from_fn(|p, _| {
                if s_abc[p] == Complex64::new(0.0, 0.0) {
                    Complex64::new(0.0, 0.0)
                } else {
                    (-s_abc[p] / v_abc[p]).conj()
                }
            })
        })
        .collect();
    SequenceCurrents(phase_to_sequence_buses(&i_abc))
}

/// The three sequence systems with their factorization state.
///
/// Y0 and Y2 cover every internal bus; Y1 only the non-source buses.
pub struct SequenceSolvers<S: Solve> {
    systems: [ComplexSystem; 3],
    backends: [S; 3],
    y_fs: DVector<Complex64>,
    free: Vec<usize>,
    source: usize,
    v_source: Complex64,
}

impl<S: Solve + Default> SequenceSolvers<S> {
    pub fn new(nets: &SequenceNetworks) -> Self {
        let reduced = nets.reduce_positive();
        Self {
            systems: [
                ComplexSystem::new(nets.matrix(Sequence::Zero)),
                ComplexSystem::new(&reduced.y_ff),
                ComplexSystem::new(nets.matrix(Sequence::Negative)),
            ],
            backends: std::array::from_fn(|_| S::default()),
            y_fs: reduced.y_fs,
            free: reduced.free,
            source: nets.source,
            v_source: nets.v_source,
        }
    }
}

impl<S: Solve> SequenceSolvers<S> {
    /// Solves all three sequence networks for the given injections.
    pub fn solve_sequences(
        &mut self,
        i: &SequenceCurrents,
    ) -> Result<SequenceVoltages, SolveFailure> {
        let Self {
            systems,
            backends,
            y_fs,
            free,
            source,
            v_source,
        } = self;
        let n = i[1].len();
        let mut solve = |seq: Sequence, rhs: &DVector<Complex64>| {
            let k = seq.index();
            systems[k]
                .solve(&mut backends[k], rhs)
                .map_err(|msg| {
                    warn!(sequence = %seq, reason = msg, "sequence solve failed");
                    SolveFailure::Singular(seq)
                })
        };

        let v0 = solve(Sequence::Zero, &i[0])?;
        let v2 = solve(Sequence::Negative, &i[2])?;

        let mut v1 = DVector::from_element(n, *v_source);
        if !free.is_empty() {
            let rhs = DVector::from_iterator(
                free.len(),
                free.iter()
                    .zip(y_fs.iter())
                    .map(|(&bus, y)| i[1][bus] - y * *v_source),
            );
            let v1_free = solve(Sequence::Positive, &rhs)?;
            for (&bus, v) in free.iter().zip(v1_free.iter()) {
                v1[bus] = *v;
            }
        }
        v1[*source] = *v_source;

        Ok(SequenceVoltages([v0, v1, v2]))
    }
}

/// Final state of the sequence iteration.
#[derive(Debug, Clone)]
pub struct SequenceLoadFlow {
    pub v: SequenceVoltages,
    pub iterations: usize,
    pub converged: bool,
    pub failure: Option<SolveFailure>,
}

impl SequenceLoadFlow {
    fn stopped(v: SequenceVoltages, iterations: usize, failure: SolveFailure) -> Self {
        warn!(iterations, %failure, "unbalanced load flow stopped");
        Self {
            v,
            iterations,
            converged: false,
            failure: Some(failure),
        }
    }
}

/// Runs the sequence-domain fixed-point iteration.
///
/// `demand` is the per-phase complex demand of every internal bus in per unit of `S_base / 3`;
/// `seed` the initial positive-sequence voltages. Never fails: singular networks and
/// divergence are reported on the returned state.
pub fn solve_unbalanced<S: Solve + Default>(
    nets: &SequenceNetworks,
    demand: &[Triplet],
    seed: &DVector<Complex64>,
    tol: f64,
    max_it: usize,
) -> SequenceLoadFlow {
    let mut v = SequenceVoltages::initial(seed, nets.source, nets.v_source);

    for seq in Sequence::ALL {
        if let Some(bus) = nets.ungrounded_bus(seq) {
            debug!(sequence = %seq, bus, "no path to ground");
            return SequenceLoadFlow::stopped(v, 0, SolveFailure::Singular(seq));
        }
    }

    let mut solvers = SequenceSolvers::<S>::new(nets);
    for iteration in 1..=max_it {
        let i = load_currents(&v, demand);
        if !i.is_finite() {
            return SequenceLoadFlow::stopped(v, iteration - 1, SolveFailure::Diverged);
        }
        let v_new = match solvers.solve_sequences(&i) {
            Ok(v_new) => v_new,
            Err(failure) => return SequenceLoadFlow::stopped(v, iteration, failure),
        };
        if !v_new.is_finite() {
            return SequenceLoadFlow::stopped(v, iteration, SolveFailure::Diverged);
        }

        let delta = v_new.max_delta(&v);
        v = v_new;
        debug!(iteration, delta, "sequence iteration");
        if delta < tol {
            info!(iterations = iteration, "unbalanced load flow converged");
            return SequenceLoadFlow {
                v,
                iterations: iteration,
                converged: true,
                failure: None,
            };
        }
    }

    warn!(max_it, "unbalanced load flow did not converge");
    SequenceLoadFlow {
        v,
        iterations: max_it,
        converged: false,
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{
        solver::DefaultSolver,
        three_phase::{
            fortescue::{phase_to_sequence, sequence_to_phase, A, A2},
            network::{
                BranchKind, BusTable, PhaseDemand, SequenceBranch, SequenceModel, SequencePi,
                SourceEquivalent,
            },
            sequence_net::build_sequence_networks,
        },
    };

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn two_bus(demand: Triplet, zero_branch: bool) -> (SequenceNetworks, Vec<Triplet>) {
        let pi = |y: Complex64| SequencePi {
            series: y,
            shunt_from: c(0.0, 0.01),
            shunt_to: c(0.0, 0.01),
        };
        let model = SequenceModel {
            buses: BusTable {
                ids: vec![0, 1],
                vn_kv: vec![110.0; 2],
                in_service: vec![true; 2],
            },
            branches: vec![SequenceBranch {
                kind: BranchKind::Line,
                index: 0,
                position: 0,
                from: 0,
                to: 1,
                in_service: true,
                rated_ka: 1.0,
                pi: [
                    zero_branch.then(|| pi(c(1.0, -4.0))),
                    Some(pi(c(3.0, -12.0))),
                    Some(pi(c(3.0, -12.0))),
                ],
            }],
            shunts: vec![],
            source: SourceEquivalent {
                bus: 0,
                v1: c(1.0, 0.0),
                y: Triplet::new(c(2.0, -20.0), c(4.0, -40.0), c(4.0, -40.0)),
            },
            demand: PhaseDemand(vec![Triplet::zeros(), demand]),
            sn_mva: 100.0,
        };
        let map = model.bus_index_map();
        (
            build_sequence_networks(&model, &map),
            vec![Triplet::zeros(), demand],
        )
    }

    #[test]
    fn test_load_currents_single_phase() {
        let v = SequenceVoltages([
            DVector::zeros(1),
            DVector::from_element(1, c(1.0, 0.0)),
            DVector::zeros(1),
        ]);
        let s = c(0.3, 0.1);
        let i = load_currents(&v, &[Triplet::new(s, c(0.0, 0.0), c(0.0, 0.0))]);
        // a single-phase load splits equally into the three sequences
        let ia = -s.conj();
        for k in 0..3 {
            assert!((i[k][0] - ia / 3.0).norm() < 1e-15, "sequence {k}: {}", i[k][0]);
        }
    }

    #[test]
    fn test_load_currents_balanced_is_positive_only() {
        let v1 = c(0.97, -0.05);
        let v = SequenceVoltages([
            DVector::zeros(1),
            DVector::from_element(1, v1),
            DVector::zeros(1),
        ]);
        let s = c(0.2, 0.05);
        let i = load_currents(&v, &[Triplet::new(s, s, s)]);
        assert!(i[0][0].norm() < 1e-15);
        assert!(i[2][0].norm() < 1e-15);
        assert!((i[1][0] - (-s / v1).conj()).norm() < 1e-14);
    }

    #[test]
    fn test_load_currents_zero_demand_at_zero_voltage() {
        let v = SequenceVoltages([DVector::zeros(1), DVector::zeros(1), DVector::zeros(1)]);
        let i = load_currents(&v, &[Triplet::zeros()]);
        assert!(i.is_finite());
        let i = load_currents(&v, &[Triplet::new(c(0.1, 0.0), c(0.0, 0.0), c(0.0, 0.0))]);
        assert!(!i.is_finite());
    }

    #[test]
    fn test_solve_sequences_satisfies_networks() {
        let (nets, _) = two_bus(Triplet::zeros(), true);
        let mut solvers = SequenceSolvers::<DefaultSolver>::new(&nets);
        let i = SequenceCurrents([
            DVector::from_vec(vec![c(0.0, 0.0), c(-0.1, 0.02)]),
            DVector::from_vec(vec![c(0.0, 0.0), c(-0.3, 0.1)]),
            DVector::from_vec(vec![c(0.0, 0.0), c(0.05, 0.0)]),
        ]);
        let v = solvers.solve_sequences(&i).unwrap();
        assert_eq!(v[1][0], c(1.0, 0.0));
        for seq in [Sequence::Zero, Sequence::Negative] {
            let r = nets.matrix(seq) * &v[seq.index()] - &i[seq.index()];
            assert!(r.iter().all(|x| x.norm() < 1e-12), "{seq} residual {r}");
        }
        // positive sequence residual holds at the free bus only
        let r1 = nets.matrix(Sequence::Positive) * &v[1] - &i[1];
        assert!(r1[1].norm() < 1e-12, "positive residual {}", r1[1]);
    }

    /// Counts numeric factorizations of the wrapped backend.
    #[derive(Default)]
    struct CountingSolver {
        inner: DefaultSolver,
        factorizations: usize,
    }

    #[allow(non_snake_case)]
    impl Solve for CountingSolver {
        fn factorize(
            &mut self,
            Ap: &mut [usize],
            Ai: &mut [usize],
            Ax: &mut [f64],
            n: usize,
        ) -> Result<(), &'static str> {
            self.factorizations += 1;
            self.inner.factorize(Ap, Ai, Ax, n)
        }

        fn substitute(&mut self, b: &mut [f64]) -> Result<(), &'static str> {
            self.inner.substitute(b)
        }

        fn reset(&mut self) {
            self.inner.reset();
        }
    }

    #[test]
    fn test_sequence_matrices_factorized_once() {
        let demand = Triplet::new(c(0.3, 0.1), c(0.05, 0.02), c(0.1, 0.0));
        let (nets, demand) = two_bus(demand, true);
        let mut solvers = SequenceSolvers::<CountingSolver>::new(&nets);
        let seed = DVector::from_element(2, c(1.0, 0.0));
        let mut v = SequenceVoltages::initial(&seed, 0, c(1.0, 0.0));
        for _ in 0..5 {
            v = solvers.solve_sequences(&load_currents(&v, &demand)).unwrap();
        }
        let counts: Vec<usize> = solvers.backends.iter().map(|b| b.factorizations).collect();
        assert_eq!(counts, vec![1, 1, 1]);
    }

    #[test]
    fn test_unbalanced_two_bus_converges() {
        let demand = Triplet::new(c(0.3, 0.1), c(0.05, 0.02), c(0.1, 0.0));
        let (nets, demand) = two_bus(demand, true);
        let seed = DVector::from_element(2, c(1.0, 0.0));
        let out = solve_unbalanced::<DefaultSolver>(&nets, &demand, &seed, 1e-10, 50);
        assert!(out.converged, "{:?}", out.failure);
        assert!(out.failure.is_none());

        // fixed point: phase currents drawn by the network equal the demand currents
        let i_net = nets.network_currents(&out.v);
        let v_abc = sequence_to_phase(&out.v.at(1));
        let i_abc = sequence_to_phase(&i_net.at(1));
        for p in 0..3 {
            let s = -v_abc[p] * i_abc[p].conj();
            assert!((s - demand[1][p]).norm() < 1e-8, "phase {p}: {s}");
        }
        // unbalanced demand drives zero and negative sequence voltages
        assert!(out.v[0][1].norm() > 1e-4);
        assert!(out.v[2][1].norm() > 1e-4);
    }

    #[test]
    fn test_balanced_demand_keeps_sequences_decoupled() {
        let s = c(0.2, 0.05);
        let (nets, demand) = two_bus(Triplet::new(s, s, s), true);
        let seed = DVector::from_element(2, c(1.0, 0.0));
        let out = solve_unbalanced::<DefaultSolver>(&nets, &demand, &seed, 1e-10, 50);
        assert!(out.converged);
        assert!(out.v[0].iter().all(|x| x.norm() < 1e-12));
        assert!(out.v[2].iter().all(|x| x.norm() < 1e-12));
        let v_abc = sequence_to_phase(&out.v.at(1));
        assert!((v_abc[1] - A2 * v_abc[0]).norm() < 1e-12);
        assert!((v_abc[2] - A * v_abc[0]).norm() < 1e-12);
        assert!((phase_to_sequence(&v_abc)[1] - out.v[1][1]).norm() < 1e-12);
    }

    #[test]
    fn test_ungrounded_zero_sequence_is_reported() {
        let (nets, demand) = two_bus(Triplet::new(c(0.1, 0.0), c(0.0, 0.0), c(0.0, 0.0)), false);
        let seed = DVector::from_element(2, c(1.0, 0.0));
        let out = solve_unbalanced::<DefaultSolver>(&nets, &demand, &seed, 1e-8, 30);
        assert!(!out.converged);
        assert_eq!(out.iterations, 0);
        assert_eq!(out.failure, Some(SolveFailure::Singular(Sequence::Zero)));
    }

    #[test]
    fn test_iteration_cap() {
        let (nets, demand) = two_bus(Triplet::new(c(0.3, 0.1), c(0.0, 0.0), c(0.1, 0.0)), true);
        let seed = DVector::from_element(2, c(1.0, 0.0));
        let out = solve_unbalanced::<DefaultSolver>(&nets, &demand, &seed, 1e-14, 1);
        assert!(!out.converged);
        assert!(out.failure.is_none());
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn test_source_bus_only() {
        let s = c(0.1, 0.02);
        let model = SequenceModel {
            buses: BusTable {
                ids: vec![7],
                vn_kv: vec![20.0],
                in_service: vec![true],
            },
            branches: vec![],
            shunts: vec![],
            source: SourceEquivalent {
                bus: 0,
                v1: c(1.02, 0.0),
                y: Triplet::new(c(1.0, -10.0), c(2.0, -20.0), c(2.0, -20.0)),
            },
            demand: PhaseDemand(vec![Triplet::new(s, c(0.0, 0.0), c(0.0, 0.0))]),
            sn_mva: 10.0,
        };
        let nets = build_sequence_networks(&model, &model.bus_index_map());
        let seed = DVector::from_element(1, c(1.0, 0.0));
        let out = solve_unbalanced::<DefaultSolver>(&nets, &model.demand, &seed, 1e-10, 30);
        assert!(out.converged, "{:?}", out.failure);
        assert_eq!(out.v[1][0], c(1.02, 0.0));
        // the source equivalent carries the zero and negative sequence unbalance
        assert!(out.v[0][0].norm() > 1e-4);
        assert!(out.v[2][0].norm() > 1e-4);
    }
}
