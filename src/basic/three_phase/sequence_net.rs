use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use super::{
    fortescue::Triplet,
    island::{BusIndexMap, NodeMerge},
    loadflow::SequenceCurrents,
    loadflow::SequenceVoltages,
    network::{Sequence, SequenceModel},
};

/// Zero, positive and negative sequence admittance matrices over the internal bus index.
///
/// All three share the ordering of the [`BusIndexMap`] they were built from.
#[derive(Debug, Clone)]
pub struct SequenceNetworks {
    pub y: [CscMatrix<Complex64>; 3],
    /// Internal index of the source bus.
    pub source: usize,
    /// Boundary voltage of the positive sequence at the source.
    pub v_source: Complex64,
    /// Source equivalent stamped on the source diagonal.
    pub source_shunt: Triplet,
}

/// Positive-sequence system with the source eliminated.
///
/// `y_ff · V_free = I_free − y_fs · V_source`
#[derive(Debug, Clone)]
pub struct PositiveReduction {
    pub y_ff: CscMatrix<Complex64>,
    pub y_fs: DVector<Complex64>,
    /// Internal index of each reduced unknown.
    pub free: Vec<usize>,
}

/// Assembles Y0, Y1 and Y2.
///
/// Each in-service branch with both ends included is stamped as
/// `Y[f,f] += y + y_sh_f`, `Y[t,t] += y + y_sh_t`, `Y[f,t] = Y[t,f] -= y`
/// in every sequence where it is closed. Bus shunts and the source equivalent
/// go to the diagonal.
pub fn build_sequence_networks(model: &SequenceModel, map: &BusIndexMap) -> SequenceNetworks {
    let n = map.len();
    let zero = Complex64::new(0.0, 0.0);
    let mut coo: [CooMatrix<Complex64>; 3] = std::array::from_fn(|_| CooMatrix::new(n, n));
    for mat in coo.iter_mut() {
        for i in 0..n {
            mat.push(i, i, zero);
        }
    }

    for branch in model.branches.iter().filter(|b| b.in_service) {
        let Some((f, t)) = map.branch(branch.from, branch.to) else {
            continue;
        };
        for seq in Sequence::ALL {
            let Some(pi) = branch.pi[seq.index()] else {
                continue;
            };
            let mat = &mut coo[seq.index()];
            mat.push(f, f, pi.series + pi.shunt_from);
            mat.push(t, t, pi.series + pi.shunt_to);
            mat.push(f, t, -pi.series);
            mat.push(t, f, -pi.series);
        }
    }

    for shunt in model.shunts.iter().filter(|s| s.in_service) {
        if let Some(b) = map.internal(shunt.bus) {
            for seq in Sequence::ALL {
                coo[seq.index()].push(b, b, shunt.y[seq.index()]);
            }
        }
    }

    let source = map.source();
    for seq in Sequence::ALL {
        coo[seq.index()].push(source, source, model.source.y[seq.index()]);
    }

    SequenceNetworks {
        y: coo.map(|c| CscMatrix::from(&c)),
        source,
        v_source: model.source.v1,
        source_shunt: model.source.y,
    }
}

impl SequenceNetworks {
    pub fn n_bus(&self) -> usize {
        self.y[1].nrows()
    }

    pub fn matrix(&self, seq: Sequence) -> &CscMatrix<Complex64> {
        &self.y[seq.index()]
    }

    /// First bus of a sub-network that has no path to ground in `seq`.
    ///
    /// Such a sub-network makes the sequence matrix singular: its potential is undefined.
    /// This is what a zero-sequence network behind an ungrounded transformer winding looks like.
    pub fn ungrounded_bus(&self, seq: Sequence) -> Option<usize> {
        let y = self.matrix(seq);
        let n = y.nrows();
        let scale = y
            .triplet_iter()
            .filter(|(r, c, _)| r == c)
            .map(|(_, _, v)| v.norm())
            .fold(0.0, f64::max);
        let tol = 1e-10 * scale.max(f64::MIN_POSITIVE);

        let mut merge = NodeMerge::new(n);
        let mut to_ground = vec![Complex64::new(0.0, 0.0); n];
        for (r, c, v) in y.triplet_iter() {
            to_ground[r] += *v;
            if r != c && v.norm() > 0.0 {
                merge.union(r, c);
            }
        }
        let mut grounded = vec![false; n];
        for bus in 0..n {
            if to_ground[bus].norm() > tol {
                let root = merge.find(bus);
                grounded[root] = true;
            }
        }
        (0..n).find(|&bus| {
            let root = merge.find(bus);
            !grounded[root]
        })
    }

    /// Splits Y1 into the free-bus block and the source column.
    pub fn reduce_positive(&self) -> PositiveReduction {
        let y1 = self.matrix(Sequence::Positive);
        let n = y1.nrows();
        let free: Vec<usize> = (0..n).filter(|&i| i != self.source).collect();
        let reduced = |i: usize| if i < self.source { i } else { i - 1 };

        let mut y_ff = CooMatrix::new(n - 1, n - 1);
        let mut y_fs = DVector::zeros(n - 1);
        for (r, c, v) in y1.triplet_iter() {
            match (r == self.source, c == self.source) {
                (false, false) => y_ff.push(reduced(r), reduced(c), *v),
                (false, true) => y_fs[reduced(r)] += *v,
                _ => {}
            }
        }
        PositiveReduction {
            y_ff: CscMatrix::from(&y_ff),
            y_fs,
            free,
        }
    }

    /// Currents injected into the branch network, `Y·V` without the source equivalent.
    pub fn network_currents(&self, v: &SequenceVoltages) -> SequenceCurrents {
        SequenceCurrents(std::array::from_fn(|s| {
            let mut i = &self.y[s] * &v[s];
            if !i.is_empty() {
                i[self.source] -= self.source_shunt[s] * v[s][self.source];
            }
            i
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::three_phase::network::{
        BranchKind, BusShunt, BusTable, PhaseDemand, SequenceBranch, SequencePi, SourceEquivalent,
    };
    use nalgebra::DMatrix;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn branch(from: usize, to: usize, pi: [Option<SequencePi>; 3]) -> SequenceBranch {
        SequenceBranch {
            kind: BranchKind::Line,
            index: 0,
            position: 0,
            from,
            to,
            in_service: true,
            rated_ka: 1.0,
            pi,
        }
    }

    fn pi(series: Complex64, shunt: Complex64) -> SequencePi {
        SequencePi {
            series,
            shunt_from: shunt,
            shunt_to: shunt,
        }
    }

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-12
    }

    /// source 0 - 1 - 2, bus 3 isolated
    fn model() -> SequenceModel {
        let p = pi(c(2.0, -20.0), c(0.0, 0.05));
        let p0 = pi(c(1.0, -8.0), c(0.0, 0.03));
        let p0_bare = SequencePi {
            series: p0.series,
            ..Default::default()
        };
        SequenceModel {
            buses: BusTable {
                ids: vec![10, 11, 12, 13],
                vn_kv: vec![110.0; 4],
                in_service: vec![true; 4],
            },
            branches: vec![
                branch(0, 1, [Some(p0), Some(p), Some(p)]),
                branch(1, 2, [Some(p0_bare), Some(p), Some(p)]),
            ],
            shunts: vec![BusShunt {
                bus: 3,
                in_service: true,
                y: Triplet::new(c(0.5, 0.0), c(0.5, 0.0), c(0.5, 0.0)),
            }],
            source: SourceEquivalent {
                bus: 0,
                v1: c(1.0, 0.0),
                y: Triplet::new(c(5.0, -50.0), c(10.0, -100.0), c(10.0, -100.0)),
            },
            demand: PhaseDemand(vec![Triplet::zeros(); 4]),
            sn_mva: 100.0,
        }
    }

    #[test]
    fn test_stamping() {
        let m = model();
        let map = m.bus_index_map();
        assert_eq!(map.len(), 3);
        let nets = build_sequence_networks(&m, &map);
        let y1 = DMatrix::from(nets.matrix(Sequence::Positive));
        let y = c(2.0, -20.0);
        let sh = c(0.0, 0.05);
        assert!(close(y1[(0, 0)], y + sh + c(10.0, -100.0)));
        assert!(close(y1[(1, 1)], 2.0 * (y + sh)));
        assert!(close(y1[(2, 2)], y + sh));
        assert_eq!(y1[(0, 1)], -y);
        assert_eq!(y1[(1, 0)], -y);
        assert_eq!(y1[(0, 2)], c(0.0, 0.0));
        assert_eq!(y1, y1.transpose());

        let y0 = DMatrix::from(nets.matrix(Sequence::Zero));
        assert!(close(y0[(0, 0)], c(1.0, -8.0) + c(0.0, 0.03) + c(5.0, -50.0)));
        assert!(close(y0[(2, 2)], c(1.0, -8.0)));
        assert_eq!(nets.matrix(Sequence::Negative), nets.matrix(Sequence::Positive));
    }

    #[test]
    fn test_grounding_check() {
        let mut m = model();
        let nets = build_sequence_networks(&m, &m.bus_index_map());
        for seq in Sequence::ALL {
            assert_eq!(nets.ungrounded_bus(seq), None, "{seq} sequence");
        }

        // bus 2 hangs on a branch that is open in the zero sequence and has no shunt
        m.branches[1].pi[0] = None;
        let nets = build_sequence_networks(&m, &m.bus_index_map());
        assert_eq!(nets.ungrounded_bus(Sequence::Zero), Some(2));
        assert_eq!(nets.ungrounded_bus(Sequence::Positive), None);
    }

    #[test]
    fn test_floating_pair_is_ungrounded() {
        // zero sequence of 1-2 is connected, but neither bus has a path to ground
        let mut m = model();
        m.branches[0].pi[0] = None;
        let nets = build_sequence_networks(&m, &m.bus_index_map());
        assert_eq!(nets.ungrounded_bus(Sequence::Zero), Some(1));
    }

    #[test]
    fn test_reduce_positive() {
        let m = model();
        let nets = build_sequence_networks(&m, &m.bus_index_map());
        let red = nets.reduce_positive();
        assert_eq!(red.free, vec![1, 2]);
        let full = DMatrix::from(nets.matrix(Sequence::Positive));
        let ff = DMatrix::from(&red.y_ff);
        assert_eq!(ff, full.view((1, 1), (2, 2)).clone_owned());
        assert_eq!(red.y_fs[0], full[(1, 0)]);
        assert_eq!(red.y_fs[1], c(0.0, 0.0));
    }

    #[test]
    fn test_network_currents_exclude_source_equivalent() {
        let m = model();
        let nets = build_sequence_networks(&m, &m.bus_index_map());
        let flat = DVector::from_element(3, c(1.0, 0.0));
        let v = SequenceVoltages([DVector::zeros(3), flat.clone(), DVector::zeros(3)]);
        let i = nets.network_currents(&v);
        // with a flat profile only the line charging draws current
        let sh = c(0.0, 0.05);
        assert!((i[1][0] - sh).norm() < 1e-12);
        assert!((i[1][1] - 2.0 * sh).norm() < 1e-12);
        assert!((i[1][2] - sh).norm() < 1e-12);
        assert!(i[0].iter().all(|x| x.norm() == 0.0));
    }
}
