use std::fmt;

use derive_more::{Deref, DerefMut};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::fortescue::Triplet;

/// Symmetrical component index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sequence {
    Zero = 0,
    Positive = 1,
    Negative = 2,
}

impl Sequence {
    pub const ALL: [Sequence; 3] = [Sequence::Zero, Sequence::Positive, Sequence::Negative];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Zero => write!(f, "zero"),
            Sequence::Positive => write!(f, "positive"),
            Sequence::Negative => write!(f, "negative"),
        }
    }
}

/// Pi equivalent of a branch in one sequence network, in per unit of the system base.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SequencePi {
    pub series: Complex64,
    pub shunt_from: Complex64,
    pub shunt_to: Complex64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Line,
    Impedance,
}

/// A two-terminal element in all three sequence networks.
///
/// `from`/`to` are positions in the bus table. A `None` entry in `pi` means the branch
/// is open in that sequence network.
#[derive(Debug, Clone)]
pub struct SequenceBranch {
    pub kind: BranchKind,
    /// External id of the element.
    pub index: i64,
    /// Position in the element table of `kind`.
    pub position: usize,
    pub from: usize,
    pub to: usize,
    pub in_service: bool,
    /// Rated current in kA, including derating and parallel systems.
    pub rated_ka: f64,
    pub pi: [Option<SequencePi>; 3],
}

impl SequenceBranch {
    /// Series admittances per sequence, zero where the branch is open.
    pub fn series(&self) -> Triplet {
        Triplet::from_fn(|s, _| self.pi[s].map(|pi| pi.series).unwrap_or_default())
    }

    pub fn shunt_from(&self) -> Triplet {
        Triplet::from_fn(|s, _| self.pi[s].map(|pi| pi.shunt_from).unwrap_or_default())
    }

    pub fn shunt_to(&self) -> Triplet {
        Triplet::from_fn(|s, _| self.pi[s].map(|pi| pi.shunt_to).unwrap_or_default())
    }
}

/// Shunt admittance to ground at a bus, per sequence.
#[derive(Debug, Clone)]
pub struct BusShunt {
    pub bus: usize,
    pub in_service: bool,
    pub y: Triplet,
}

/// Thevenin equivalent of the external grid.
#[derive(Debug, Clone)]
pub struct SourceEquivalent {
    /// Position of the source bus in the bus table.
    pub bus: usize,
    /// Fixed positive-sequence voltage.
    pub v1: Complex64,
    /// Per-sequence admittance `1 / Z_source` to ground.
    pub y: Triplet,
}

/// Per-phase constant-power demand at every bus, in per unit of `S_base / 3`.
#[derive(Debug, Clone, Default, Deref, DerefMut)]
pub struct PhaseDemand(pub Vec<Triplet>);

/// Bus data needed after parameter derivation.
#[derive(Debug, Clone, Default)]
pub struct BusTable {
    pub ids: Vec<i64>,
    pub vn_kv: Vec<f64>,
    pub in_service: Vec<bool>,
}

impl BusTable {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Immutable per-sequence description of a network, ready for island detection and assembly.
#[derive(Debug, Clone)]
pub struct SequenceModel {
    pub buses: BusTable,
    pub branches: Vec<SequenceBranch>,
    pub shunts: Vec<BusShunt>,
    pub source: SourceEquivalent,
    pub demand: PhaseDemand,
    pub sn_mva: f64,
}

impl SequenceModel {
    /// Branches of one element table, in table order.
    pub fn branches_of(&self, kind: BranchKind) -> impl Iterator<Item = &SequenceBranch> {
        self.branches.iter().filter(move |b| b.kind == kind)
    }

    /// Current base in kA at a bus.
    pub fn i_base_ka(&self, bus: usize) -> f64 {
        self.sn_mva / (3f64.sqrt() * self.buses.vn_kv[bus])
    }
}
