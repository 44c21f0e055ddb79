pub(crate) mod newtonpf;

pub mod error;
pub mod solver;
pub(crate) mod sparse;
pub mod three_phase;
pub use newtonpf::{newton_pf, NewtonOutcome};
