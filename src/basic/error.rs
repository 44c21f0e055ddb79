use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::three_phase::network::Sequence;

/// Problems in the network description that make a solve meaningless.
///
/// These are raised before any matrix is assembled.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("network has no in-service external grid")]
    NoSource,

    #[error("network has {count} in-service external grids, exactly one is supported")]
    MultipleSources { count: usize },

    #[error("external grid references unknown bus {bus}")]
    SourceBusMissing { bus: i64 },

    #[error("external grid bus {bus} is out of service")]
    SourceOutOfService { bus: i64 },

    #[error("external grid at bus {bus} lacks zero-sequence parameter `{field}`")]
    MissingZeroSequence { bus: i64, field: &'static str },

    #[error("{element} {position} references unknown bus {bus}")]
    UnknownBus {
        element: &'static str,
        position: usize,
        bus: i64,
    },

    #[error("bus id {bus} appears more than once")]
    DuplicateBus { bus: i64 },

    #[error("invalid {element} {position}: {what}")]
    InvalidParameter {
        element: &'static str,
        position: usize,
        what: String,
    },

    #[error("seed has {got} entries but the network has {expected} buses")]
    SeedLength { expected: usize, got: usize },
}

/// Errors returned by the load-flow entry points.
///
/// Non-convergence and singular sequence networks are not errors; they are
/// reported on the result.
#[derive(Debug, Error)]
pub enum PowerFlowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("linear solve failed: {0}")]
    LinearSolve(&'static str),

    #[error("failed to read network file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse network: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed network data: {what}")]
    Format { what: String },
}

pub type PfResult<T> = Result<T, PowerFlowError>;

/// Why an unbalanced solve stopped without a usable solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SolveFailure {
    /// A sequence admittance matrix could not be factorized, typically a sub-network with no
    /// path to ground in that sequence.
    #[error("{0} sequence admittance matrix is singular")]
    Singular(Sequence),

    /// The iterate became non-finite, e.g. a phase voltage collapsed to zero under load.
    #[error("iteration produced non-finite values")]
    Diverged,
}
