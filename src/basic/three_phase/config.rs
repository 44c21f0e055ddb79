use serde::{Deserialize, Serialize};

/// Starting point of the positive-sequence voltages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// Seed from a balanced Newton-Raphson solve of the positive-sequence network.
    #[default]
    Balanced,
    /// Every bus starts at the source voltage.
    Flat,
}

/// Options of the unbalanced load flow. Unset fields take their defaults.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnbalancedPfConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_it: Option<usize>, // Maximum number of sequence iterations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tol: Option<f64>, // Largest voltage change at convergence, pu
    pub init: InitMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balanced_max_it: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balanced_tol: Option<f64>,
}

impl UnbalancedPfConfig {
    pub fn max_it(&self) -> usize {
        self.max_it.unwrap_or(30)
    }

    pub fn tol(&self) -> f64 {
        self.tol.unwrap_or(1e-6)
    }

    pub fn balanced_max_it(&self) -> usize {
        self.balanced_max_it.unwrap_or(20)
    }

    pub fn balanced_tol(&self) -> f64 {
        self.balanced_tol.unwrap_or(1e-8)
    }
}
