//! Unbalanced three-phase load flow in the symmetrical-component domain.
//!
//! The network is split into decoupled zero, positive and negative sequence networks.
//! Constant-power phase loads couple them through a fixed-point iteration seeded by a
//! balanced Newton-Raphson solve of the positive-sequence network.

pub mod balanced;
pub mod config;
pub mod fortescue;
pub mod island;
pub mod loadflow;
pub mod network;
pub mod results;
pub mod sequence_net;


use nalgebra::DVector;
use num_complex::Complex64;
use tracing::debug;

use crate::basic::{
    error::{ConfigError, PowerFlowError},
    solver::{DefaultSolver, Solve},
};
use crate::io::pandapower::Network;

use self::{
    balanced::{balanced_results, balanced_seed, flat_start, solve_positive_sequence},
    config::{InitMode, UnbalancedPfConfig},
    fortescue::Triplet,
    island::BusIndexMap,
    loadflow::solve_unbalanced,
    network::SequenceModel,
    results::extract_results,
};

pub use self::{
    balanced::BalancedPfResult,
    results::{BranchResult3ph, BusResult3ph, ExtGridResult3ph, UnbalancedPfResult},
};

/// A sequence model with its energized island and assembled sequence networks.
#[derive(Debug, Clone)]
pub struct PreparedNetwork {
    pub model: SequenceModel,
    pub map: BusIndexMap,
    pub nets: sequence_net::SequenceNetworks,
    /// Per-phase demand over the internal index.
    pub demand: Vec<Triplet>,
}

impl PreparedNetwork {
    pub fn new(model: SequenceModel) -> Self {
        let map = model.bus_index_map();
        let nets = sequence_net::build_sequence_networks(&model, &map);
        let demand = (0..map.len())
            .map(|k| model.demand[map.position(k)])
            .collect();
        debug!(
            buses = model.buses.len(),
            energized = map.len(),
            "sequence networks assembled"
        );
        Self {
            model,
            map,
            nets,
            demand,
        }
    }

    /// Restricts a seed given in bus-table order to the internal index.
    fn internal_seed(&self, seed: &[Complex64]) -> Result<DVector<Complex64>, ConfigError> {
        if seed.len() != self.model.buses.len() {
            return Err(ConfigError::SeedLength {
                expected: self.model.buses.len(),
                got: seed.len(),
            });
        }
        Ok(DVector::from_iterator(
            self.map.len(),
            (0..self.map.len()).map(|k| seed[self.map.position(k)]),
        ))
    }

    fn solve<S: Solve + Default>(
        &self,
        seed: &DVector<Complex64>,
        cfg: &UnbalancedPfConfig,
    ) -> UnbalancedPfResult {
        let flow = solve_unbalanced::<S>(&self.nets, &self.demand, seed, cfg.tol(), cfg.max_it());
        extract_results(&self.model, &self.map, &self.nets, &flow)
    }

    /// Unbalanced load flow seeded according to `cfg.init`.
    pub fn run_pf_3ph<S: Solve + Default>(&self, cfg: &UnbalancedPfConfig) -> UnbalancedPfResult {
        let seed = match cfg.init {
            InitMode::Balanced => balanced_seed::<S>(
                &self.nets,
                &self.demand,
                cfg.balanced_tol(),
                cfg.balanced_max_it(),
            ),
            InitMode::Flat => flat_start(&self.nets),
        };
        self.solve::<S>(&seed, cfg)
    }

    /// Unbalanced load flow from caller-supplied positive-sequence voltages.
    pub fn run_pf_3ph_with_seed<S: Solve + Default>(
        &self,
        cfg: &UnbalancedPfConfig,
        seed: &[Complex64],
    ) -> Result<UnbalancedPfResult, ConfigError> {
        let seed = self.internal_seed(seed)?;
        Ok(self.solve::<S>(&seed, cfg))
    }

    /// Positive-sequence Newton-Raphson load flow with the phase demands averaged.
    pub fn run_balanced_pf<S: Solve + Default>(
        &self,
        cfg: &UnbalancedPfConfig,
    ) -> Result<BalancedPfResult, PowerFlowError> {
        let outcome = solve_positive_sequence::<S>(
            &self.nets,
            &self.demand,
            cfg.balanced_tol(),
            cfg.balanced_max_it(),
        )
        .map_err(PowerFlowError::LinearSolve)?;
        Ok(balanced_results(&self.model, &self.map, &outcome))
    }
}

impl TryFrom<&Network> for PreparedNetwork {
    type Error = ConfigError;

    fn try_from(net: &Network) -> Result<Self, Self::Error> {
        SequenceModel::try_from(net).map(Self::new)
    }
}

/// Runs the unbalanced three-phase load flow on a network.
///
/// Configuration problems are errors; non-convergence and singular sequence networks are
/// reported on the result.
pub fn run_pf_3ph(
    net: &Network,
    cfg: &UnbalancedPfConfig,
) -> Result<UnbalancedPfResult, PowerFlowError> {
    let prepared = PreparedNetwork::try_from(net)?;
    Ok(prepared.run_pf_3ph::<DefaultSolver>(cfg))
}

/// Like [`run_pf_3ph`], starting from `seed` given in bus-table order.
///
/// Entries of buses outside the energized island are ignored; the source entry is replaced
/// by the source voltage.
pub fn run_pf_3ph_with_seed(
    net: &Network,
    cfg: &UnbalancedPfConfig,
    seed: &[Complex64],
) -> Result<UnbalancedPfResult, PowerFlowError> {
    let prepared = PreparedNetwork::try_from(net)?;
    Ok(prepared.run_pf_3ph_with_seed::<DefaultSolver>(cfg, seed)?)
}

/// Balanced positive-sequence load flow of a network.
pub fn run_balanced_pf(
    net: &Network,
    cfg: &UnbalancedPfConfig,
) -> Result<BalancedPfResult, PowerFlowError> {
    PreparedNetwork::try_from(net)?.run_balanced_pf::<DefaultSolver>(cfg)
}
