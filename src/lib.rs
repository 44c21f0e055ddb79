mod basic;
pub mod io;
pub mod testcases;
pub mod prelude {
    use crate::basic;
    pub use crate::io::pandapower;
    pub use basic::*;

    pub use three_phase::{
        config::{InitMode, UnbalancedPfConfig},
        run_balanced_pf, run_pf_3ph, run_pf_3ph_with_seed, BalancedPfResult, BranchResult3ph,
        BusResult3ph, ExtGridResult3ph, PreparedNetwork, UnbalancedPfResult,
    };
}
