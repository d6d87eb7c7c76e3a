//! # CASEFORGE
//!
//! Application crate on top of [`caseforge_economy`]. Holds the concurrent
//! opening simulation used by the `caseforge_sim` binary.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod simulation;

pub use simulation::{run, RarityRow, SimulationError, SimulationPlan, SimulationReport};
