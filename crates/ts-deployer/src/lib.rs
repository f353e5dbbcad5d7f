//! thingstack deployer: library crate behind the `thingstack` binary.
//!
//! Re-exports all modules so external crates (e.g. `ts-e2e-tests`) can
//! drive `Deployer` against a mock provider and inspect its reports.

pub mod config;
pub mod deployer;
pub mod error;
pub mod report;

pub use config::DeployerConfig;
pub use deployer::Deployer;
pub use error::{DeployError, DeployResult};
pub use report::{Action, DeploymentReport, NodeOutcome, NodeStatus};
