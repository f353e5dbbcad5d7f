//! Resource graph for thingstack.
//!
//! - `ResourceGraph` holds declarations and their prerequisite edges,
//!   rejecting references to nodes that are not declared yet
//! - `Plan` is the topological provisioning order
//! - `Template` renders a graph as a CloudFormation-shaped document
//! - `build_stack` assembles one of the two stack variants from configuration

pub mod error;
pub mod graph;
pub mod stacks;
pub mod template;

// Re-exports for convenience.
pub use error::{GraphError, GraphResult, StackError, StackResult};
pub use graph::{Node, Plan, PlanStep, ResourceGraph};
pub use stacks::{build_stack, ids};
pub use template::Template;
