//! Deployer error types.

use thiserror::Error;
use ts_graph::GraphError;
use ts_model::NodeId;
use ts_provider::ProviderError;

/// Errors that abort a deploy or destroy run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("node '{node}': reference {reference} has no value")]
    Unresolved { node: NodeId, reference: String },

    #[error("node '{node}': {source}")]
    Provider { node: NodeId, source: ProviderError },
}

/// Convenience alias for deployer results.
pub type DeployResult<T> = Result<T, DeployError>;
