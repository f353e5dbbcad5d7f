//! Graph construction and planning errors.

use thiserror::Error;
use ts_model::{CredentialError, NodeId};

/// Errors raised while declaring or ordering resources.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node '{0}' is already declared")]
    DuplicateNode(NodeId),

    #[error("node '{node}' references '{missing}', which has not been declared yet")]
    OrderingViolation { node: NodeId, missing: NodeId },

    #[error("unknown node '{0}'")]
    UnknownNode(NodeId),

    #[error("node '{0}' cannot depend on itself")]
    SelfDependency(NodeId),

    #[error("dependency cycle through {}", .0.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<NodeId>),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while assembling a stack from configuration.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("topic '{0}' cannot be selected by a rule query")]
    InvalidTopic(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Convenience alias for stack results.
pub type StackResult<T> = Result<T, StackError>;
