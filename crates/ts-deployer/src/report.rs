//! Deployment reports.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use ts_model::{NodeId, ResourceKind};
use uuid::Uuid;

/// Which direction a run went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Deploy,
    Destroy,
}

/// What happened to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Created by this run.
    Created,
    /// Already present; left as is.
    Unchanged,
    /// Deleted by this run.
    Deleted,
    /// Not present; nothing to delete.
    Absent,
}

fn cfn_type<S: Serializer>(kind: &ResourceKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.cfn_type())
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub id: NodeId,
    #[serde(rename = "type", serialize_with = "cfn_type")]
    pub kind: ResourceKind,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

/// Outcome of a complete deploy or destroy run, in the order nodes were
/// visited.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub deployment_id: Uuid,
    pub action: Action,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<NodeOutcome>,
}

impl DeploymentReport {
    pub(crate) fn start(action: Action, provider: &str) -> Self {
        let now = Utc::now();
        Self {
            deployment_id: Uuid::now_v7(),
            action,
            provider: provider.to_string(),
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn outcome(&self, id: &NodeId) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|o| &o.id == id)
    }

    /// Number of nodes that ended with `status`.
    pub fn count(&self, status: NodeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// True when every node ended with `status`.
    pub fn all(&self, status: NodeStatus) -> bool {
        self.outcomes.iter().all(|o| o.status == status)
    }
}

impl std::fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:?} {} via {}",
            self.action, self.deployment_id, self.provider
        )?;
        for outcome in &self.outcomes {
            let status = format!("{:?}", outcome.status);
            write!(f, "  {:<28} {status:<10}", outcome.id.as_str())?;
            if let Some(arn) = &outcome.arn {
                write!(f, " {arn}")?;
            } else if let Some(name) = &outcome.name {
                write!(f, " {name}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
