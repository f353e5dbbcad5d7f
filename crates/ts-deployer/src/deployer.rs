//! Applies a resource graph through a provider.
//!
//! Nodes are visited one at a time in plan order. Every reference is
//! resolved from what earlier nodes produced, so a dependent is never
//! submitted before its prerequisites exist. A failed call stops the run
//! with the node id attached; nothing already provisioned is undone.

use std::collections::HashMap;

use ts_graph::{GraphError, Node, ResourceGraph};
use ts_model::{NodeId, Ref, ResolvedResource, ResourceKind};
use ts_provider::{Provider, ProviderError, Provisioned};

use crate::error::{DeployError, DeployResult};
use crate::report::{Action, DeploymentReport, NodeOutcome, NodeStatus};

/// Outputs of the nodes visited so far, keyed by logical id.
type Outputs = HashMap<NodeId, Provisioned>;

/// Drives a `Provider` through a graph's plan.
pub struct Deployer<'a> {
    provider: &'a dyn Provider,
}

/// Substitute every reference of `node` with the value its target produced.
fn resolve(node: &Node, outputs: &Outputs) -> DeployResult<ResolvedResource> {
    node.resource.map_refs(|reference| match reference {
        Ref::Literal(value) => Ok(value.clone()),
        Ref::Attr { node: target, attribute } => outputs
            .get(target)
            .and_then(|provisioned| provisioned.attribute(*attribute))
            .map(str::to_string)
            .ok_or_else(|| DeployError::Unresolved {
                node: node.id.clone(),
                reference: reference.to_string(),
            }),
    })
}

fn lookup_node<'g>(graph: &'g ResourceGraph, id: &NodeId) -> DeployResult<&'g Node> {
    graph
        .get(id)
        .ok_or_else(|| GraphError::UnknownNode(id.clone()).into())
}

fn at_node(node: &NodeId) -> impl FnOnce(ProviderError) -> DeployError + '_ {
    move |source| DeployError::Provider {
        node: node.clone(),
        source,
    }
}

fn outcome(
    id: &NodeId,
    kind: ResourceKind,
    status: NodeStatus,
    provisioned: Option<&Provisioned>,
) -> NodeOutcome {
    NodeOutcome {
        id: id.clone(),
        kind,
        status,
        name: provisioned.map(|p| p.name.clone()),
        arn: provisioned.and_then(|p| p.arn.clone()),
    }
}

impl<'a> Deployer<'a> {
    pub fn new(provider: &'a dyn Provider) -> Self {
        Self { provider }
    }

    /// Provision every node that does not exist yet.
    ///
    /// Running the same graph twice creates nothing the second time; every
    /// node is reported `Unchanged`.
    pub async fn deploy(&self, graph: &ResourceGraph) -> DeployResult<DeploymentReport> {
        let plan = graph.plan()?;
        let mut report = DeploymentReport::start(Action::Deploy, self.provider.name());
        let mut outputs = Outputs::new();

        tracing::info!(
            deployment_id = %report.deployment_id,
            provider = self.provider.name(),
            nodes = plan.len(),
            "deploy started"
        );

        for step in plan.steps() {
            let node = lookup_node(graph, &step.id)?;
            let resource = resolve(node, &outputs)?;

            let existing = self
                .provider
                .lookup(&resource)
                .await
                .map_err(at_node(&step.id))?;

            let (status, provisioned) = match existing {
                Some(found) => {
                    tracing::info!(node = %step.id, kind = %step.kind, name = %found.name, "already present");
                    (NodeStatus::Unchanged, found)
                }
                None => {
                    let created = self
                        .provider
                        .create(&resource)
                        .await
                        .map_err(at_node(&step.id))?;
                    tracing::info!(
                        node = %step.id,
                        kind = %step.kind,
                        name = %created.name,
                        arn = created.arn.as_deref().unwrap_or("-"),
                        "created"
                    );
                    (NodeStatus::Created, created)
                }
            };

            report
                .outcomes
                .push(outcome(&step.id, step.kind, status, Some(&provisioned)));
            outputs.insert(step.id.clone(), provisioned);
        }

        let report = report.finish();
        tracing::info!(
            deployment_id = %report.deployment_id,
            created = report.count(NodeStatus::Created),
            unchanged = report.count(NodeStatus::Unchanged),
            "deploy finished"
        );
        Ok(report)
    }

    /// Delete every node that exists, dependents before prerequisites.
    ///
    /// The graph is first walked forward to find what exists and to resolve
    /// references. A node whose prerequisite is missing cannot exist either
    /// and is reported `Absent`.
    pub async fn destroy(&self, graph: &ResourceGraph) -> DeployResult<DeploymentReport> {
        let plan = graph.plan()?;
        let mut report = DeploymentReport::start(Action::Destroy, self.provider.name());
        let mut outputs = Outputs::new();
        let mut present: HashMap<NodeId, (ResolvedResource, Provisioned)> = HashMap::new();

        tracing::info!(
            deployment_id = %report.deployment_id,
            provider = self.provider.name(),
            nodes = plan.len(),
            "destroy started"
        );

        for step in plan.steps() {
            let node = lookup_node(graph, &step.id)?;
            let resource = match resolve(node, &outputs) {
                Ok(resource) => resource,
                Err(DeployError::Unresolved { reference, .. }) => {
                    tracing::debug!(node = %step.id, %reference, "prerequisite absent");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let existing = self
                .provider
                .lookup(&resource)
                .await
                .map_err(at_node(&step.id))?;
            if let Some(provisioned) = existing {
                outputs.insert(step.id.clone(), provisioned.clone());
                present.insert(step.id.clone(), (resource, provisioned));
            }
        }

        for step in plan.reversed() {
            let Some((resource, provisioned)) = present.remove(&step.id) else {
                report
                    .outcomes
                    .push(outcome(&step.id, step.kind, NodeStatus::Absent, None));
                continue;
            };

            self.provider
                .delete(&resource)
                .await
                .map_err(at_node(&step.id))?;
            tracing::info!(node = %step.id, kind = %step.kind, name = %provisioned.name, "deleted");

            report.outcomes.push(outcome(
                &step.id,
                step.kind,
                NodeStatus::Deleted,
                Some(&provisioned),
            ));
        }

        let report = report.finish();
        tracing::info!(
            deployment_id = %report.deployment_id,
            deleted = report.count(NodeStatus::Deleted),
            absent = report.count(NodeStatus::Absent),
            "destroy finished"
        );
        Ok(report)
    }
}
