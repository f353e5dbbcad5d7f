//! Resource graph: declared nodes plus the prerequisite edges between them.
//!
//! Edges come from two places: attribute references inside a declaration
//! (a rule consuming a function ARN) and explicit `add_dependency` calls.
//! A declaration may only reference nodes that are already declared, so
//! ordering mistakes surface at declaration time instead of at apply time.

use std::collections::{BTreeSet, HashMap};

use ts_model::{NodeId, Resource, ResourceKind};

use crate::error::{GraphError, GraphResult};
use crate::template::Template;

/// A declared resource and its explicit dependencies.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub resource: Resource,
    /// Edges added with [`ResourceGraph::add_dependency`].
    pub depends_on: Vec<NodeId>,
}

impl Node {
    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    /// Every node that must be provisioned before this one, reference edges
    /// first, without duplicates.
    pub fn prerequisites(&self) -> Vec<&NodeId> {
        let mut seen = BTreeSet::new();
        self.resource
            .prerequisites()
            .into_iter()
            .chain(self.depends_on.iter())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Directed acyclic graph of resource declarations.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource under a logical id.
    ///
    /// Fails if the id is taken or if the declaration references a node
    /// that has not been declared yet.
    pub fn declare(&mut self, id: impl Into<NodeId>, resource: Resource) -> GraphResult<NodeId> {
        let id = id.into();

        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }

        if let Some(missing) = resource
            .prerequisites()
            .into_iter()
            .find(|p| !self.index.contains_key(*p))
        {
            return Err(GraphError::OrderingViolation {
                node: id,
                missing: missing.clone(),
            });
        }

        tracing::debug!(node = %id, kind = %resource.kind(), "resource declared");

        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(Node {
            id: id.clone(),
            resource,
            depends_on: Vec::new(),
        });
        Ok(id)
    }

    /// Require `prerequisite` to be provisioned before `dependent`.
    pub fn add_dependency(&mut self, dependent: &NodeId, prerequisite: &NodeId) -> GraphResult<()> {
        if dependent == prerequisite {
            return Err(GraphError::SelfDependency(dependent.clone()));
        }
        if !self.index.contains_key(prerequisite) {
            return Err(GraphError::UnknownNode(prerequisite.clone()));
        }
        let position = *self
            .index
            .get(dependent)
            .ok_or_else(|| GraphError::UnknownNode(dependent.clone()))?;

        let node = &mut self.nodes[position];
        if !node.depends_on.contains(prerequisite) {
            node.depends_on.push(prerequisite.clone());
        }
        Ok(())
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Nodes of one kind, in declaration order.
    pub fn nodes_of_kind(&self, kind: ResourceKind) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.kind() == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every prerequisite of every node is declared and that
    /// the graph has no cycles.
    pub fn validate(&self) -> GraphResult<()> {
        for node in &self.nodes {
            if let Some(missing) = node
                .prerequisites()
                .into_iter()
                .find(|p| !self.index.contains_key(*p))
            {
                return Err(GraphError::OrderingViolation {
                    node: node.id.clone(),
                    missing: missing.clone(),
                });
            }
        }
        self.plan().map(|_| ())
    }

    /// Topologically order the graph (Kahn's algorithm).
    ///
    /// Among nodes whose prerequisites are all satisfied, the one declared
    /// first goes first, so the same graph always yields the same plan.
    pub fn plan(&self) -> GraphResult<Plan> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, node) in self.nodes.iter().enumerate() {
            for prerequisite in node.prerequisites() {
                let p = *self
                    .index
                    .get(prerequisite)
                    .ok_or_else(|| GraphError::UnknownNode(prerequisite.clone()))?;
                dependents[p].push(i);
                in_degree[i] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut steps = Vec::with_capacity(n);

        while let Some(i) = ready.pop_first() {
            let node = &self.nodes[i];
            steps.push(PlanStep {
                id: node.id.clone(),
                kind: node.kind(),
            });
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if steps.len() < n {
            let stuck = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].id.clone())
                .collect();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(Plan { steps })
    }

    /// Render the graph as a template.
    pub fn synth(&self) -> Template {
        Template::from_graph(self)
    }
}

/// One entry of a provisioning plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub id: NodeId,
    pub kind: ResourceKind,
}

/// Provisioning order for a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<&NodeId> {
        self.steps.iter().map(|s| &s.id).collect()
    }

    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.steps.iter().position(|s| &s.id == id)
    }

    /// Teardown order: dependents before their prerequisites.
    pub fn reversed(&self) -> Vec<PlanStep> {
        self.steps.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "{:>2}. {} ({})", i + 1, step.id, step.kind)?;
        }
        Ok(())
    }
}
