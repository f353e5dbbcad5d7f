//! Mock provider for testing without AWS.
//!
//! Keeps provisioned resources in memory, records every call, and
//! rejects what the real control plane would reject: duplicates,
//! attachments to missing endpoints, rules pointing at unknown functions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ts_model::{ArnScope, ResolvedResource, Resource, ResourceKind};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Provider, Provisioned};

/// Which trait method a recorded call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Lookup,
    Create,
    Delete,
}

/// A recorded provider call.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub operation: Operation,
    pub kind: ResourceKind,
    pub physical_id: String,
    /// The resolved declaration as the provider received it.
    pub resource: ResolvedResource,
}

type Key = (ResourceKind, String);

/// Mock implementation of the `Provider` trait.
///
/// Thread-safe via `Mutex` (fine for test contexts).
pub struct MockProvider {
    scope: ArnScope,
    resources: Mutex<HashMap<Key, Provisioned>>,
    calls: Mutex<Vec<ProviderCall>>,
    failures: Mutex<HashMap<ResourceKind, String>>,
}

impl MockProvider {
    pub fn new(scope: ArnScope) -> Self {
        Self {
            scope,
            resources: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make every `create` of `kind` fail with an API error carrying `message`.
    pub fn fail_creates(&self, kind: ResourceKind, message: impl Into<String>) {
        self.failures.lock().unwrap().insert(kind, message.into());
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls of one operation.
    pub fn calls_of(&self, operation: Operation) -> Vec<ProviderCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Whether a resource of `kind` with this physical id exists.
    pub fn exists(&self, kind: ResourceKind, physical_id: &str) -> bool {
        self.resources
            .lock()
            .unwrap()
            .contains_key(&(kind, physical_id.to_string()))
    }

    /// Number of provisioned resources of `kind`.
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn get(&self, kind: ResourceKind, physical_id: &str) -> Option<Provisioned> {
        self.resources
            .lock()
            .unwrap()
            .get(&(kind, physical_id.to_string()))
            .cloned()
    }

    /// Clear recorded calls, keeping provisioned resources.
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, operation: Operation, resource: &ResolvedResource) {
        self.calls.lock().unwrap().push(ProviderCall {
            operation,
            kind: resource.kind(),
            physical_id: resource.physical_id(),
            resource: resource.clone(),
        });
    }

    fn require(
        resources: &HashMap<Key, Provisioned>,
        kind: ResourceKind,
        id: &str,
    ) -> ProviderResult<()> {
        if resources.contains_key(&(kind, id.to_string())) {
            Ok(())
        } else {
            Err(ProviderError::NotFound {
                kind,
                id: id.to_string(),
            })
        }
    }

    fn require_arn(
        resources: &HashMap<Key, Provisioned>,
        kind: ResourceKind,
        arn: &str,
    ) -> ProviderResult<()> {
        let known = resources
            .iter()
            .any(|((k, _), p)| *k == kind && p.arn.as_deref() == Some(arn));
        if known {
            Ok(())
        } else {
            Err(ProviderError::NotFound {
                kind,
                id: arn.to_string(),
            })
        }
    }

    /// Check the endpoints a resource points at exist.
    fn check_endpoints(
        resources: &HashMap<Key, Provisioned>,
        resource: &ResolvedResource,
    ) -> ProviderResult<()> {
        match resource {
            Resource::Thing(_) | Resource::Policy(_) | Resource::Function(_) => Ok(()),
            Resource::ThingPrincipalAttachment(a) => {
                Self::require(resources, ResourceKind::Thing, &a.thing_name)
            }
            Resource::PolicyPrincipalAttachment(a) => {
                Self::require(resources, ResourceKind::Policy, &a.policy_name)
            }
            Resource::TopicRule(r) => {
                Self::require_arn(resources, ResourceKind::Function, &r.function_arn)
            }
            Resource::Permission(p) => {
                Self::require(resources, ResourceKind::Function, &p.function_name)?;
                Self::require_arn(resources, ResourceKind::TopicRule, &p.source_arn)
            }
        }
    }

    fn arn_for(&self, resource: &ResolvedResource) -> Option<String> {
        match resource {
            Resource::Thing(t) => Some(self.scope.thing(&t.thing_name)),
            Resource::Policy(p) => Some(self.scope.policy(&p.policy_name)),
            Resource::Function(f) => Some(self.scope.function(&f.function_name)),
            Resource::TopicRule(r) => Some(self.scope.rule(&r.rule_name)),
            _ => None,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn lookup(&self, resource: &ResolvedResource) -> ProviderResult<Option<Provisioned>> {
        self.record(Operation::Lookup, resource);
        Ok(self.get(resource.kind(), &resource.physical_id()))
    }

    async fn create(&self, resource: &ResolvedResource) -> ProviderResult<Provisioned> {
        self.record(Operation::Create, resource);
        let kind = resource.kind();
        let id = resource.physical_id();

        if let Some(message) = self.failures.lock().unwrap().get(&kind) {
            return Err(ProviderError::Api {
                operation: "Create",
                message: message.clone(),
            });
        }

        let mut resources = self.resources.lock().unwrap();
        if resources.contains_key(&(kind, id.clone())) {
            return Err(ProviderError::Conflict { kind, id });
        }
        Self::check_endpoints(&resources, resource)?;

        let provisioned = Provisioned {
            name: id.clone(),
            arn: self.arn_for(resource),
        };
        resources.insert((kind, id), provisioned.clone());
        Ok(provisioned)
    }

    async fn delete(&self, resource: &ResolvedResource) -> ProviderResult<()> {
        self.record(Operation::Delete, resource);
        let kind = resource.kind();
        let id = resource.physical_id();

        self.resources
            .lock()
            .unwrap()
            .remove(&(kind, id.clone()))
            .map(|_| ())
            .ok_or(ProviderError::NotFound { kind, id })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
