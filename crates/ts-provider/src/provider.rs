//! Provider trait: the resource API a deployment drives.
//!
//! Every call receives a fully resolved declaration. Implementations
//! report provider-side failures (duplicate names, malformed ARNs,
//! authorization denials) as `ProviderError` without retrying.

use async_trait::async_trait;
use ts_model::{Attribute, ResolvedResource};

use crate::error::ProviderResult;

/// What the provider reports for an existing resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Physical name, or the endpoint pair for attachments and permissions.
    pub name: String,
    /// Provider-generated ARN, for kinds that have one.
    pub arn: Option<String>,
}

impl Provisioned {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arn: None,
        }
    }

    pub fn attribute(&self, attribute: Attribute) -> Option<&str> {
        match attribute {
            Attribute::Name => Some(&self.name),
            Attribute::Arn => self.arn.as_deref(),
        }
    }
}

/// Abstraction over the cloud resource API.
///
/// Enables deploying against an in-memory mock in tests.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Return the resource if it already exists.
    async fn lookup(&self, resource: &ResolvedResource) -> ProviderResult<Option<Provisioned>>;

    /// Create the resource. Fails if it already exists.
    async fn create(&self, resource: &ResolvedResource) -> ProviderResult<Provisioned>;

    /// Delete the resource. Fails if it does not exist.
    async fn delete(&self, resource: &ResolvedResource) -> ProviderResult<()>;

    /// Name of this provider (for logging).
    fn name(&self) -> &str;
}
