//! Resource providers for thingstack deployments.
//!
//! Provides the control-plane seam a deployment drives:
//! - `Provider` trait for lookup/create/delete (mockable in tests)
//! - `AwsProvider` backed by the IoT and Lambda SDKs for production
//! - `MockProvider` for testing without an AWS account
//! - `inline_archive` for packaging inline handler source

pub mod aws;
pub mod config;
pub mod error;
pub mod mock;
pub mod package;
pub mod provider;

// Re-exports for convenience.
pub use aws::AwsProvider;
pub use config::ProviderConfig;
pub use error::{ProviderError, ProviderResult};
pub use mock::{MockProvider, Operation, ProviderCall};
pub use package::inline_archive;
pub use provider::{Provider, Provisioned};
