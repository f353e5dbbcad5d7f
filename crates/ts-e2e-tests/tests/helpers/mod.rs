//! Shared test harness for E2E integration tests.
//!
//! Builds a stack from configuration and deploys it through a shared
//! `MockProvider`, exercising real code paths across all crate boundaries.

#![allow(dead_code)]

use std::sync::Arc;

use ts_deployer::{DeployResult, Deployer, DeploymentReport};
use ts_graph::{ResourceGraph, StackResult, Template, build_stack};
use ts_model::{StackConfig, StackVariant, StaticCredential};
use ts_provider::MockProvider;

pub const REGION: &str = "ap-northeast-1";
pub const ACCOUNT: &str = "123456789012";
pub const CERT: &str = "arn:aws:iot:ap-northeast-1:123456789012:cert/4a50ae8f";
pub const ROLE: &str = "arn:aws:iam::123456789012:role/test-function-iot-core";

/// Configuration with the test account, certificate and handler role.
pub fn config(variant: StackVariant) -> StackConfig {
    let mut config = StackConfig::new(REGION, ACCOUNT, CERT);
    config.variant = variant;
    config.handler.role_arn = Some(ROLE.to_string());
    config
}

/// End-to-end test harness wiring a stack graph to a mock provider.
pub struct TestHarness {
    pub config: StackConfig,
    pub graph: ResourceGraph,
    /// Shared provider; survives across deploy and destroy runs.
    pub provider: Arc<MockProvider>,
}

impl TestHarness {
    /// Build the given variant with default names.
    pub fn new(variant: StackVariant) -> Self {
        Self::with_config(config(variant)).unwrap()
    }

    pub fn with_config(config: StackConfig) -> StackResult<Self> {
        let graph = build_stack(&config, &StaticCredential::new(&config.certificate_arn))?;
        let provider = Arc::new(MockProvider::new(config.scope()));
        Ok(Self {
            config,
            graph,
            provider,
        })
    }

    pub fn synth(&self) -> Template {
        self.graph.synth()
    }

    pub async fn deploy(&self) -> DeployResult<DeploymentReport> {
        Deployer::new(self.provider.as_ref()).deploy(&self.graph).await
    }

    pub async fn destroy(&self) -> DeployResult<DeploymentReport> {
        Deployer::new(self.provider.as_ref()).destroy(&self.graph).await
    }
}
