//! Deployer configuration, loadable from TOML.

use std::path::Path;

use serde::Deserialize;
use ts_model::StackConfig;
use ts_provider::ProviderConfig;

/// Top-level configuration for the `thingstack` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployerConfig {
    /// What to declare.
    pub stack: StackConfig,
    /// How to reach AWS. Defaults to the ambient credential chain.
    #[serde(default)]
    pub aws: ProviderConfig,
}

impl DeployerConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Region the provider should use.
    pub fn region(&self) -> &str {
        self.aws.region.as_deref().unwrap_or(&self.stack.region)
    }
}
