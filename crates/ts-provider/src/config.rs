use serde::Deserialize;

/// AWS client configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// Region override. Falls back to the stack region when unset.
    #[serde(default)]
    pub region: Option<String>,
    /// Named profile from the shared AWS config files.
    #[serde(default)]
    pub profile: Option<String>,
    /// Custom endpoint (e.g., a local emulator).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}
