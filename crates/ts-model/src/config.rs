//! Stack configuration: the environment-specific values a stack is built from.

use serde::Deserialize;

use crate::arns::ArnScope;
use crate::policy::PolicyShape;
use crate::resource::DEFAULT_SQL_VERSION;

/// Inline handler body installed when no code is configured.
pub const DEFAULT_HANDLER_CODE: &str =
    "def lambda_handler(event, context): print(f\"Event: {event}\\nContext: {context}\", )";

/// Which topology to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackVariant {
    /// Thing, certificate binding, policy, policy binding, handler, rule, grant.
    #[default]
    ThingWithTrigger,
    /// Thing, certificate binding, policy, policy binding.
    ThingOnly,
}

impl StackVariant {
    /// Policy shape each variant grants unless overridden.
    pub fn default_policy_shape(&self) -> PolicyShape {
        match self {
            Self::ThingWithTrigger => PolicyShape::NarrowTopic,
            Self::ThingOnly => PolicyShape::NarrowClient,
        }
    }
}

/// Top-level stack configuration, loadable from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    /// AWS region (e.g., "ap-northeast-1").
    pub region: String,
    /// AWS account id owning every resource.
    pub account_id: String,
    /// MQTT topic the device and rule use.
    #[serde(default = "default_topic_name")]
    pub topic_name: String,
    /// ARN of the pre-issued device certificate.
    pub certificate_arn: String,
    #[serde(default)]
    pub variant: StackVariant,
    /// Overrides the variant's policy shape.
    #[serde(default)]
    pub policy_shape: Option<PolicyShape>,
    #[serde(default = "default_thing_name")]
    pub thing_name: String,
    #[serde(default = "default_policy_name")]
    pub policy_name: String,
    #[serde(default)]
    pub handler: HandlerConfig,
    #[serde(default)]
    pub rule: RuleConfig,
}

/// Message handler (Lambda) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    #[serde(default = "default_function_name")]
    pub function_name: String,
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default = "default_handler_entry")]
    pub handler: String,
    #[serde(default = "default_code")]
    pub code: String,
    /// Execution role assumed by the function. Managed outside the stack.
    #[serde(default)]
    pub role_arn: Option<String>,
}

/// Topic rule and invocation grant settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_rule_name")]
    pub rule_name: String,
    #[serde(default = "default_sql_version")]
    pub sql_version: String,
    /// Statement id of the Lambda permission granted to the rule.
    #[serde(default = "default_statement_id")]
    pub statement_id: String,
}

fn default_topic_name() -> String {
    "test/topic".to_string()
}

fn default_thing_name() -> String {
    "my-first-thing".to_string()
}

fn default_policy_name() -> String {
    "iot-policy".to_string()
}

fn default_function_name() -> String {
    "test-function-iot-core".to_string()
}

fn default_runtime() -> String {
    "python3.10".to_string()
}

fn default_handler_entry() -> String {
    "index.lambda_handler".to_string()
}

fn default_code() -> String {
    DEFAULT_HANDLER_CODE.to_string()
}

fn default_rule_name() -> String {
    "test_topic_rule".to_string()
}

fn default_sql_version() -> String {
    DEFAULT_SQL_VERSION.to_string()
}

fn default_statement_id() -> String {
    "AddIotTopicRuleTrigger".to_string()
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            function_name: default_function_name(),
            runtime: default_runtime(),
            handler: default_handler_entry(),
            code: default_code(),
            role_arn: None,
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            rule_name: default_rule_name(),
            sql_version: default_sql_version(),
            statement_id: default_statement_id(),
        }
    }
}

impl StackConfig {
    /// Minimal configuration; everything else takes its default.
    pub fn new(
        region: impl Into<String>,
        account_id: impl Into<String>,
        certificate_arn: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            topic_name: default_topic_name(),
            certificate_arn: certificate_arn.into(),
            variant: StackVariant::default(),
            policy_shape: None,
            thing_name: default_thing_name(),
            policy_name: default_policy_name(),
            handler: HandlerConfig::default(),
            rule: RuleConfig::default(),
        }
    }

    pub fn scope(&self) -> ArnScope {
        ArnScope::new(&self.region, &self.account_id)
    }

    /// Policy shape in effect: the explicit override, else the variant's.
    pub fn effective_policy_shape(&self) -> PolicyShape {
        self.policy_shape
            .unwrap_or_else(|| self.variant.default_policy_shape())
    }
}
