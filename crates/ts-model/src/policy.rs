//! IoT policy documents and the two statement shapes a stack can grant.

use serde::{Deserialize, Serialize};

use crate::arns::{ANY, ArnScope};

/// IAM policy language version used by every generated document.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// MQTT data-plane actions an IoT policy can authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IotAction {
    #[serde(rename = "iot:Connect")]
    Connect,
    #[serde(rename = "iot:Publish")]
    Publish,
    #[serde(rename = "iot:Subscribe")]
    Subscribe,
    #[serde(rename = "iot:Receive")]
    Receive,
}

impl IotAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "iot:Connect",
            Self::Publish => "iot:Publish",
            Self::Subscribe => "iot:Subscribe",
            Self::Receive => "iot:Receive",
        }
    }
}

impl std::fmt::Display for IotAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{Effect, Action, Resource}` entry of a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(rename = "Action")]
    pub actions: Vec<IotAction>,
    #[serde(rename = "Resource")]
    pub resources: Vec<String>,
}

impl Statement {
    pub fn allow(actions: impl Into<Vec<IotAction>>, resources: impl Into<Vec<String>>) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.into(),
            resources: resources.into(),
        }
    }
}

/// A complete policy document as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    /// Serialize to the JSON text the IoT `CreatePolicy` API expects.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Which authorization posture the access policy takes.
///
/// The two shapes are not equivalent: `NarrowTopic` lets any client id
/// connect but confines messaging to one topic, `NarrowClient` pins the
/// client id to the thing name but allows publishing to any topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyShape {
    NarrowTopic,
    NarrowClient,
}

impl PolicyShape {
    /// Build the ordered statement list for this shape.
    pub fn statements(&self, scope: &ArnScope, thing_name: &str, topic: &str) -> Vec<Statement> {
        match self {
            Self::NarrowTopic => vec![
                Statement::allow([IotAction::Connect], [scope.client(ANY)]),
                Statement::allow(
                    [IotAction::Publish, IotAction::Receive],
                    [scope.topic(topic)],
                ),
                Statement::allow([IotAction::Subscribe], [scope.topic_filter(topic)]),
            ],
            Self::NarrowClient => vec![
                Statement::allow(
                    [
                        IotAction::Connect,
                        IotAction::Publish,
                        IotAction::Subscribe,
                        IotAction::Receive,
                    ],
                    [scope.client(thing_name)],
                ),
                Statement::allow([IotAction::Publish], [scope.topic(ANY)]),
            ],
        }
    }

    pub fn document(&self, scope: &ArnScope, thing_name: &str, topic: &str) -> PolicyDocument {
        PolicyDocument::new(self.statements(scope, thing_name, topic))
    }
}
