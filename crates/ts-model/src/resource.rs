//! Resource declarations and the references that link them.
//!
//! A declaration is generic over its reference type: the graph holds
//! `Resource<Ref>` (references to other nodes), the provider receives
//! `Resource<String>` once every reference has been resolved to a
//! concrete name or ARN.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::policy::PolicyDocument;

/// Service principal that AWS IoT rules invoke Lambda functions as.
pub const IOT_SERVICE_PRINCIPAL: &str = "iot.amazonaws.com";

/// Lambda action granted to the rule.
pub const INVOKE_FUNCTION_ACTION: &str = "lambda:InvokeFunction";

/// IoT rules SQL version.
pub const DEFAULT_SQL_VERSION: &str = "2016-03-23";

/// Logical identifier of a node in a stack (CloudFormation logical id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribute of a provisioned resource that other declarations can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Physical name (thing name, policy name, function name, rule name).
    Name,
    /// Provider-generated ARN.
    Arn,
}

/// A value inside a declaration: either fixed up front or produced by
/// another node when it is provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ref {
    Literal(String),
    Attr { node: NodeId, attribute: Attribute },
}

impl Ref {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn name_of(node: impl Into<NodeId>) -> Self {
        Self::Attr {
            node: node.into(),
            attribute: Attribute::Name,
        }
    }

    pub fn arn_of(node: impl Into<NodeId>) -> Self {
        Self::Attr {
            node: node.into(),
            attribute: Attribute::Arn,
        }
    }

    /// The node this reference depends on, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::Literal(_) => None,
            Self::Attr { node, .. } => Some(node),
        }
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Attr { node, attribute } => write!(f, "{node}.{attribute:?}"),
        }
    }
}

/// Kind of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Thing,
    ThingPrincipalAttachment,
    Policy,
    PolicyPrincipalAttachment,
    Function,
    TopicRule,
    Permission,
}

impl ResourceKind {
    /// CloudFormation resource type name.
    pub fn cfn_type(&self) -> &'static str {
        match self {
            Self::Thing => "AWS::IoT::Thing",
            Self::ThingPrincipalAttachment => "AWS::IoT::ThingPrincipalAttachment",
            Self::Policy => "AWS::IoT::Policy",
            Self::PolicyPrincipalAttachment => "AWS::IoT::PolicyPrincipalAttachment",
            Self::Function => "AWS::Lambda::Function",
            Self::TopicRule => "AWS::IoT::TopicRule",
            Self::Permission => "AWS::Lambda::Permission",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cfn_type())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThingSpec {
    pub thing_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThingAttachment<R> {
    pub thing_name: R,
    pub principal: R,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicySpec {
    pub policy_name: String,
    pub document: PolicyDocument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyAttachment<R> {
    pub policy_name: R,
    pub principal: R,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpec {
    pub function_name: String,
    /// Inline source, shipped as `index.py`.
    pub code: String,
    /// Entry point, e.g. `index.lambda_handler`.
    pub handler: String,
    /// Runtime identifier, e.g. `python3.10`.
    pub runtime: String,
    pub role_arn: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicRuleSpec<R> {
    pub rule_name: String,
    pub sql: String,
    pub sql_version: String,
    pub function_arn: R,
}

static SELECT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*SELECT\s+.+?\s+FROM\s+'([^']+)'").expect("valid rule query regex")
});

impl<R> TopicRuleSpec<R> {
    /// Query selecting every message published on `topic`.
    pub fn select_all(topic: &str) -> String {
        format!("SELECT * FROM '{topic}'")
    }

    /// Topic (or topic filter) the rule query reads from.
    pub fn source_topic(&self) -> Option<&str> {
        SELECT_FROM
            .captures(&self.sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionSpec<R> {
    pub statement_id: String,
    pub function_name: R,
    pub action: String,
    pub principal: String,
    pub source_arn: R,
}

/// A declared resource, generic over how it references other nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<R = Ref> {
    Thing(ThingSpec),
    ThingPrincipalAttachment(ThingAttachment<R>),
    Policy(PolicySpec),
    PolicyPrincipalAttachment(PolicyAttachment<R>),
    Function(FunctionSpec),
    TopicRule(TopicRuleSpec<R>),
    Permission(PermissionSpec<R>),
}

impl<R> Resource<R> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Thing(_) => ResourceKind::Thing,
            Self::ThingPrincipalAttachment(_) => ResourceKind::ThingPrincipalAttachment,
            Self::Policy(_) => ResourceKind::Policy,
            Self::PolicyPrincipalAttachment(_) => ResourceKind::PolicyPrincipalAttachment,
            Self::Function(_) => ResourceKind::Function,
            Self::TopicRule(_) => ResourceKind::TopicRule,
            Self::Permission(_) => ResourceKind::Permission,
        }
    }

    /// All references held by this declaration, in field order.
    pub fn refs(&self) -> Vec<&R> {
        match self {
            Self::Thing(_) | Self::Policy(_) | Self::Function(_) => Vec::new(),
            Self::ThingPrincipalAttachment(a) => vec![&a.thing_name, &a.principal],
            Self::PolicyPrincipalAttachment(a) => vec![&a.policy_name, &a.principal],
            Self::TopicRule(r) => vec![&r.function_arn],
            Self::Permission(p) => vec![&p.function_name, &p.source_arn],
        }
    }

    /// Rebuild the declaration with every reference passed through `f`.
    pub fn map_refs<T, E>(&self, mut f: impl FnMut(&R) -> Result<T, E>) -> Result<Resource<T>, E> {
        Ok(match self {
            Self::Thing(t) => Resource::Thing(t.clone()),
            Self::Policy(p) => Resource::Policy(p.clone()),
            Self::Function(func) => Resource::Function(func.clone()),
            Self::ThingPrincipalAttachment(a) => {
                Resource::ThingPrincipalAttachment(ThingAttachment {
                    thing_name: f(&a.thing_name)?,
                    principal: f(&a.principal)?,
                })
            }
            Self::PolicyPrincipalAttachment(a) => {
                Resource::PolicyPrincipalAttachment(PolicyAttachment {
                    policy_name: f(&a.policy_name)?,
                    principal: f(&a.principal)?,
                })
            }
            Self::TopicRule(r) => Resource::TopicRule(TopicRuleSpec {
                rule_name: r.rule_name.clone(),
                sql: r.sql.clone(),
                sql_version: r.sql_version.clone(),
                function_arn: f(&r.function_arn)?,
            }),
            Self::Permission(p) => Resource::Permission(PermissionSpec {
                statement_id: p.statement_id.clone(),
                function_name: f(&p.function_name)?,
                action: p.action.clone(),
                principal: p.principal.clone(),
                source_arn: f(&p.source_arn)?,
            }),
        })
    }
}

impl Resource<Ref> {
    /// Nodes this declaration consumes attributes from.
    pub fn prerequisites(&self) -> Vec<&NodeId> {
        let mut nodes: Vec<&NodeId> = self.refs().into_iter().filter_map(Ref::node).collect();
        nodes.dedup();
        nodes
    }
}

/// A declaration with every reference resolved.
pub type ResolvedResource = Resource<String>;

impl Resource<String> {
    /// Key identifying the physical resource at the provider.
    ///
    /// Named resources use their name; attachments and permissions, which
    /// have no name of their own, combine their endpoints.
    pub fn physical_id(&self) -> String {
        match self {
            Self::Thing(t) => t.thing_name.clone(),
            Self::Policy(p) => p.policy_name.clone(),
            Self::Function(f) => f.function_name.clone(),
            Self::TopicRule(r) => r.rule_name.clone(),
            Self::ThingPrincipalAttachment(a) => format!("{}|{}", a.thing_name, a.principal),
            Self::PolicyPrincipalAttachment(a) => format!("{}|{}", a.policy_name, a.principal),
            Self::Permission(p) => format!("{}|{}", p.function_name, p.statement_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(sql: &str) -> TopicRuleSpec<Ref> {
        TopicRuleSpec {
            rule_name: "test_topic_rule".into(),
            sql: sql.into(),
            sql_version: DEFAULT_SQL_VERSION.into(),
            function_arn: Ref::arn_of("TestFunction"),
        }
    }

    #[test]
    fn select_all_query() {
        assert_eq!(
            TopicRuleSpec::<Ref>::select_all("test/topic"),
            "SELECT * FROM 'test/topic'"
        );
    }

    #[test]
    fn source_topic_extraction() {
        assert_eq!(
            rule("SELECT * FROM 'test/topic'").source_topic(),
            Some("test/topic")
        );
        assert_eq!(
            rule("select temperature, humidity from 'sensors/+/data' where temperature > 30")
                .source_topic(),
            Some("sensors/+/data")
        );
        assert_eq!(rule("DELETE everything").source_topic(), None);
    }

    #[test]
    fn prerequisites_skip_literals() {
        let attachment: Resource = Resource::PolicyPrincipalAttachment(PolicyAttachment {
            policy_name: Ref::name_of("IotPolicy"),
            principal: Ref::literal("arn:aws:iot:ap-northeast-1:1:cert/abc"),
        });
        assert_eq!(attachment.prerequisites(), vec![&NodeId::from("IotPolicy")]);
    }

    #[test]
    fn permission_depends_on_function_and_rule() {
        let permission: Resource = Resource::Permission(PermissionSpec {
            statement_id: "AddIotTopicRuleTrigger".into(),
            function_name: Ref::name_of("TestFunction"),
            action: INVOKE_FUNCTION_ACTION.into(),
            principal: IOT_SERVICE_PRINCIPAL.into(),
            source_arn: Ref::arn_of("TopicRule"),
        });
        let prereqs: Vec<&str> = permission
            .prerequisites()
            .into_iter()
            .map(NodeId::as_str)
            .collect();
        assert_eq!(prereqs, vec!["TestFunction", "TopicRule"]);
    }

    #[test]
    fn map_refs_resolves_every_reference() {
        let attachment: Resource = Resource::ThingPrincipalAttachment(ThingAttachment {
            thing_name: Ref::name_of("MyThing"),
            principal: Ref::literal("cert-arn"),
        });

        let resolved: ResolvedResource = attachment
            .map_refs(|r| match r {
                Ref::Literal(v) => Ok::<_, ()>(v.clone()),
                Ref::Attr { .. } => Ok("my-first-thing".to_string()),
            })
            .unwrap();

        assert_eq!(resolved.kind(), ResourceKind::ThingPrincipalAttachment);
        assert_eq!(resolved.physical_id(), "my-first-thing|cert-arn");
    }

    #[test]
    fn map_refs_propagates_errors() {
        let topic_rule: Resource = Resource::TopicRule(rule("SELECT * FROM 'a'"));
        let result: Result<ResolvedResource, &str> = topic_rule.map_refs(|_| Err("unresolved"));
        assert_eq!(result.unwrap_err(), "unresolved");
    }

    #[test]
    fn cfn_types() {
        assert_eq!(ResourceKind::Thing.cfn_type(), "AWS::IoT::Thing");
        assert_eq!(ResourceKind::Permission.cfn_type(), "AWS::Lambda::Permission");
    }
}
