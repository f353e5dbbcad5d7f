//! CloudFormation-shaped rendering of a resource graph, plus the queries
//! tests use to assert on it.
//!
//! References render as intrinsic functions: a `Name` reference becomes
//! `{"Ref": "<LogicalId>"}` and an `Arn` reference becomes
//! `{"Fn::GetAtt": ["<LogicalId>", "Arn"]}`.

use serde_json::{Map, Value, json};
use ts_model::{Attribute, Ref, Resource};

use crate::graph::{Node, ResourceGraph};

/// Synthesized template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    body: Value,
}

impl Template {
    /// Render every node of the graph.
    pub fn from_graph(graph: &ResourceGraph) -> Self {
        let resources: Map<String, Value> = graph
            .nodes()
            .map(|node| (node.id.to_string(), render_node(node)))
            .collect();

        Self {
            body: json!({ "Resources": resources }),
        }
    }

    pub fn as_json(&self) -> &Value {
        &self.body
    }

    pub fn to_pretty_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.body)
    }

    /// Resources of a CloudFormation type, as `(logical id, resource)` pairs.
    pub fn find_resources(&self, cfn_type: &str) -> Vec<(&str, &Value)> {
        self.body["Resources"]
            .as_object()
            .map(|resources| {
                resources
                    .iter()
                    .filter(|(_, r)| r["Type"] == cfn_type)
                    .map(|(id, r)| (id.as_str(), r))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn resource_count(&self, cfn_type: &str) -> usize {
        self.find_resources(cfn_type).len()
    }

    pub fn resource_count_is(&self, cfn_type: &str, count: usize) -> bool {
        self.resource_count(cfn_type) == count
    }

    /// Whether some resource of `cfn_type` has properties containing
    /// `expected`. Objects match on a subset of keys; arrays and scalars
    /// must match exactly.
    pub fn has_resource_properties(&self, cfn_type: &str, expected: &Value) -> bool {
        self.find_resources(cfn_type)
            .into_iter()
            .any(|(_, r)| object_like(&r["Properties"], expected))
    }
}

fn object_like(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(k, v)| actual.get(k).is_some_and(|a| object_like(a, v))),
        _ => actual == expected,
    }
}

fn render_ref(reference: &Ref) -> Value {
    match reference {
        Ref::Literal(value) => Value::String(value.clone()),
        Ref::Attr {
            node,
            attribute: Attribute::Name,
        } => json!({ "Ref": node.as_str() }),
        Ref::Attr {
            node,
            attribute: Attribute::Arn,
        } => json!({ "Fn::GetAtt": [node.as_str(), "Arn"] }),
    }
}

fn render_properties(resource: &Resource) -> Value {
    match resource {
        Resource::Thing(t) => json!({ "ThingName": t.thing_name }),
        Resource::ThingPrincipalAttachment(a) => json!({
            "Principal": render_ref(&a.principal),
            "ThingName": render_ref(&a.thing_name),
        }),
        Resource::Policy(p) => json!({
            "PolicyDocument": p.document,
            "PolicyName": p.policy_name,
        }),
        Resource::PolicyPrincipalAttachment(a) => json!({
            "PolicyName": render_ref(&a.policy_name),
            "Principal": render_ref(&a.principal),
        }),
        Resource::Function(f) => json!({
            "Code": { "ZipFile": f.code },
            "FunctionName": f.function_name,
            "Handler": f.handler,
            "Role": f.role_arn,
            "Runtime": f.runtime,
        }),
        Resource::TopicRule(r) => json!({
            "RuleName": r.rule_name,
            "TopicRulePayload": {
                "Actions": [
                    { "Lambda": { "FunctionArn": render_ref(&r.function_arn) } }
                ],
                "AwsIotSqlVersion": r.sql_version,
                "Sql": r.sql,
            },
        }),
        Resource::Permission(p) => json!({
            "Action": p.action,
            "FunctionName": render_ref(&p.function_name),
            "Principal": p.principal,
            "SourceArn": render_ref(&p.source_arn),
        }),
    }
}

fn render_node(node: &Node) -> Value {
    let mut rendered = json!({
        "Type": node.kind().cfn_type(),
        "Properties": render_properties(&node.resource),
    });

    if !node.depends_on.is_empty() {
        let mut depends_on: Vec<&str> = node.depends_on.iter().map(|id| id.as_str()).collect();
        depends_on.sort_unstable();
        rendered["DependsOn"] = json!(depends_on);
    }

    rendered
}
