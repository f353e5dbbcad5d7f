//! The two stack variants, assembled from configuration.
//!
//! ```text
//! MyThing      ──▶ AttachCertificateToMyThing
//! IotPolicy    ──▶ AttachCertificateToPolicy
//! TestFunction ──▶ TopicRule ──▶ AddIotTopicRuleTrigger   (ThingWithTrigger only)
//! ```

use ts_model::{
    CredentialSource, FunctionSpec, INVOKE_FUNCTION_ACTION, IOT_SERVICE_PRINCIPAL, NodeId,
    PermissionSpec, PolicyAttachment, PolicySpec, Ref, Resource, StackConfig, StackVariant,
    ThingAttachment, ThingSpec, TopicRuleSpec,
};

use crate::error::{StackError, StackResult};
use crate::graph::ResourceGraph;

/// Logical ids of the nodes a stack declares.
pub mod ids {
    pub const THING: &str = "MyThing";
    pub const THING_CERTIFICATE: &str = "AttachCertificateToMyThing";
    pub const POLICY: &str = "IotPolicy";
    pub const POLICY_CERTIFICATE: &str = "AttachCertificateToPolicy";
    pub const FUNCTION: &str = "TestFunction";
    pub const TOPIC_RULE: &str = "TopicRule";
    pub const RULE_PERMISSION: &str = "AddIotTopicRuleTrigger";
}

/// Build the graph for the configured variant.
///
/// The certificate is obtained from `credentials`; it is referenced by the
/// bindings but never declared as a node of its own.
pub fn build_stack(
    config: &StackConfig,
    credentials: &dyn CredentialSource,
) -> StackResult<ResourceGraph> {
    let certificate_arn = credentials.certificate_arn()?;
    let mut graph = ResourceGraph::new();

    declare_device(&mut graph, config, &certificate_arn)?;

    if config.variant == StackVariant::ThingWithTrigger {
        declare_trigger(&mut graph, config)?;
    }

    graph.validate()?;

    tracing::info!(
        variant = ?config.variant,
        policy_shape = ?config.effective_policy_shape(),
        nodes = graph.len(),
        "stack assembled"
    );

    Ok(graph)
}

/// Thing, policy and their certificate bindings.
fn declare_device(
    graph: &mut ResourceGraph,
    config: &StackConfig,
    certificate_arn: &str,
) -> StackResult<()> {
    let thing = graph.declare(
        ids::THING,
        Resource::Thing(ThingSpec {
            thing_name: config.thing_name.clone(),
        }),
    )?;

    let thing_binding = graph.declare(
        ids::THING_CERTIFICATE,
        Resource::ThingPrincipalAttachment(ThingAttachment {
            thing_name: Ref::name_of(thing.clone()),
            principal: Ref::literal(certificate_arn),
        }),
    )?;

    let document = config.effective_policy_shape().document(
        &config.scope(),
        &config.thing_name,
        &config.topic_name,
    );
    let policy = graph.declare(
        ids::POLICY,
        Resource::Policy(PolicySpec {
            policy_name: config.policy_name.clone(),
            document,
        }),
    )?;

    let policy_binding = graph.declare(
        ids::POLICY_CERTIFICATE,
        Resource::PolicyPrincipalAttachment(PolicyAttachment {
            policy_name: Ref::name_of(policy.clone()),
            principal: Ref::literal(certificate_arn),
        }),
    )?;

    graph.add_dependency(&thing_binding, &thing)?;
    graph.add_dependency(&policy_binding, &policy)?;
    Ok(())
}

/// Handler function, the rule routing the topic to it, and the grant
/// letting that rule invoke it.
fn declare_trigger(graph: &mut ResourceGraph, config: &StackConfig) -> StackResult<()> {
    let role_arn = config
        .handler
        .role_arn
        .clone()
        .ok_or(StackError::MissingSetting("handler.role_arn"))?;

    let function: NodeId = graph.declare(
        ids::FUNCTION,
        Resource::Function(FunctionSpec {
            function_name: config.handler.function_name.clone(),
            code: config.handler.code.clone(),
            handler: config.handler.handler.clone(),
            runtime: config.handler.runtime.clone(),
            role_arn,
        }),
    )?;

    let topic_rule = TopicRuleSpec {
        rule_name: config.rule.rule_name.clone(),
        sql: TopicRuleSpec::<Ref>::select_all(&config.topic_name),
        sql_version: config.rule.sql_version.clone(),
        function_arn: Ref::arn_of(function.clone()),
    };
    // Quotes or an empty name would make the rule read some other topic.
    if topic_rule.source_topic() != Some(config.topic_name.as_str()) {
        return Err(StackError::InvalidTopic(config.topic_name.clone()));
    }
    let rule = graph.declare(ids::TOPIC_RULE, Resource::TopicRule(topic_rule))?;

    graph.declare(
        ids::RULE_PERMISSION,
        Resource::Permission(PermissionSpec {
            statement_id: config.rule.statement_id.clone(),
            function_name: Ref::name_of(function),
            action: INVOKE_FUNCTION_ACTION.to_string(),
            principal: IOT_SERVICE_PRINCIPAL.to_string(),
            source_arn: Ref::arn_of(rule),
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_model::{IotAction, PolicyShape, ResourceKind, StaticCredential};

    const CERT: &str = "arn:aws:iot:ap-northeast-1:123456789012:cert/4a50ae8f";

    fn config(variant: StackVariant) -> StackConfig {
        let mut config = StackConfig::new("ap-northeast-1", "123456789012", CERT);
        config.variant = variant;
        config.handler.role_arn = Some("arn:aws:iam::123456789012:role/handler".into());
        config
    }

    fn build(config: &StackConfig) -> ResourceGraph {
        build_stack(config, &StaticCredential::new(CERT)).unwrap()
    }

    #[test]
    fn thing_with_trigger_declares_seven_nodes() {
        let graph = build(&config(StackVariant::ThingWithTrigger));
        assert_eq!(graph.len(), 7);
        assert_eq!(graph.nodes_of_kind(ResourceKind::Function).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::TopicRule).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::Permission).len(), 1);
    }

    #[test]
    fn thing_only_declares_four_nodes() {
        let graph = build(&config(StackVariant::ThingOnly));
        assert_eq!(graph.len(), 4);
        assert!(graph.nodes_of_kind(ResourceKind::Function).is_empty());
    }

    #[test]
    fn plan_follows_dependency_chain() {
        let graph = build(&config(StackVariant::ThingWithTrigger));
        let plan = graph.plan().unwrap();
        let pos = |id: &str| plan.position(&NodeId::from(id)).unwrap();

        assert!(pos(ids::THING) < pos(ids::THING_CERTIFICATE));
        assert!(pos(ids::POLICY) < pos(ids::POLICY_CERTIFICATE));
        assert!(pos(ids::FUNCTION) < pos(ids::TOPIC_RULE));
        assert!(pos(ids::TOPIC_RULE) < pos(ids::RULE_PERMISSION));
    }

    #[test]
    fn grant_source_is_rule_arn() {
        let graph = build(&config(StackVariant::ThingWithTrigger));
        let grant = graph.get(&NodeId::from(ids::RULE_PERMISSION)).unwrap();

        let Resource::Permission(permission) = &grant.resource else {
            panic!("expected permission");
        };
        assert_eq!(permission.source_arn, Ref::arn_of(ids::TOPIC_RULE));
        assert_ne!(permission.source_arn, Ref::arn_of(ids::FUNCTION));
        assert_eq!(permission.principal, "iot.amazonaws.com");
        assert_eq!(permission.action, "lambda:InvokeFunction");
    }

    #[test]
    fn rule_reads_configured_topic() {
        let graph = build(&config(StackVariant::ThingWithTrigger));
        let rule = graph.get(&NodeId::from(ids::TOPIC_RULE)).unwrap();

        let Resource::TopicRule(rule) = &rule.resource else {
            panic!("expected topic rule");
        };
        assert_eq!(rule.sql, "SELECT * FROM 'test/topic'");
        assert_eq!(rule.source_topic(), Some("test/topic"));
        assert_eq!(rule.function_arn, Ref::arn_of(ids::FUNCTION));
    }

    #[test]
    fn bindings_use_credential_arn() {
        let graph = build(&config(StackVariant::ThingOnly));
        let binding = graph.get(&NodeId::from(ids::POLICY_CERTIFICATE)).unwrap();

        let Resource::PolicyPrincipalAttachment(binding) = &binding.resource else {
            panic!("expected policy attachment");
        };
        assert_eq!(binding.principal, Ref::literal(CERT));
        assert_eq!(binding.policy_name, Ref::name_of(ids::POLICY));
    }

    #[test]
    fn policy_shape_override_applies() {
        let mut cfg = config(StackVariant::ThingOnly);
        cfg.policy_shape = Some(PolicyShape::NarrowTopic);
        let graph = build(&cfg);
        let policy = graph.get(&NodeId::from(ids::POLICY)).unwrap();

        let Resource::Policy(policy) = &policy.resource else {
            panic!("expected policy");
        };
        assert_eq!(policy.document.statements.len(), 3);
        assert_eq!(policy.document.statements[0].actions, vec![IotAction::Connect]);
    }

    #[test]
    fn trigger_requires_role() {
        let mut cfg = config(StackVariant::ThingWithTrigger);
        cfg.handler.role_arn = None;
        let err = build_stack(&cfg, &StaticCredential::new(CERT)).unwrap_err();
        assert!(matches!(err, StackError::MissingSetting("handler.role_arn")));

        cfg.variant = StackVariant::ThingOnly;
        assert!(build_stack(&cfg, &StaticCredential::new(CERT)).is_ok());
    }

    #[test]
    fn topic_must_round_trip_through_rule_query() {
        for topic in ["", "it's/here"] {
            let mut cfg = config(StackVariant::ThingWithTrigger);
            cfg.topic_name = topic.into();
            let err = build_stack(&cfg, &StaticCredential::new(CERT)).unwrap_err();
            assert!(matches!(err, StackError::InvalidTopic(t) if t == topic));
        }

        let mut cfg = config(StackVariant::ThingWithTrigger);
        cfg.topic_name = "sensors/+/temperature".into();
        assert!(build_stack(&cfg, &StaticCredential::new(CERT)).is_ok());
    }

    #[test]
    fn invalid_credential_aborts_build() {
        let cfg = config(StackVariant::ThingOnly);
        let err = build_stack(&cfg, &StaticCredential::new("")).unwrap_err();
        assert!(matches!(err, StackError::Credential(_)));
    }
}
