//! E2E tests for deploy → redeploy → destroy against the mock provider.

mod helpers;

use helpers::{ACCOUNT, CERT, REGION, TestHarness};
use ts_deployer::NodeStatus;
use ts_graph::ids;
use ts_model::{NodeId, Resource, ResourceKind, StackVariant};
use ts_provider::Operation;

fn arn_of(report: &ts_deployer::DeploymentReport, id: &str) -> String {
    report
        .outcome(&NodeId::from(id))
        .and_then(|o| o.arn.clone())
        .unwrap()
}

/// Full trigger stack: seven resources, ARNs minted in the configured account.
#[tokio::test]
async fn e2e_deploy_trigger_stack() {
    let h = TestHarness::new(StackVariant::ThingWithTrigger);
    let report = h.deploy().await.unwrap();

    assert_eq!(report.outcomes.len(), 7);
    assert!(report.all(NodeStatus::Created));
    assert_eq!(
        arn_of(&report, ids::THING),
        format!("arn:aws:iot:{REGION}:{ACCOUNT}:thing/my-first-thing")
    );
    assert_eq!(
        arn_of(&report, ids::FUNCTION),
        format!("arn:aws:lambda:{REGION}:{ACCOUNT}:function:test-function-iot-core")
    );

    for kind in [
        ResourceKind::Thing,
        ResourceKind::ThingPrincipalAttachment,
        ResourceKind::Policy,
        ResourceKind::PolicyPrincipalAttachment,
        ResourceKind::Function,
        ResourceKind::TopicRule,
        ResourceKind::Permission,
    ] {
        assert_eq!(h.provider.count(kind), 1, "{kind}");
    }
}

/// Device-only stack: four resources, nothing on the Lambda side.
#[tokio::test]
async fn e2e_deploy_device_stack() {
    let h = TestHarness::new(StackVariant::ThingOnly);
    let report = h.deploy().await.unwrap();

    assert_eq!(report.count(NodeStatus::Created), 4);
    assert_eq!(h.provider.count(ResourceKind::Function), 0);
    assert_eq!(h.provider.count(ResourceKind::TopicRule), 0);
    assert!(h
        .provider
        .exists(ResourceKind::ThingPrincipalAttachment, &format!("my-first-thing|{CERT}")));
    assert!(h
        .provider
        .exists(ResourceKind::PolicyPrincipalAttachment, &format!("iot-policy|{CERT}")));
}

/// Every dependent is submitted after the resources it references.
#[tokio::test]
async fn e2e_creates_follow_dependencies() {
    let h = TestHarness::new(StackVariant::ThingWithTrigger);
    h.deploy().await.unwrap();

    let kinds: Vec<ResourceKind> = h
        .provider
        .calls_of(Operation::Create)
        .iter()
        .map(|c| c.kind)
        .collect();
    let pos = |kind: ResourceKind| kinds.iter().position(|k| *k == kind).unwrap();

    assert!(pos(ResourceKind::Thing) < pos(ResourceKind::ThingPrincipalAttachment));
    assert!(pos(ResourceKind::Policy) < pos(ResourceKind::PolicyPrincipalAttachment));
    assert!(pos(ResourceKind::Function) < pos(ResourceKind::TopicRule));
    assert!(pos(ResourceKind::TopicRule) < pos(ResourceKind::Permission));
}

/// Resolved references carry the provisioned values, not logical ids.
#[tokio::test]
async fn e2e_references_resolve_to_provisioned_values() {
    let h = TestHarness::new(StackVariant::ThingWithTrigger);
    let report = h.deploy().await.unwrap();
    let creates = h.provider.calls_of(Operation::Create);

    let rule = creates
        .iter()
        .find_map(|c| match &c.resource {
            Resource::TopicRule(rule) => Some(rule.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(rule.function_arn, arn_of(&report, ids::FUNCTION));

    let grant = creates
        .iter()
        .find_map(|c| match &c.resource {
            Resource::Permission(permission) => Some(permission.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(grant.source_arn, arn_of(&report, ids::TOPIC_RULE));
    assert_eq!(grant.function_name, "test-function-iot-core");
}

/// Deploying the same stack twice creates nothing new.
#[tokio::test]
async fn e2e_redeploy_is_idempotent() {
    let h = TestHarness::new(StackVariant::ThingWithTrigger);
    h.deploy().await.unwrap();
    h.provider.reset_calls();

    let second = h.deploy().await.unwrap();
    assert_eq!(second.outcomes.len(), 7);
    assert!(second.all(NodeStatus::Unchanged));
    assert!(h.provider.calls_of(Operation::Create).is_empty());
    assert_eq!(h.provider.calls_of(Operation::Lookup).len(), 7);
    assert_eq!(h.provider.count(ResourceKind::Thing), 1);
}

/// A partially deployed stack is completed, not duplicated.
#[tokio::test]
async fn e2e_deploy_completes_partial_stack() {
    let device = TestHarness::new(StackVariant::ThingOnly);
    device.deploy().await.unwrap();

    // Same provider, wider stack.
    let mut h = TestHarness::new(StackVariant::ThingWithTrigger);
    h.provider = device.provider.clone();

    let report = h.deploy().await.unwrap();
    assert_eq!(report.count(NodeStatus::Unchanged), 4);
    assert_eq!(report.count(NodeStatus::Created), 3);
    assert_eq!(
        report.outcome(&NodeId::from(ids::THING)).unwrap().status,
        NodeStatus::Unchanged
    );
}

/// Destroy removes everything; a second destroy finds nothing.
#[tokio::test]
async fn e2e_destroy_then_destroy_again() {
    let h = TestHarness::new(StackVariant::ThingWithTrigger);
    h.deploy().await.unwrap();

    let first = h.destroy().await.unwrap();
    assert!(first.all(NodeStatus::Deleted));
    assert_eq!(first.outcomes[0].id.as_str(), ids::RULE_PERMISSION);

    let second = h.destroy().await.unwrap();
    assert_eq!(second.outcomes.len(), 7);
    assert!(second.all(NodeStatus::Absent));
}

/// Destroy of a device-only stack leaves a wider deployment's handler alone.
#[tokio::test]
async fn e2e_destroy_only_touches_declared_nodes() {
    let h = TestHarness::new(StackVariant::ThingWithTrigger);
    h.deploy().await.unwrap();

    let mut device = TestHarness::new(StackVariant::ThingOnly);
    device.provider = h.provider.clone();
    let report = device.destroy().await.unwrap();

    assert_eq!(report.count(NodeStatus::Deleted), 4);
    assert_eq!(h.provider.count(ResourceKind::Thing), 0);
    assert_eq!(h.provider.count(ResourceKind::Function), 1);
    assert_eq!(h.provider.count(ResourceKind::TopicRule), 1);
}

/// Deploy after destroy recreates the stack from scratch.
#[tokio::test]
async fn e2e_redeploy_after_destroy() {
    let h = TestHarness::new(StackVariant::ThingOnly);
    h.deploy().await.unwrap();
    h.destroy().await.unwrap();

    let report = h.deploy().await.unwrap();
    assert!(report.all(NodeStatus::Created));
    assert_eq!(h.provider.count(ResourceKind::Policy), 1);
}
