//! AWS provider backed by the IoT and Lambda control planes.
//!
//! Thing, attachment, policy and topic-rule declarations go to AWS IoT;
//! function and permission declarations go to Lambda. SDK errors are
//! passed through verbatim via `DisplayErrorContext`.

use std::future::Future;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_iot::error::DisplayErrorContext;
use aws_sdk_iot::types::{Action, LambdaAction, TopicRulePayload};
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{FunctionCode, Runtime};
use ts_model::{
    FunctionSpec, PermissionSpec, PolicyAttachment, PolicySpec, ResolvedResource, Resource,
    ThingAttachment, ThingSpec, TopicRuleSpec,
};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::package;
use crate::provider::{Provider, Provisioned};

/// Provider backed by the AWS SDK.
pub struct AwsProvider {
    iot: aws_sdk_iot::Client,
    lambda: aws_sdk_lambda::Client,
}

fn api_error<E>(operation: &'static str, err: E) -> ProviderError
where
    E: std::error::Error + 'static,
{
    ProviderError::Api {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// One page of a list call and the token of the page after it.
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, next: Option<&str>) -> Self {
        Self {
            items,
            next: next.filter(|token| !token.is_empty()).map(str::to_string),
        }
    }

    fn last() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }
}

/// Walk pages from `fetch` until an item satisfies `matches`.
async fn find_paged<T, F, Fut>(
    mut fetch: F,
    mut matches: impl FnMut(&T) -> bool,
) -> ProviderResult<Option<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ProviderResult<Page<T>>>,
{
    let mut token = None;
    loop {
        let page = fetch(token.take()).await?;
        if let Some(found) = page.items.into_iter().find(|item| matches(item)) {
            return Ok(Some(found));
        }
        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(None),
        }
    }
}

impl AwsProvider {
    /// Create a provider from pre-built SDK clients.
    pub fn new(iot: aws_sdk_iot::Client, lambda: aws_sdk_lambda::Client) -> Self {
        Self { iot, lambda }
    }

    /// Load shared AWS configuration and build both clients.
    ///
    /// `default_region` is used when the config doesn't override it.
    pub async fn from_config(config: &ProviderConfig, default_region: &str) -> Self {
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| default_region.to_string());

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        Self::new(
            aws_sdk_iot::Client::new(&shared),
            aws_sdk_lambda::Client::new(&shared),
        )
    }

    // ── Lookups ───────────────────────────────────────────────

    async fn lookup_thing(&self, thing: &ThingSpec) -> ProviderResult<Option<Provisioned>> {
        match self
            .iot
            .describe_thing()
            .thing_name(&thing.thing_name)
            .send()
            .await
        {
            Ok(out) => Ok(Some(Provisioned {
                name: thing.thing_name.clone(),
                arn: owned(out.thing_arn()),
            })),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(api_error("DescribeThing", e)),
        }
    }

    async fn lookup_thing_attachment(
        &self,
        attachment: &ThingAttachment<String>,
    ) -> ProviderResult<Option<Provisioned>> {
        let found = find_paged(
            |token| async move {
                match self
                    .iot
                    .list_thing_principals()
                    .thing_name(&attachment.thing_name)
                    .set_next_token(token)
                    .send()
                    .await
                {
                    Ok(out) => Ok(Page::new(out.principals().to_vec(), out.next_token())),
                    Err(e)
                        if e.as_service_error()
                            .is_some_and(|se| se.is_resource_not_found_exception()) =>
                    {
                        Ok(Page::last())
                    }
                    Err(e) => Err(api_error("ListThingPrincipals", e)),
                }
            },
            |principal| *principal == attachment.principal,
        )
        .await?;

        Ok(found.map(|_| {
            Provisioned::named(format!("{}|{}", attachment.thing_name, attachment.principal))
        }))
    }

    async fn lookup_policy(&self, policy: &PolicySpec) -> ProviderResult<Option<Provisioned>> {
        match self
            .iot
            .get_policy()
            .policy_name(&policy.policy_name)
            .send()
            .await
        {
            Ok(out) => Ok(Some(Provisioned {
                name: policy.policy_name.clone(),
                arn: owned(out.policy_arn()),
            })),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(api_error("GetPolicy", e)),
        }
    }

    async fn lookup_policy_attachment(
        &self,
        attachment: &PolicyAttachment<String>,
    ) -> ProviderResult<Option<Provisioned>> {
        let found = find_paged(
            |marker| async move {
                match self
                    .iot
                    .list_attached_policies()
                    .target(&attachment.principal)
                    .set_marker(marker)
                    .send()
                    .await
                {
                    Ok(out) => {
                        let names = out
                            .policies()
                            .iter()
                            .filter_map(|p| p.policy_name().map(str::to_string))
                            .collect();
                        Ok(Page::new(names, out.next_marker()))
                    }
                    Err(e)
                        if e.as_service_error()
                            .is_some_and(|se| se.is_resource_not_found_exception()) =>
                    {
                        Ok(Page::last())
                    }
                    Err(e) => Err(api_error("ListAttachedPolicies", e)),
                }
            },
            |name| *name == attachment.policy_name,
        )
        .await?;

        Ok(found.map(|_| {
            Provisioned::named(format!("{}|{}", attachment.policy_name, attachment.principal))
        }))
    }

    async fn lookup_function(&self, function: &FunctionSpec) -> ProviderResult<Option<Provisioned>> {
        match self
            .lambda
            .get_function()
            .function_name(&function.function_name)
            .send()
            .await
        {
            Ok(out) => Ok(Some(Provisioned {
                name: function.function_name.clone(),
                arn: owned(out.configuration().and_then(|c| c.function_arn())),
            })),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(api_error("GetFunction", e)),
        }
    }

    async fn lookup_topic_rule(
        &self,
        rule: &TopicRuleSpec<String>,
    ) -> ProviderResult<Option<Provisioned>> {
        find_paged(
            |token| async move {
                let out = self
                    .iot
                    .list_topic_rules()
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| api_error("ListTopicRules", e))?;
                let rules = out
                    .rules()
                    .iter()
                    .filter_map(|r| {
                        r.rule_name().map(|name| Provisioned {
                            name: name.to_string(),
                            arn: owned(r.rule_arn()),
                        })
                    })
                    .collect();
                Ok(Page::new(rules, out.next_token()))
            },
            |found| found.name == rule.rule_name,
        )
        .await
    }

    async fn lookup_permission(
        &self,
        permission: &PermissionSpec<String>,
    ) -> ProviderResult<Option<Provisioned>> {
        let out = match self
            .lambda
            .get_policy()
            .function_name(&permission.function_name)
            .send()
            .await
        {
            Ok(out) => out,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(api_error("GetPolicy", e)),
        };

        let Some(policy) = out.policy() else {
            return Ok(None);
        };
        let document: serde_json::Value = serde_json::from_str(policy)
            .map_err(|e| ProviderError::Other(format!("unreadable function policy: {e}")))?;

        let granted = document["Statement"]
            .as_array()
            .is_some_and(|statements| {
                statements
                    .iter()
                    .any(|s| s["Sid"] == permission.statement_id.as_str())
            });
        Ok(granted.then(|| {
            Provisioned::named(format!(
                "{}|{}",
                permission.function_name, permission.statement_id
            ))
        }))
    }

    // ── Creation ──────────────────────────────────────────────

    async fn create_topic_rule(&self, rule: &TopicRuleSpec<String>) -> ProviderResult<Provisioned> {
        let lambda = LambdaAction::builder()
            .function_arn(&rule.function_arn)
            .build()
            .map_err(|e| api_error("CreateTopicRule", e))?;
        let payload = TopicRulePayload::builder()
            .sql(&rule.sql)
            .aws_iot_sql_version(&rule.sql_version)
            .actions(Action::builder().lambda(lambda).build())
            .build()
            .map_err(|e| api_error("CreateTopicRule", e))?;

        self.iot
            .create_topic_rule()
            .rule_name(&rule.rule_name)
            .topic_rule_payload(payload)
            .send()
            .await
            .map_err(|e| api_error("CreateTopicRule", e))?;

        // CreateTopicRule returns no body; the ARN comes from GetTopicRule.
        let out = self
            .iot
            .get_topic_rule()
            .rule_name(&rule.rule_name)
            .send()
            .await
            .map_err(|e| api_error("GetTopicRule", e))?;

        Ok(Provisioned {
            name: rule.rule_name.clone(),
            arn: owned(out.rule_arn()),
        })
    }

    async fn create_function(&self, function: &FunctionSpec) -> ProviderResult<Provisioned> {
        let archive = package::inline_archive(&function.code)?;

        let out = self
            .lambda
            .create_function()
            .function_name(&function.function_name)
            .runtime(Runtime::from(function.runtime.as_str()))
            .handler(&function.handler)
            .role(&function.role_arn)
            .code(FunctionCode::builder().zip_file(Blob::new(archive)).build())
            .send()
            .await
            .map_err(|e| api_error("CreateFunction", e))?;

        Ok(Provisioned {
            name: function.function_name.clone(),
            arn: owned(out.function_arn()),
        })
    }
}

#[async_trait]
impl Provider for AwsProvider {
    async fn lookup(&self, resource: &ResolvedResource) -> ProviderResult<Option<Provisioned>> {
        tracing::debug!(kind = %resource.kind(), id = %resource.physical_id(), "aws lookup");
        match resource {
            Resource::Thing(t) => self.lookup_thing(t).await,
            Resource::ThingPrincipalAttachment(a) => self.lookup_thing_attachment(a).await,
            Resource::Policy(p) => self.lookup_policy(p).await,
            Resource::PolicyPrincipalAttachment(a) => self.lookup_policy_attachment(a).await,
            Resource::Function(f) => self.lookup_function(f).await,
            Resource::TopicRule(r) => self.lookup_topic_rule(r).await,
            Resource::Permission(p) => self.lookup_permission(p).await,
        }
    }

    async fn create(&self, resource: &ResolvedResource) -> ProviderResult<Provisioned> {
        tracing::debug!(kind = %resource.kind(), id = %resource.physical_id(), "aws create");
        let name = resource.physical_id();

        match resource {
            Resource::Thing(t) => {
                let out = self
                    .iot
                    .create_thing()
                    .thing_name(&t.thing_name)
                    .send()
                    .await
                    .map_err(|e| api_error("CreateThing", e))?;
                Ok(Provisioned {
                    name,
                    arn: owned(out.thing_arn()),
                })
            }
            Resource::ThingPrincipalAttachment(a) => {
                self.iot
                    .attach_thing_principal()
                    .thing_name(&a.thing_name)
                    .principal(&a.principal)
                    .send()
                    .await
                    .map_err(|e| api_error("AttachThingPrincipal", e))?;
                Ok(Provisioned::named(name))
            }
            Resource::Policy(p) => {
                let document = p
                    .document
                    .to_json()
                    .map_err(|e| ProviderError::Other(format!("policy document: {e}")))?;
                let out = self
                    .iot
                    .create_policy()
                    .policy_name(&p.policy_name)
                    .policy_document(document)
                    .send()
                    .await
                    .map_err(|e| api_error("CreatePolicy", e))?;
                Ok(Provisioned {
                    name,
                    arn: owned(out.policy_arn()),
                })
            }
            Resource::PolicyPrincipalAttachment(a) => {
                self.iot
                    .attach_policy()
                    .policy_name(&a.policy_name)
                    .target(&a.principal)
                    .send()
                    .await
                    .map_err(|e| api_error("AttachPolicy", e))?;
                Ok(Provisioned::named(name))
            }
            Resource::Function(f) => self.create_function(f).await,
            Resource::TopicRule(r) => self.create_topic_rule(r).await,
            Resource::Permission(p) => {
                self.lambda
                    .add_permission()
                    .function_name(&p.function_name)
                    .statement_id(&p.statement_id)
                    .action(&p.action)
                    .principal(&p.principal)
                    .source_arn(&p.source_arn)
                    .send()
                    .await
                    .map_err(|e| api_error("AddPermission", e))?;
                Ok(Provisioned::named(name))
            }
        }
    }

    async fn delete(&self, resource: &ResolvedResource) -> ProviderResult<()> {
        tracing::debug!(kind = %resource.kind(), id = %resource.physical_id(), "aws delete");

        match resource {
            Resource::Thing(t) => {
                self.iot
                    .delete_thing()
                    .thing_name(&t.thing_name)
                    .send()
                    .await
                    .map_err(|e| api_error("DeleteThing", e))?;
            }
            Resource::ThingPrincipalAttachment(a) => {
                self.iot
                    .detach_thing_principal()
                    .thing_name(&a.thing_name)
                    .principal(&a.principal)
                    .send()
                    .await
                    .map_err(|e| api_error("DetachThingPrincipal", e))?;
            }
            Resource::Policy(p) => {
                self.iot
                    .delete_policy()
                    .policy_name(&p.policy_name)
                    .send()
                    .await
                    .map_err(|e| api_error("DeletePolicy", e))?;
            }
            Resource::PolicyPrincipalAttachment(a) => {
                self.iot
                    .detach_policy()
                    .policy_name(&a.policy_name)
                    .target(&a.principal)
                    .send()
                    .await
                    .map_err(|e| api_error("DetachPolicy", e))?;
            }
            Resource::Function(f) => {
                self.lambda
                    .delete_function()
                    .function_name(&f.function_name)
                    .send()
                    .await
                    .map_err(|e| api_error("DeleteFunction", e))?;
            }
            Resource::TopicRule(r) => {
                self.iot
                    .delete_topic_rule()
                    .rule_name(&r.rule_name)
                    .send()
                    .await
                    .map_err(|e| api_error("DeleteTopicRule", e))?;
            }
            Resource::Permission(p) => {
                self.lambda
                    .remove_permission()
                    .function_name(&p.function_name)
                    .statement_id(&p.statement_id)
                    .send()
                    .await
                    .map_err(|e| api_error("RemovePermission", e))?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "aws"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn pages() -> Vec<Page<&'static str>> {
        vec![
            Page::new(vec!["a", "b"], Some("p2")),
            Page::new(vec!["c", "d"], Some("p3")),
            Page::new(vec!["e"], Some("")),
        ]
    }

    #[tokio::test]
    async fn find_paged_reads_past_first_page() {
        let calls = Cell::new(0);
        let tokens = RefCell::new(Vec::new());
        let mut remaining = pages().into_iter();
        let found = find_paged(
            |token| {
                calls.set(calls.get() + 1);
                tokens.borrow_mut().push(token);
                let page = remaining.next().unwrap();
                async move { Ok(page) }
            },
            |item| *item == "d",
        )
        .await
        .unwrap();

        assert_eq!(found, Some("d"));
        assert_eq!(calls.get(), 2);
        assert_eq!(*tokens.borrow(), vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn find_paged_stops_on_empty_token() {
        let calls = Cell::new(0);
        let mut remaining = pages().into_iter();
        let found = find_paged(
            |_| {
                calls.set(calls.get() + 1);
                let page = remaining.next().unwrap();
                async move { Ok(page) }
            },
            |item| *item == "z",
        )
        .await
        .unwrap();

        assert_eq!(found, None);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn find_paged_propagates_page_error() {
        let result: ProviderResult<Option<&str>> = find_paged(
            |_| async {
                Err(ProviderError::Api {
                    operation: "ListThingPrincipals",
                    message: "throttled".into(),
                })
            },
            |_| true,
        )
        .await;
        assert!(result.unwrap_err().to_string().contains("throttled"));
    }

    #[test]
    fn last_page_has_no_token() {
        let page: Page<u8> = Page::last();
        assert!(page.items.is_empty());
        assert!(page.next.is_none());
    }
}
