//! ARN builders and parsers for the IoT and Lambda resources of a stack.
//!
//! ARN structure:
//! ```text
//! arn:aws:iot:{region}:{account}:client/{client_id}
//! arn:aws:iot:{region}:{account}:topic/{topic}
//! arn:aws:iot:{region}:{account}:topicfilter/{topic_filter}
//! arn:aws:iot:{region}:{account}:thing/{thing_name}
//! arn:aws:iot:{region}:{account}:policy/{policy_name}
//! arn:aws:iot:{region}:{account}:rule/{rule_name}
//! arn:aws:iot:{region}:{account}:cert/{certificate_id}
//! arn:aws:lambda:{region}:{account}:function:{function_name}
//! ```

const PARTITION: &str = "aws";

/// Wildcard usable in place of a client id or topic.
pub const ANY: &str = "*";

/// Region and account a set of ARNs is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnScope {
    pub region: String,
    pub account_id: String,
}

impl ArnScope {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    fn iot(&self, resource: &str) -> String {
        format!(
            "arn:{PARTITION}:iot:{}:{}:{resource}",
            self.region, self.account_id
        )
    }

    // ─── MQTT authorization resources ───

    pub fn client(&self, client_id: &str) -> String {
        self.iot(&format!("client/{client_id}"))
    }

    pub fn topic(&self, topic: &str) -> String {
        self.iot(&format!("topic/{topic}"))
    }

    pub fn topic_filter(&self, topic_filter: &str) -> String {
        self.iot(&format!("topicfilter/{topic_filter}"))
    }

    // ─── Registry resources ───

    pub fn thing(&self, thing_name: &str) -> String {
        self.iot(&format!("thing/{thing_name}"))
    }

    pub fn policy(&self, policy_name: &str) -> String {
        self.iot(&format!("policy/{policy_name}"))
    }

    pub fn rule(&self, rule_name: &str) -> String {
        self.iot(&format!("rule/{rule_name}"))
    }

    // ─── Lambda ───

    pub fn function(&self, function_name: &str) -> String {
        format!(
            "arn:{PARTITION}:lambda:{}:{}:function:{function_name}",
            self.region, self.account_id
        )
    }
}

// ─── ARN parsing ───

/// Parsed ARN components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    /// Everything after the account id, e.g. `cert/4a50...` or `function:name`.
    pub resource: String,
}

/// Parse an ARN string into its components.
/// Returns `None` if the string doesn't have the six `:`-separated fields.
pub fn parse_arn(arn: &str) -> Option<ParsedArn> {
    let mut parts = arn.splitn(6, ':');

    if parts.next() != Some("arn") {
        return None;
    }

    let partition = parts.next()?;
    let service = parts.next()?;
    let region = parts.next()?;
    let account_id = parts.next()?;
    let resource = parts.next()?;

    if partition.is_empty() || service.is_empty() || resource.is_empty() {
        return None;
    }

    Some(ParsedArn {
        partition: partition.to_string(),
        service: service.to_string(),
        region: region.to_string(),
        account_id: account_id.to_string(),
        resource: resource.to_string(),
    })
}
