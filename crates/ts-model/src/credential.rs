//! Source of the device credential a stack binds its thing and policy to.
//!
//! Certificates are issued outside the stack (e.g. `aws iot
//! create-keys-and-certificate`); the stack only ever references one.

use thiserror::Error;

use crate::arns::parse_arn;

/// Errors raised while obtaining a credential reference.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no certificate configured")]
    Missing,

    #[error("'{0}' is not a certificate ARN")]
    NotACertificate(String),
}

/// Provides the ARN of a pre-issued certificate.
pub trait CredentialSource: Send + Sync {
    fn certificate_arn(&self) -> Result<String, CredentialError>;
}

/// Credential fixed by configuration.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    arn: String,
}

impl StaticCredential {
    pub fn new(arn: impl Into<String>) -> Self {
        Self { arn: arn.into() }
    }
}

impl CredentialSource for StaticCredential {
    fn certificate_arn(&self) -> Result<String, CredentialError> {
        if self.arn.trim().is_empty() {
            return Err(CredentialError::Missing);
        }
        match parse_arn(&self.arn) {
            Some(parsed) if parsed.service == "iot" && parsed.resource.starts_with("cert/") => {
                Ok(self.arn.clone())
            }
            _ => Err(CredentialError::NotACertificate(self.arn.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_certificate_arn() {
        let arn = "arn:aws:iot:ap-northeast-1:123456789012:cert/4a50ae8f9d92";
        let source = StaticCredential::new(arn);
        assert_eq!(source.certificate_arn().unwrap(), arn);
    }

    #[test]
    fn empty_arn_is_missing() {
        let err = StaticCredential::new("  ").certificate_arn().unwrap_err();
        assert!(matches!(err, CredentialError::Missing));
    }

    #[test]
    fn non_certificate_arn_is_rejected() {
        let err = StaticCredential::new("arn:aws:iot:ap-northeast-1:1:thing/my-first-thing")
            .certificate_arn()
            .unwrap_err();
        assert!(err.to_string().contains("thing/my-first-thing"));
    }
}
