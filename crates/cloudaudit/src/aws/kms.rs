//! KMS key validation for topic encryption

use super::context::{AwsContext, FromAwsContext};
use super::error::{AwsError, classify_sdk_error, describe_sdk_error};
use aws_sdk_kms::types::{KeyMetadata, KeyState};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Error returned when a string is not a usable KMS key ARN
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArnError {
    #[error("Invalid KMS key ARN format: {0}")]
    Format(String),
}

/// Parsed `arn:<partition>:kms:<region>:<account>:key/<id>` (or `alias/<name>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsKeyArn {
    pub partition: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

impl FromStr for KmsKeyArn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArnError::Format(s.to_string());
        let parts: Vec<&str> = s.splitn(6, ':').collect();
        let [prefix, partition, service, region, account, resource] = parts[..] else {
            return Err(invalid());
        };

        if prefix != "arn" || service != "kms" || partition.is_empty() || region.is_empty() {
            return Err(invalid());
        }
        if account.is_empty() || !account.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let named = resource
            .strip_prefix("key/")
            .or_else(|| resource.strip_prefix("alias/"))
            .is_some_and(|name| !name.is_empty());
        if !named {
            return Err(invalid());
        }

        Ok(Self {
            partition: partition.to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource: resource.to_string(),
        })
    }
}

/// Outcome of validating a key before it is applied to topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KmsKeyStatus {
    Valid,
    Disabled,
    /// Any key state other than `Enabled` or `Disabled`
    State(String),
    NotFound,
    InvalidArn,
    Error(String),
}

impl KmsKeyStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, KmsKeyStatus::Valid)
    }

    /// Console message for this status
    pub fn message(&self, key_arn: &str) -> String {
        match self {
            KmsKeyStatus::Valid => format!("KMS key {key_arn} is valid and enabled"),
            KmsKeyStatus::Disabled => format!("KMS key {key_arn} is disabled"),
            KmsKeyStatus::State(state) => format!("KMS key {key_arn} is in {state} state"),
            KmsKeyStatus::NotFound => format!("KMS key {key_arn} does not exist"),
            KmsKeyStatus::InvalidArn => format!("Invalid KMS key ARN format: {key_arn}"),
            KmsKeyStatus::Error(e) => format!("Error validating KMS key: {e}"),
        }
    }

    /// A key is usable only when it is both enabled and in the `Enabled` state
    fn from_metadata(metadata: &KeyMetadata) -> Self {
        if !metadata.enabled() {
            return KmsKeyStatus::Disabled;
        }
        match metadata.key_state() {
            Some(KeyState::Enabled) => KmsKeyStatus::Valid,
            Some(KeyState::Disabled) => KmsKeyStatus::Disabled,
            Some(other) => KmsKeyStatus::State(other.as_str().to_string()),
            None => KmsKeyStatus::State("unknown".to_string()),
        }
    }
}

impl fmt::Display for KmsKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KmsKeyStatus::Valid => "valid",
            KmsKeyStatus::Disabled => "disabled",
            KmsKeyStatus::State(state) => state.as_str(),
            KmsKeyStatus::NotFound => "not found",
            KmsKeyStatus::InvalidArn => "invalid ARN",
            KmsKeyStatus::Error(_) => "error",
        };
        f.write_str(label)
    }
}

/// Trait for key validation so the SNS workflow can be tested with mocks
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait KeyValidation: Send + Sync {
    async fn validate_kms_key(&self, key_arn: &str) -> KmsKeyStatus;
}

/// KMS client; calls are made in the region named by the key ARN
pub struct KmsClient {
    ctx: AwsContext,
}

impl FromAwsContext for KmsClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl KeyValidation for KmsClient {
    async fn validate_kms_key(&self, key_arn: &str) -> KmsKeyStatus {
        let arn = match key_arn.parse::<KmsKeyArn>() {
            Ok(arn) => arn,
            Err(e) => {
                debug!(error = %e, "Rejected key ARN before calling KMS");
                return KmsKeyStatus::InvalidArn;
            }
        };

        let client = self.ctx.in_region(&arn.region).kms_client();
        match client.describe_key().key_id(key_arn).send().await {
            Ok(response) => match response.key_metadata() {
                Some(metadata) => KmsKeyStatus::from_metadata(metadata),
                None => KmsKeyStatus::Error("DescribeKey returned no key metadata".to_string()),
            },
            Err(e) => match classify_sdk_error(&e) {
                AwsError::NotFound { .. } => KmsKeyStatus::NotFound,
                AwsError::InvalidArn { .. } => KmsKeyStatus::InvalidArn,
                _ => {
                    warn!(key = %key_arn, "KMS key validation failed");
                    KmsKeyStatus::Error(describe_sdk_error(&e))
                }
            },
        }
    }
}
