//! SNS topic listing and server-side encryption attributes

use super::context::{AwsContext, FromAwsContext};
use super::error::sdk_context;
use anyhow::Result;
use cloudaudit_common::defaults::SNS_KMS_ATTRIBUTE;
use tracing::{debug, info};

/// A topic together with its current encryption key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicEncryption {
    pub region: String,
    pub topic_arn: String,
    pub kms_key_id: Option<String>,
}

impl TopicEncryption {
    pub fn is_encrypted(&self) -> bool {
        self.kms_key_id.is_some()
    }
}

/// Trait for SNS operations that can be mocked in tests
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait TopicOperations: Send + Sync {
    /// All topic ARNs in the region
    async fn list_topics(&self, region: &str) -> Result<Vec<String>>;

    /// The topic's `KmsMasterKeyId`, if set and non-empty
    async fn topic_kms_key(&self, region: &str, topic_arn: &str) -> Result<Option<String>>;

    /// Set `KmsMasterKeyId` on the topic
    async fn set_topic_kms_key(&self, region: &str, topic_arn: &str, key_arn: &str) -> Result<()>;
}

/// SNS client for encryption checks and remediation
pub struct SnsClient {
    ctx: AwsContext,
}

impl FromAwsContext for SnsClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl SnsClient {
    fn client(&self, region: &str) -> aws_sdk_sns::Client {
        self.ctx.in_region(region).sns_client()
    }
}

impl TopicOperations for SnsClient {
    async fn list_topics(&self, region: &str) -> Result<Vec<String>> {
        let client = self.client(region);
        let mut topics = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .list_topics()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            topics.extend(
                response
                    .topics()
                    .iter()
                    .filter_map(|t| t.topic_arn())
                    .map(str::to_string),
            );

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(region = %region, count = topics.len(), "Listed SNS topics");
        Ok(topics)
    }

    async fn topic_kms_key(&self, region: &str, topic_arn: &str) -> Result<Option<String>> {
        let response = self
            .client(region)
            .get_topic_attributes()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(sdk_context)?;

        Ok(response
            .attributes()
            .and_then(|attrs| attrs.get(SNS_KMS_ATTRIBUTE))
            .filter(|key| !key.is_empty())
            .cloned())
    }

    async fn set_topic_kms_key(&self, region: &str, topic_arn: &str, key_arn: &str) -> Result<()> {
        self.client(region)
            .set_topic_attributes()
            .topic_arn(topic_arn)
            .attribute_name(SNS_KMS_ATTRIBUTE)
            .attribute_value(key_arn)
            .send()
            .await
            .map_err(sdk_context)?;

        info!(topic = %topic_arn, key = %key_arn, "Topic encryption key set");
        Ok(())
    }
}
