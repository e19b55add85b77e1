//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once and
//! creating multiple service clients from the same config.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;

/// Region used when neither the command line nor the profile names one
pub const FALLBACK_REGION: &str = "us-east-1";

/// Shared AWS configuration context for creating service clients.
///
/// This struct holds a loaded AWS SDK config and provides methods
/// to create service clients without re-loading configuration.
///
/// # Example
/// ```ignore
/// let aws = AwsContext::with_profile(None, Some("audit")).await;
///
/// // Same credentials, another region
/// let eu = aws.in_region("eu-west-1");
/// let stacks = CloudFormationClient::from_context(&eu);
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
    profile: Option<String>,
}

/// Construct a service wrapper from a loaded context
pub trait FromAwsContext {
    fn from_context(ctx: &AwsContext) -> Self;
}

impl AwsContext {
    /// Load AWS configuration, optionally overriding the region and profile.
    ///
    /// Credentials and the default region come from the standard provider
    /// chain (environment, shared config files, SSO cache, instance roles).
    pub async fn with_profile(region: Option<&str>, profile: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;

        let (config, region) = match config.region().map(|r| r.to_string()) {
            Some(region) => (config, region),
            None => (
                config
                    .to_builder()
                    .region(Region::new(FALLBACK_REGION))
                    .build(),
                FALLBACK_REGION.to_string(),
            ),
        };

        Self {
            config: Arc::new(config),
            region,
            profile: profile.map(str::to_string),
        }
    }

    /// Derive a context with the same credentials pinned to `region`.
    pub fn in_region(&self, region: &str) -> Self {
        if region == self.region {
            return self.clone();
        }
        let config = self
            .config
            .to_builder()
            .region(Region::new(region.to_string()))
            .build();
        Self {
            config: Arc::new(config),
            region: region.to_string(),
            profile: self.profile.clone(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Get the region string.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Profile name used to load credentials, if one was given.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn cloudformation_client(&self) -> aws_sdk_cloudformation::Client {
        aws_sdk_cloudformation::Client::new(self.sdk_config())
    }

    pub fn sns_client(&self) -> aws_sdk_sns::Client {
        aws_sdk_sns::Client::new(self.sdk_config())
    }

    pub fn kms_client(&self) -> aws_sdk_kms::Client {
        aws_sdk_kms::Client::new(self.sdk_config())
    }

    pub fn ec2_client(&self) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(self.sdk_config())
    }

    pub fn rds_client(&self) -> aws_sdk_rds::Client {
        aws_sdk_rds::Client::new(self.sdk_config())
    }

    pub fn ecs_client(&self) -> aws_sdk_ecs::Client {
        aws_sdk_ecs::Client::new(self.sdk_config())
    }

    pub fn eks_client(&self) -> aws_sdk_eks::Client {
        aws_sdk_eks::Client::new(self.sdk_config())
    }

    /// Classic load balancer client
    pub fn elb_client(&self) -> aws_sdk_elasticloadbalancing::Client {
        aws_sdk_elasticloadbalancing::Client::new(self.sdk_config())
    }

    pub fn elasticache_client(&self) -> aws_sdk_elasticache::Client {
        aws_sdk_elasticache::Client::new(self.sdk_config())
    }

    pub fn memorydb_client(&self) -> aws_sdk_memorydb::Client {
        aws_sdk_memorydb::Client::new(self.sdk_config())
    }

    pub fn iam_client(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(self.sdk_config())
    }

    pub fn sso_admin_client(&self) -> aws_sdk_ssoadmin::Client {
        aws_sdk_ssoadmin::Client::new(self.sdk_config())
    }

    pub fn identity_store_client(&self) -> aws_sdk_identitystore::Client {
        aws_sdk_identitystore::Client::new(self.sdk_config())
    }

    pub fn organizations_client(&self) -> aws_sdk_organizations::Client {
        aws_sdk_organizations::Client::new(self.sdk_config())
    }

    /// Create an STS client from this context.
    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(self.sdk_config())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_region_wins() {
        let ctx = AwsContext::with_profile(Some("eu-central-1"), None).await;
        assert_eq!(ctx.region(), "eu-central-1");
        assert!(ctx.profile().is_none());
    }

    #[tokio::test]
    async fn in_region_keeps_profile_and_switches_region() {
        let ctx = AwsContext::with_profile(Some("us-east-2"), None).await;
        let other = ctx.in_region("ap-southeast-2");

        assert_eq!(other.region(), "ap-southeast-2");
        assert_eq!(
            other.sdk_config().region().map(|r| r.to_string()).as_deref(),
            Some("ap-southeast-2")
        );
        assert_eq!(ctx.region(), "us-east-2");
    }

    #[tokio::test]
    async fn debug_omits_credentials() {
        let ctx = AwsContext::with_profile(Some("us-west-2"), None).await;
        let debug = format!("{ctx:?}");
        assert!(debug.contains("us-west-2"));
        assert!(debug.contains(".."));
    }
}
