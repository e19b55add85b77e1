//! Configuration types for the audit commands

use crate::aws::AwsContext;
use std::path::PathBuf;
use std::time::Duration;

// Re-export shared defaults for command code
pub use cloudaudit_common::defaults::{
    DEFAULT_GAAD_FILE, DEFAULT_PERMISSIONS_CSV, DEFAULT_SSO_CSV, ENCRYPTION_SETTLE_DELAY,
};

/// AWS connection settings shared by every command
#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    /// Region override; multi-region reports scan only this region when set
    pub region: Option<String>,
    /// AWS profile name (overrides default credential resolution)
    pub profile: Option<String>,
}

impl AwsSettings {
    /// Load the SDK configuration for these settings
    pub async fn load(&self) -> AwsContext {
        AwsContext::with_profile(self.region.as_deref(), self.profile.as_deref()).await
    }

    /// Profile name for display
    pub fn profile_label(&self) -> &str {
        self.profile.as_deref().unwrap_or("default")
    }

    /// Explicit region list for multi-region reports (empty means all)
    pub fn region_filter(&self) -> Vec<String> {
        self.region.iter().cloned().collect()
    }
}

/// Stack termination protection run
#[derive(Debug, Clone, Default)]
pub struct StackProtectionConfig {
    /// Apply protection without asking
    pub assume_yes: bool,
    pub csv: Option<PathBuf>,
}

/// SNS encryption run
#[derive(Debug, Clone)]
pub struct SnsEncryptionConfig {
    pub csv: Option<PathBuf>,
    /// Wait between setting a key and reading it back
    pub settle_delay: Duration,
}

impl Default for SnsEncryptionConfig {
    fn default() -> Self {
        Self {
            csv: None,
            settle_delay: ENCRYPTION_SETTLE_DELAY,
        }
    }
}

/// Security group exposure run
#[derive(Debug, Clone, Default)]
pub struct ExposureConfig {
    /// Also treat `::/0` ingress as open
    pub include_ipv6: bool,
    pub csv: Option<PathBuf>,
}

/// Which accounts the Identity Center report covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccountScope {
    /// Ask the operator
    #[default]
    Prompt,
    All,
    Account(String),
}

/// Identity Center report run
#[derive(Debug, Clone, Default)]
pub struct SsoConfig {
    pub instance_arn: Option<String>,
    pub identity_store_id: Option<String>,
    pub scope: AccountScope,
    /// Export here without the export prompts
    pub csv: Option<PathBuf>,
}

/// Where the authorization-details document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailsSource {
    File(PathBuf),
    /// `GetAccountAuthorizationDetails` against the current account
    Live,
}

impl Default for DetailsSource {
    fn default() -> Self {
        DetailsSource::File(PathBuf::from(DEFAULT_GAAD_FILE))
    }
}

/// IAM permissions report run
#[derive(Debug, Clone, Default)]
pub struct PermissionsConfig {
    pub source: DetailsSource,
    pub exact: Vec<String>,
    pub prefixes: Vec<String>,
    /// Export here without the export prompt
    pub csv: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_filter_follows_override() {
        let settings = AwsSettings::default();
        assert!(settings.region_filter().is_empty());
        assert_eq!(settings.profile_label(), "default");

        let settings = AwsSettings {
            region: Some("eu-west-2".into()),
            profile: Some("audit".into()),
        };
        assert_eq!(settings.region_filter(), vec!["eu-west-2"]);
        assert_eq!(settings.profile_label(), "audit");
    }

    #[test]
    fn defaults() {
        assert_eq!(SnsEncryptionConfig::default().settle_delay, Duration::from_secs(2));
        assert_eq!(
            PermissionsConfig::default().source,
            DetailsSource::File(PathBuf::from("gaad.json"))
        );
        assert_eq!(SsoConfig::default().scope, AccountScope::Prompt);
    }
}
