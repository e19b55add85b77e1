//! Default configuration values shared across cloudaudit commands
//!
//! These constants keep prompts, file names and filters consistent between
//! the workflows and their tests.

use std::time::Duration;

/// CloudFormation stack statuses considered "active"
pub const ACTIVE_STACK_STATUSES: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE", "ROLLBACK_COMPLETE"];

/// IPv4 CIDR that marks an inbound rule as open to the internet
pub const OPEN_IPV4_CIDR: &str = "0.0.0.0/0";

/// IPv6 CIDR that marks an inbound rule as open to the internet
pub const OPEN_IPV6_CIDR: &str = "::/0";

/// SNS topic attribute holding the encryption key
pub const SNS_KMS_ATTRIBUTE: &str = "KmsMasterKeyId";

/// Delay before re-reading a topic attribute after setting it
pub const ENCRYPTION_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Maximum number of task ARNs accepted by a single ECS DescribeTasks call
pub const ECS_DESCRIBE_TASKS_BATCH: usize = 100;

/// Default CSV file for the Identity Center report
pub const DEFAULT_SSO_CSV: &str = "aws_sso.csv";

/// Default CSV file for the IAM permissions report
pub const DEFAULT_PERMISSIONS_CSV: &str = "permissions_output.csv";

/// Default authorization-details input file
pub const DEFAULT_GAAD_FILE: &str = "gaad.json";

/// Default exact permissions searched by the IAM permissions report
pub const DEFAULT_EXACT_PERMISSIONS: &[&str] = &["secretsmanager:GetSecretValue", "secretsmanager:*"];

/// Placeholder shown for empty policy lists and missing inline policies
pub const NONE_PLACEHOLDER: &str = "None";

/// Name shown for accounts Organizations refuses to describe
pub const UNKNOWN_ACCOUNT_NAME: &str = "(unknown)";

/// Returns the default exact permission set as owned strings
pub fn default_exact_permissions() -> Vec<String> {
    DEFAULT_EXACT_PERMISSIONS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}
