//! AWS client modules for the audit commands
//!
//! This module provides wrappers around AWS SDK clients for:
//! - CloudFormation: Stack termination protection
//! - SNS + KMS: Topic encryption and key validation
//! - EC2 + exposure: Open security groups and the resources using them
//! - SSO: Identity Center permission sets and memberships
//! - IAM: Account authorization details
//! - STS: Account ID lookup

pub mod account;
pub mod cloudformation;
pub mod context;
pub mod ec2;
pub mod error;
pub mod exposure;
pub mod iam;
pub mod kms;
pub mod regions;
pub mod sns;
pub mod sso;

// Core clients
pub use account::{AccountId, get_current_account_id};
pub use cloudformation::{ActiveStack, CloudFormationClient, StackOperations};
pub use context::{AwsContext, FromAwsContext};
pub use exposure::{Association, AssociationLookup, ExposedService, ExposureScanner};
pub use iam::IamClient;
pub use kms::{KeyValidation, KmsClient, KmsKeyStatus};
pub use regions::{list_regions, resolve_regions};
pub use sns::{SnsClient, TopicEncryption, TopicOperations};
pub use sso::{SsoClient, SsoDirectory, SsoInstance, SsoReport, discover_instance};

// Error handling
pub use error::{AwsError, classify_anyhow_error, classify_sdk_error, sdk_context};
