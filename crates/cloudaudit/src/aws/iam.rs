//! Live IAM authorization details
//!
//! `GetAccountAuthorizationDetails` returns policy documents URL-encoded.
//! Pages are decoded into the same model the JSON file input uses, so the
//! analysis does not care where the document came from.

use super::context::{AwsContext, FromAwsContext};
use super::error::sdk_context;
use anyhow::{Context, Result};
use aws_sdk_iam::types as sdk;
use cloudaudit_common::permissions::{
    AttachedPolicy, AuthorizationDetails, GroupDetail, InlinePolicy, ManagedPolicy,
    PolicyDocument, PolicyVersion, RoleDetail, UserDetail,
};
use tracing::{info, warn};

/// IAM client for the permissions report
pub struct IamClient {
    client: aws_sdk_iam::Client,
}

impl FromAwsContext for IamClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

impl IamClient {
    /// Fetch every page of authorization details for the account
    pub async fn authorization_details(&self) -> Result<AuthorizationDetails> {
        let mut details = AuthorizationDetails::default();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .get_account_authorization_details()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_context)
                .context("Failed to get account authorization details")?;

            details
                .user_detail_list
                .extend(response.user_detail_list().iter().map(convert_user));
            details
                .group_detail_list
                .extend(response.group_detail_list().iter().map(convert_group));
            details
                .role_detail_list
                .extend(response.role_detail_list().iter().map(convert_role));
            details
                .policies
                .extend(response.policies().iter().map(convert_managed_policy));

            if !response.is_truncated() {
                break;
            }
            match response.marker() {
                Some(m) => marker = Some(m.to_string()),
                None => break,
            }
        }

        info!(
            users = details.user_detail_list.len(),
            groups = details.group_detail_list.len(),
            roles = details.role_detail_list.len(),
            policies = details.policies.len(),
            "Fetched authorization details"
        );
        Ok(details)
    }
}

/// Decode a URL-encoded policy document. Undecodable documents are logged
/// and treated as empty.
fn decode_document(encoded: Option<&str>) -> PolicyDocument {
    let Some(encoded) = encoded else {
        return PolicyDocument::default();
    };

    let parsed = urlencoding::decode(encoded)
        .map_err(anyhow::Error::from)
        .and_then(|json| PolicyDocument::from_json(&json).map_err(anyhow::Error::from));

    parsed.unwrap_or_else(|e| {
        warn!(error = %e, "Skipping unreadable policy document");
        PolicyDocument::default()
    })
}

fn convert_inline(policy: &sdk::PolicyDetail) -> InlinePolicy {
    InlinePolicy {
        policy_name: policy.policy_name().unwrap_or_default().to_string(),
        policy_document: decode_document(policy.policy_document()),
    }
}

fn convert_attached(policy: &sdk::AttachedPolicy) -> AttachedPolicy {
    AttachedPolicy {
        policy_arn: policy.policy_arn().unwrap_or_default().to_string(),
        policy_name: policy.policy_name().map(str::to_string),
    }
}

fn convert_user(user: &sdk::UserDetail) -> UserDetail {
    UserDetail {
        user_name: user.user_name().unwrap_or_default().to_string(),
        group_list: user.group_list().to_vec(),
        user_policy_list: user.user_policy_list().iter().map(convert_inline).collect(),
        attached_managed_policies: user
            .attached_managed_policies()
            .iter()
            .map(convert_attached)
            .collect(),
    }
}

fn convert_group(group: &sdk::GroupDetail) -> GroupDetail {
    GroupDetail {
        group_name: group.group_name().unwrap_or_default().to_string(),
        group_policy_list: group.group_policy_list().iter().map(convert_inline).collect(),
        attached_managed_policies: group
            .attached_managed_policies()
            .iter()
            .map(convert_attached)
            .collect(),
    }
}

fn convert_role(role: &sdk::RoleDetail) -> RoleDetail {
    RoleDetail {
        role_name: role.role_name().unwrap_or_default().to_string(),
        role_policy_list: role.role_policy_list().iter().map(convert_inline).collect(),
        attached_managed_policies: role
            .attached_managed_policies()
            .iter()
            .map(convert_attached)
            .collect(),
    }
}

fn convert_managed_policy(policy: &sdk::ManagedPolicyDetail) -> ManagedPolicy {
    ManagedPolicy {
        policy_name: policy.policy_name().unwrap_or_default().to_string(),
        arn: policy.arn().unwrap_or_default().to_string(),
        policy_version_list: policy
            .policy_version_list()
            .iter()
            .map(|v| PolicyVersion {
                document: decode_document(v.document()),
                is_default_version: v.is_default_version(),
            })
            .collect(),
    }
}
