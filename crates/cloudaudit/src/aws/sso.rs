//! IAM Identity Center lookups: permission sets, assignments, memberships
//!
//! Identity Center data is spread over three services. SSO Admin owns
//! permission sets and assignments, the Identity Store owns users and groups,
//! and Organizations owns account names.

use super::context::AwsContext;
use super::error::sdk_context;
use anyhow::{Context, Result, bail};
use aws_sdk_ssoadmin::types::PrincipalType;
use cloudaudit_common::defaults::UNKNOWN_ACCOUNT_NAME;
use cloudaudit_common::sso::{
    AccountSummary, Assignment, PermissionSetPolicies, UserGroupMap, push_unique_account,
    sort_assignments,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Identity Center instance the report runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoInstance {
    pub instance_arn: String,
    pub identity_store_id: String,
}

/// Assignments and policies gathered for a report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsoReport {
    pub assignments: Vec<Assignment>,
    pub policies: Vec<PermissionSetPolicies>,
}

/// Resolve the instance from explicit settings, falling back to the first
/// instance `ListInstances` returns for whatever is missing.
pub async fn discover_instance(
    ctx: &AwsContext,
    instance_arn: Option<&str>,
    identity_store_id: Option<&str>,
) -> Result<SsoInstance> {
    if let (Some(arn), Some(store)) = (instance_arn, identity_store_id) {
        return Ok(SsoInstance {
            instance_arn: arn.to_string(),
            identity_store_id: store.to_string(),
        });
    }

    let response = ctx
        .sso_admin_client()
        .list_instances()
        .send()
        .await
        .map_err(sdk_context)
        .context("Failed to list IAM Identity Center instances")?;

    let Some(found) = response.instances().first() else {
        bail!("No IAM Identity Center instance found in region {}", ctx.region());
    };

    let instance = SsoInstance {
        instance_arn: instance_arn
            .or(found.instance_arn())
            .context("Identity Center instance has no ARN")?
            .to_string(),
        identity_store_id: identity_store_id
            .or(found.identity_store_id())
            .context("Identity Center instance has no identity store")?
            .to_string(),
    };

    info!(
        instance = %instance.instance_arn,
        identity_store = %instance.identity_store_id,
        "Using Identity Center instance"
    );
    Ok(instance)
}

/// Trait for the directory queries behind the permission-set report
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait SsoDirectory: Send + Sync {
    /// ARNs of every permission set in the instance
    async fn permission_sets(&self) -> Result<Vec<String>>;

    /// Accounts with at least one provisioned set, first-seen order
    async fn available_accounts(&self, permission_sets: &[String]) -> Result<Vec<AccountSummary>>;

    /// Every set's policies and its assignments in every provisioned account
    async fn permission_set_data_all(&self, permission_sets: &[String]) -> Result<SsoReport>;

    /// Assignments in one account, with policies of the sets assigned there
    async fn permission_set_data_for(
        &self,
        account_id: &str,
        permission_sets: &[String],
    ) -> Result<SsoReport>;

    /// User name to group names. `groups` limits the walk to those display names.
    async fn user_group_memberships(&self, groups: Option<Vec<String>>) -> Result<UserGroupMap>;
}

/// Identity Center client spanning SSO Admin, Identity Store and Organizations
pub struct SsoClient {
    admin: aws_sdk_ssoadmin::Client,
    identity: aws_sdk_identitystore::Client,
    organizations: aws_sdk_organizations::Client,
    instance: SsoInstance,
    /// user ID -> user name, shared by assignments and memberships
    user_names: Mutex<HashMap<String, String>>,
}

impl SsoClient {
    pub fn new(ctx: &AwsContext, instance: SsoInstance) -> Self {
        Self {
            admin: ctx.sso_admin_client(),
            identity: ctx.identity_store_client(),
            organizations: ctx.organizations_client(),
            instance,
            user_names: Mutex::new(HashMap::new()),
        }
    }

    async fn provisioned_accounts(&self, set_arn: &str) -> Result<Vec<String>> {
        let mut accounts = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .admin
                .list_accounts_for_provisioned_permission_set()
                .instance_arn(&self.instance.instance_arn)
                .permission_set_arn(set_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            accounts.extend(response.account_ids().iter().cloned());

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(accounts)
    }

    async fn account_name(&self, account_id: &str) -> String {
        match self
            .organizations
            .describe_account()
            .account_id(account_id)
            .send()
            .await
        {
            Ok(response) => response
                .account()
                .and_then(|a| a.name())
                .unwrap_or(UNKNOWN_ACCOUNT_NAME)
                .to_string(),
            Err(e) => {
                warn!(account = %account_id, error = %sdk_context(e), "Could not describe account");
                UNKNOWN_ACCOUNT_NAME.to_string()
            }
        }
    }

    async fn permission_set_name(&self, set_arn: &str) -> Result<String> {
        let response = self
            .admin
            .describe_permission_set()
            .instance_arn(&self.instance.instance_arn)
            .permission_set_arn(set_arn)
            .send()
            .await
            .map_err(sdk_context)?;

        Ok(response
            .permission_set()
            .and_then(|p| p.name())
            .unwrap_or(set_arn)
            .to_string())
    }

    async fn policies(&self, set_arn: &str, set_name: &str) -> Result<PermissionSetPolicies> {
        let mut aws_managed = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .admin
                .list_managed_policies_in_permission_set()
                .instance_arn(&self.instance.instance_arn)
                .permission_set_arn(set_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;
            aws_managed.extend(
                response
                    .attached_managed_policies()
                    .iter()
                    .filter_map(|p| p.name())
                    .map(str::to_string),
            );
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        let mut customer_managed = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .admin
                .list_customer_managed_policy_references_in_permission_set()
                .instance_arn(&self.instance.instance_arn)
                .permission_set_arn(set_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;
            customer_managed.extend(
                response
                    .customer_managed_policy_references()
                    .iter()
                    .map(|p| p.name().to_string()),
            );
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        let inline = self
            .admin
            .get_inline_policy_for_permission_set()
            .instance_arn(&self.instance.instance_arn)
            .permission_set_arn(set_arn)
            .send()
            .await
            .map_err(sdk_context)?
            .inline_policy()
            .map(str::to_string);

        Ok(PermissionSetPolicies::new(
            set_name,
            aws_managed,
            customer_managed,
            inline,
        ))
    }

    async fn account_assignments(
        &self,
        account_id: &str,
        set_arn: &str,
        set_name: &str,
    ) -> Result<Vec<Assignment>> {
        let mut assignments = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .admin
                .list_account_assignments()
                .instance_arn(&self.instance.instance_arn)
                .account_id(account_id)
                .permission_set_arn(set_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            for assignment in response.account_assignments() {
                let kind = assignment.principal_type();
                let name = match (kind, assignment.principal_id()) {
                    (Some(kind), Some(id)) => self.principal_name(kind, id).await,
                    _ => String::new(),
                };
                assignments.push(Assignment {
                    principal_type: kind.map(|k| k.as_str().to_string()).unwrap_or_default(),
                    name,
                    permission_set: set_name.to_string(),
                    account_id: account_id.to_string(),
                });
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(assignments)
    }

    /// User name or group display name; empty for other principal types or
    /// when the identity store cannot resolve the ID.
    async fn principal_name(&self, kind: &PrincipalType, principal_id: &str) -> String {
        let resolved = match kind {
            PrincipalType::User => self.user_name(principal_id).await,
            PrincipalType::Group => self.group_name(principal_id).await,
            _ => return String::new(),
        };
        resolved.unwrap_or_else(|e| {
            warn!(principal = %principal_id, error = %e, "Could not resolve principal");
            String::new()
        })
    }

    async fn user_name(&self, user_id: &str) -> Result<String> {
        if let Some(name) = self.cached_user(user_id) {
            return Ok(name);
        }

        let response = self
            .identity
            .describe_user()
            .identity_store_id(&self.instance.identity_store_id)
            .user_id(user_id)
            .send()
            .await
            .map_err(sdk_context)?;
        let name = response.user_name().unwrap_or_default().to_string();

        if let Ok(mut cache) = self.user_names.lock() {
            cache.insert(user_id.to_string(), name.clone());
        }
        Ok(name)
    }

    fn cached_user(&self, user_id: &str) -> Option<String> {
        self.user_names
            .lock()
            .ok()
            .and_then(|cache| cache.get(user_id).cloned())
    }

    async fn group_name(&self, group_id: &str) -> Result<String> {
        let response = self
            .identity
            .describe_group()
            .identity_store_id(&self.instance.identity_store_id)
            .group_id(group_id)
            .send()
            .await
            .map_err(sdk_context)?;
        Ok(response.display_name().unwrap_or_default().to_string())
    }

    /// `(group ID, display name)` for every group in the store
    async fn groups(&self) -> Result<Vec<(String, String)>> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .identity
                .list_groups()
                .identity_store_id(&self.instance.identity_store_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            for group in response.groups() {
                groups.push((
                    group.group_id().to_string(),
                    group.display_name().unwrap_or_default().to_string(),
                ));
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(groups)
    }

    async fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>> {
        let mut members = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .identity
                .list_group_memberships()
                .identity_store_id(&self.instance.identity_store_id)
                .group_id(group_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            members.extend(
                response
                    .group_memberships()
                    .iter()
                    .filter_map(|m| m.member_id())
                    .filter_map(|id| id.as_user_id().ok())
                    .cloned(),
            );

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(members)
    }
}

impl SsoDirectory for SsoClient {
    async fn permission_sets(&self) -> Result<Vec<String>> {
        let mut sets = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .admin
                .list_permission_sets()
                .instance_arn(&self.instance.instance_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            sets.extend(response.permission_sets().iter().cloned());

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(count = sets.len(), "Listed permission sets");
        Ok(sets)
    }

    async fn available_accounts(&self, permission_sets: &[String]) -> Result<Vec<AccountSummary>> {
        let mut accounts: Vec<AccountSummary> = Vec::new();

        for set_arn in permission_sets {
            for account_id in self.provisioned_accounts(set_arn).await? {
                if accounts.iter().any(|a| a.id == account_id) {
                    continue;
                }
                let name = self.account_name(&account_id).await;
                push_unique_account(
                    &mut accounts,
                    AccountSummary {
                        id: account_id,
                        name,
                    },
                );
            }
        }

        Ok(accounts)
    }

    async fn permission_set_data_all(&self, permission_sets: &[String]) -> Result<SsoReport> {
        let mut report = SsoReport::default();

        for set_arn in permission_sets {
            let name = self.permission_set_name(set_arn).await?;
            report.policies.push(self.policies(set_arn, &name).await?);

            for account_id in self.provisioned_accounts(set_arn).await? {
                let found = self.account_assignments(&account_id, set_arn, &name).await?;
                report.assignments.extend(found);
            }
        }

        sort_assignments(&mut report.assignments);
        Ok(report)
    }

    async fn permission_set_data_for(
        &self,
        account_id: &str,
        permission_sets: &[String],
    ) -> Result<SsoReport> {
        let mut report = SsoReport::default();

        for set_arn in permission_sets {
            let name = self.permission_set_name(set_arn).await?;
            let found = self.account_assignments(account_id, set_arn, &name).await?;
            if found.is_empty() {
                continue;
            }
            report.policies.push(self.policies(set_arn, &name).await?);
            report.assignments.extend(found);
        }

        sort_assignments(&mut report.assignments);
        Ok(report)
    }

    async fn user_group_memberships(&self, groups: Option<Vec<String>>) -> Result<UserGroupMap> {
        let mut memberships = UserGroupMap::new();

        for (group_id, group_name) in self.groups().await? {
            if let Some(wanted) = &groups {
                if !wanted.contains(&group_name) {
                    continue;
                }
            }

            for user_id in self.group_member_ids(&group_id).await? {
                let user = match self.user_name(&user_id).await {
                    Ok(name) => name,
                    Err(e) => {
                        warn!(user = %user_id, error = %e, "Could not resolve group member");
                        continue;
                    }
                };
                memberships.entry(user).or_default().push(group_name.clone());
            }
        }

        Ok(memberships)
    }
}
