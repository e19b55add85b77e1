//! CloudFormation stack listing and termination protection

use super::context::{AwsContext, FromAwsContext};
use super::error::sdk_context;
use anyhow::Result;
use aws_sdk_cloudformation::types::StackStatus;
use cloudaudit_common::defaults::ACTIVE_STACK_STATUSES;
use tracing::{debug, info};

/// Stack returned by the active-stack listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStack {
    pub name: String,
    pub status: String,
}

/// Trait for CloudFormation operations that can be mocked in tests.
///
/// Every call names its region; one implementation serves a whole
/// multi-region scan.
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait StackOperations: Send + Sync {
    /// Stacks in CREATE_COMPLETE, UPDATE_COMPLETE or ROLLBACK_COMPLETE
    async fn list_active_stacks(&self, region: &str) -> Result<Vec<ActiveStack>>;

    /// Whether termination protection is on. A missing flag means off.
    async fn termination_protection(&self, region: &str, stack_name: &str) -> Result<bool>;

    /// Turn termination protection on
    async fn enable_termination_protection(&self, region: &str, stack_name: &str) -> Result<()>;
}

/// CloudFormation client for stack protection checks
pub struct CloudFormationClient {
    ctx: AwsContext,
}

impl FromAwsContext for CloudFormationClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl CloudFormationClient {
    fn client(&self, region: &str) -> aws_sdk_cloudformation::Client {
        self.ctx.in_region(region).cloudformation_client()
    }
}

impl StackOperations for CloudFormationClient {
    async fn list_active_stacks(&self, region: &str) -> Result<Vec<ActiveStack>> {
        let client = self.client(region);
        let filters: Vec<StackStatus> = ACTIVE_STACK_STATUSES
            .iter()
            .map(|s| StackStatus::from(*s))
            .collect();

        let mut stacks = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .list_stacks()
                .set_stack_status_filter(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            for summary in response.stack_summaries() {
                stacks.push(ActiveStack {
                    name: summary.stack_name().to_string(),
                    status: summary.stack_status().as_str().to_string(),
                });
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(region = %region, count = stacks.len(), "Found active stacks");
        Ok(stacks)
    }

    async fn termination_protection(&self, region: &str, stack_name: &str) -> Result<bool> {
        let response = self
            .client(region)
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(sdk_context)?;

        Ok(response
            .stacks()
            .first()
            .and_then(|s| s.enable_termination_protection())
            .unwrap_or(false))
    }

    async fn enable_termination_protection(&self, region: &str, stack_name: &str) -> Result<()> {
        self.client(region)
            .update_termination_protection()
            .stack_name(stack_name)
            .enable_termination_protection(true)
            .send()
            .await
            .map_err(sdk_context)?;

        info!(region = %region, stack = %stack_name, "Termination protection enabled");
        Ok(())
    }
}
