//! Region discovery

use super::context::AwsContext;
use anyhow::{Context, Result};
use tracing::debug;

/// List the regions enabled for the account.
pub async fn list_regions(ctx: &AwsContext) -> Result<Vec<String>> {
    let response = ctx
        .ec2_client()
        .describe_regions()
        .send()
        .await
        .context("Failed to describe regions")?;

    let regions: Vec<String> = response
        .regions()
        .iter()
        .filter_map(|r| r.region_name())
        .map(str::to_string)
        .collect();

    debug!(count = regions.len(), "Discovered regions");
    Ok(regions)
}

/// Regions a multi-region report should scan: the explicit list when given,
/// otherwise every enabled region.
pub async fn resolve_regions(ctx: &AwsContext, explicit: &[String]) -> Result<Vec<String>> {
    if explicit.is_empty() {
        list_regions(ctx).await
    } else {
        Ok(explicit.to_vec())
    }
}

/// Split a comma-separated region list, trimming blanks.
pub fn parse_region_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
