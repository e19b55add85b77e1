//! Stack termination protection report and remediation

use crate::aws::StackOperations;
use crate::config::StackProtectionConfig;
use crate::prompt::Prompter;
use crate::report;
use anyhow::Result;
use cloudaudit_common::export;
use tracing::{info, warn};

/// Protection state of one active stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackProtection {
    pub region: String,
    pub stack_name: String,
    pub status: String,
    pub protected: bool,
}

impl StackProtection {
    pub fn protection_label(&self) -> &'static str {
        if self.protected { "Enabled" } else { "Disabled" }
    }

    pub fn reason(&self) -> &'static str {
        if self.protected {
            ""
        } else {
            "Termination protection is not enabled."
        }
    }
}

/// Result of enabling protection on one stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionOutcome {
    pub region: String,
    pub stack_name: String,
    pub success: bool,
    pub message: String,
}

impl ProtectionOutcome {
    pub fn status_label(&self) -> &'static str {
        if self.success { "Success" } else { "Failed" }
    }

    pub fn protection_label(&self) -> &'static str {
        if self.success { "Enabled" } else { "Not Enabled" }
    }
}

/// Active stacks and their protection flag across `regions`.
///
/// A region that cannot be listed is skipped; a stack whose flag cannot be
/// read is reported as unprotected.
pub async fn collect_stack_protection<S: StackOperations>(
    stacks: &S,
    regions: &[String],
) -> Vec<StackProtection> {
    let mut rows = Vec::new();

    for region in regions {
        let active = match stacks.list_active_stacks(region).await {
            Ok(active) => active,
            Err(e) => {
                println!("Error fetching stack names for region {region}: {e}");
                continue;
            }
        };

        for stack in active {
            let protected = match stacks.termination_protection(region, &stack.name).await {
                Ok(flag) => flag,
                Err(e) => {
                    println!(
                        "Error checking termination protection for stack {} in region {region}: {e}",
                        stack.name
                    );
                    false
                }
            };
            rows.push(StackProtection {
                region: region.clone(),
                stack_name: stack.name,
                status: stack.status,
                protected,
            });
        }
    }

    rows
}

/// Enable protection on every unprotected stack in `rows`
pub async fn enable_protection<S: StackOperations>(
    stacks: &S,
    rows: &[StackProtection],
) -> Vec<ProtectionOutcome> {
    let mut outcomes = Vec::new();

    for row in rows.iter().filter(|r| !r.protected) {
        let result = stacks
            .enable_termination_protection(&row.region, &row.stack_name)
            .await;
        let (success, message) = match result {
            Ok(()) => (
                true,
                format!(
                    "Termination protection enabled for stack: {} in region {}",
                    row.stack_name, row.region
                ),
            ),
            Err(e) => {
                warn!(stack = %row.stack_name, region = %row.region, error = %e, "Update failed");
                (
                    false,
                    format!(
                        "Failed to enable termination protection for stack: {} in region {}. Error: {e}",
                        row.stack_name, row.region
                    ),
                )
            }
        };
        outcomes.push(ProtectionOutcome {
            region: row.region.clone(),
            stack_name: row.stack_name.clone(),
            success,
            message,
        });
    }

    outcomes
}

/// Reason to stop before prompting, if no stack needs protection
fn nothing_to_enable(rows: &[StackProtection]) -> Option<&'static str> {
    if rows.is_empty() {
        Some("No active stacks found.")
    } else if rows.iter().all(|r| r.protected) {
        Some("All stacks already have termination protection enabled.")
    } else {
        None
    }
}

/// Run the report, then offer to protect the unprotected stacks.
///
/// Returns the update outcomes (empty when nothing was changed).
pub async fn run<S, P>(
    stacks: &S,
    prompt: &mut P,
    profile: &str,
    regions: &[String],
    config: &StackProtectionConfig,
) -> Result<Vec<ProtectionOutcome>>
where
    S: StackOperations,
    P: Prompter,
{
    println!("Using AWS profile: {profile}");

    if regions.is_empty() {
        println!("No regions found! Exiting...");
        return Ok(Vec::new());
    }

    let rows = collect_stack_protection(stacks, regions).await;
    info!(stacks = rows.len(), regions = regions.len(), "Collected stack protection");

    report::print_table(
        "CloudFormation Active Stacks and Termination Protection Status",
        &report::stack_status_table(&rows),
    );

    if let Some(path) = &config.csv {
        export::write_table(
            export::create(path)?,
            &report::STACK_STATUS_HEADERS,
            rows.iter().map(|r| {
                vec![
                    r.region.clone(),
                    r.stack_name.clone(),
                    r.status.clone(),
                    r.protection_label().to_string(),
                    r.reason().to_string(),
                ]
            }),
        )?;
        println!("Output saved to '{}'", path.display());
    }

    if let Some(message) = nothing_to_enable(&rows) {
        println!("{message}");
        return Ok(Vec::new());
    }

    let proceed = config.assume_yes
        || prompt.confirm("Do you want to enable termination protection for these stacks? (yes/no): ")?;
    if !proceed {
        println!("Exiting without making changes...");
        return Ok(Vec::new());
    }

    let outcomes = enable_protection(stacks, &rows).await;
    for outcome in &outcomes {
        println!("{}", outcome.message);
    }

    report::print_table(
        "Termination Protection Status After Update",
        &report::protection_outcome_table(&outcomes),
    );

    Ok(outcomes)
}
