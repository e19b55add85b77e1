//! Identity Center permission-set report

use crate::aws::{SsoDirectory, SsoReport};
use crate::config::{AccountScope, DEFAULT_SSO_CSV, SsoConfig};
use crate::prompt::Prompter;
use crate::report;
use anyhow::{Result, bail};
use cloudaudit_common::sso::assigned_group_names;
use cloudaudit_common::{AccountSummary, UserGroupMap, export};
use console::style;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything the report showed
#[derive(Debug, Clone, Default)]
pub struct SsoOutput {
    pub accounts: Vec<AccountSummary>,
    pub report: SsoReport,
    pub memberships: UserGroupMap,
}

fn print_accounts(accounts: &[AccountSummary]) {
    println!("{}", style("Available Accounts:").bold());
    for (idx, account) in accounts.iter().enumerate() {
        println!("{}. {} (ID: {})", idx + 1, account.name, account.id);
    }
    println!();
}

/// Parse a 1-based account choice
fn select_account<'a>(accounts: &'a [AccountSummary], answer: &str) -> Result<&'a AccountSummary> {
    let trimmed = answer.trim();
    match trimmed.parse::<usize>() {
        Ok(n) if (1..=accounts.len()).contains(&n) => Ok(&accounts[n - 1]),
        _ => bail!(
            "Invalid account number '{trimmed}': expected a number between 1 and {}",
            accounts.len()
        ),
    }
}

fn export_report(path: &Path, output: &SsoOutput) -> Result<()> {
    export::write_sso_report(
        export::create(path)?,
        &output.report.assignments,
        &output.report.policies,
        &output.memberships,
    )?;
    println!("Data exported to {}", path.display());
    Ok(())
}

/// Run the report for all accounts or one account, then offer a CSV export.
pub async fn run<D, P>(directory: &D, prompt: &mut P, config: &SsoConfig) -> Result<SsoOutput>
where
    D: SsoDirectory,
    P: Prompter,
{
    println!(
        "\n{}\n",
        style("-------- AWS Identity Center Permissions Checker --------")
            .cyan()
            .bold()
    );

    let scope = match &config.scope {
        AccountScope::Prompt => {
            if prompt.confirm(
                "Type 'yes' to enumerate all accounts, or 'no' to enumerate a specific account: ",
            )? {
                AccountScope::All
            } else {
                AccountScope::Prompt
            }
        }
        other => other.clone(),
    };
    println!("Fetching data... Please wait.\n");

    let sets = directory.permission_sets().await?;
    let accounts = directory.available_accounts(&sets).await?;
    print_accounts(&accounts);

    let (data, memberships) = match scope {
        AccountScope::All => {
            let data = directory.permission_set_data_all(&sets).await?;
            let memberships = directory.user_group_memberships(None).await?;
            (data, memberships)
        }
        specific => {
            let account_id = match specific {
                AccountScope::Account(id) => {
                    if !accounts.iter().any(|a| a.id == id) {
                        warn!(account = %id, "Account has no provisioned permission sets");
                    }
                    id
                }
                _ => {
                    if accounts.is_empty() {
                        bail!("No accounts with provisioned permission sets were found");
                    }
                    let answer =
                        prompt.ask("Enter the number of the account for which you want details: ")?;
                    let chosen = select_account(&accounts, &answer)?;
                    println!("Fetching data... Please wait.\n");
                    chosen.id.clone()
                }
            };

            let data = directory.permission_set_data_for(&account_id, &sets).await?;
            let groups = assigned_group_names(&data.assignments)
                .into_iter()
                .map(str::to_string)
                .collect();
            let memberships = directory.user_group_memberships(Some(groups)).await?;
            (data, memberships)
        }
    };

    info!(
        assignments = data.assignments.len(),
        permission_sets = data.policies.len(),
        users = memberships.len(),
        "Collected Identity Center data"
    );

    report::print_table("Assignments", &report::assignment_table(&data.assignments));
    report::print_table(
        "Policies Attached to Permission Sets",
        &report::policy_table(&data.policies),
    );
    report::print_table("User-Group Memberships", &report::membership_table(&memberships));

    let output = SsoOutput {
        accounts,
        report: data,
        memberships,
    };

    let target = match &config.csv {
        Some(path) => Some(path.clone()),
        None => {
            if prompt.confirm("Would you like to export the data to CSV? (yes/no): ")? {
                let name = prompt.ask("Enter filename for CSV (default: aws_sso.csv): ")?;
                let name = name.trim();
                Some(PathBuf::from(if name.is_empty() { DEFAULT_SSO_CSV } else { name }))
            } else {
                None
            }
        }
    };
    if let Some(path) = target {
        export_report(&path, &output)?;
    }

    Ok(output)
}
