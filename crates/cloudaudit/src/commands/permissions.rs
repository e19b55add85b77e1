//! IAM permissions report over account authorization details

use crate::config::{DEFAULT_PERMISSIONS_CSV, PermissionsConfig};
use crate::prompt::Prompter;
use crate::report;
use anyhow::Result;
use cloudaudit_common::permissions::analyze;
use cloudaudit_common::{AuthorizationDetails, PermissionMatcher, PermissionReport, export};
use console::style;
use std::path::{Path, PathBuf};
use tracing::info;

const EMPTY_GROUPS_NOTE: &str = "Only the groups which has IAM Users attached to it are displayed.. \
Groups without IAM Users (Empty Groups) are not displayed";

fn export_report(path: &Path, report: &PermissionReport) -> Result<()> {
    export::write_permissions_report(export::create(path)?, report)?;
    println!("Output saved to '{}'", path.display());
    Ok(())
}

/// Match the configured permissions against `details`, print the tables and
/// offer a CSV export.
pub fn run<P: Prompter>(
    details: &AuthorizationDetails,
    prompt: &mut P,
    config: &PermissionsConfig,
) -> Result<PermissionReport> {
    let matcher = PermissionMatcher::new(&config.exact, &config.prefixes);
    let permission_report = analyze(details, &matcher);

    info!(
        entries = permission_report.entries.len(),
        groups = permission_report.groups_with_permissions.len(),
        "Analyzed authorization details"
    );

    report::print_table(
        "##### Permissions Table Sorted by Resource Type #####",
        &report::permission_table(&permission_report.entries),
    );

    println!("\n\n{EMPTY_GROUPS_NOTE}\n");

    for (group, users) in permission_report.member_tables() {
        report::print_table(
            &format!("Users in '{group}' Group"),
            &report::member_table(users),
        );
    }

    let target = match &config.csv {
        Some(path) => Some(path.clone()),
        None => prompt
            .confirm("Would you like to export the output to a CSV file? (yes/no): ")?
            .then(|| PathBuf::from(DEFAULT_PERMISSIONS_CSV)),
    };
    match target {
        Some(path) => export_report(&path, &permission_report)?,
        None => println!("{}", style("No CSV written.").dim()),
    }

    Ok(permission_report)
}
