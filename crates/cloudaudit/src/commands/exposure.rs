//! Security group internet exposure report

use crate::aws::exposure::correlate;
use crate::aws::{Association, AssociationLookup};
use crate::config::ExposureConfig;
use crate::report;
use anyhow::{Context, Result};
use cloudaudit_common::export;
use tracing::info;

/// Find open groups, correlate them with every service, print the table.
///
/// Returns the association rows that were reported.
pub async fn run<L: AssociationLookup>(lookup: &L, config: &ExposureConfig) -> Result<Vec<Association>> {
    println!("Fetching Security Groups with inbound rules open to 0.0.0.0/0...");

    let open = lookup
        .open_security_groups(config.include_ipv6)
        .await
        .context("Failed to describe security groups")?;

    if open.is_empty() {
        println!("No Security Groups found with inbound rules open to 0.0.0.0/0.");
        return Ok(Vec::new());
    }

    println!("Found {} Security Groups with open inbound rules:", open.len());
    for sg_id in &open {
        println!("- {sg_id}");
    }

    let associations = correlate(lookup, &open).await;
    info!(
        groups = open.len(),
        associations = associations.len(),
        "Correlated security groups"
    );

    if associations.is_empty() {
        println!("No associations found for any Security Group.");
        return Ok(associations);
    }

    report::print_table(
        "Security Group Associations",
        &report::association_table(&associations),
    );

    if let Some(path) = &config.csv {
        export::write_table(
            export::create(path)?,
            &report::ASSOCIATION_HEADERS,
            associations.iter().map(|a| {
                vec![
                    a.sg_id.clone(),
                    a.service.name().to_string(),
                    a.service.description().to_string(),
                    a.result.clone(),
                ]
            }),
        )?;
        println!("Output saved to '{}'", path.display());
    }

    Ok(associations)
}
