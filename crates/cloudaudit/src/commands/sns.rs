//! SNS topic encryption report and remediation

use crate::aws::regions::parse_region_list;
use crate::aws::{KeyValidation, TopicEncryption, TopicOperations};
use crate::config::SnsEncryptionConfig;
use crate::prompt::Prompter;
use crate::report;
use anyhow::Result;
use cloudaudit_common::export;
use indexmap::IndexMap;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

/// Topics per successfully listed region, in scan order
pub type TopicsByRegion = IndexMap<String, Vec<TopicEncryption>>;

/// Encryption state of a processed topic after remediation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTopicStatus {
    pub region: String,
    pub topic_arn: String,
    pub encrypted: bool,
}

impl FinalTopicStatus {
    pub fn label(&self) -> &'static str {
        if self.encrypted {
            "Encrypted"
        } else {
            report::NOT_ENCRYPTED
        }
    }
}

/// List topics and their keys for each region. Regions that fail to list
/// are reported and left out; a topic whose attributes cannot be read is
/// shown as unencrypted.
pub async fn list_topic_encryption<T: TopicOperations>(
    topics: &T,
    regions: &[String],
) -> TopicsByRegion {
    let mut listed = TopicsByRegion::new();

    for region in regions {
        let arns = match topics.list_topics(region).await {
            Ok(arns) => arns,
            Err(e) => {
                println!("Error listing SNS topics in region {region}: {e}");
                continue;
            }
        };

        let mut rows = Vec::with_capacity(arns.len());
        for arn in arns {
            let kms_key_id = match topics.topic_kms_key(region, &arn).await {
                Ok(key) => key,
                Err(e) => {
                    println!("Error reading attributes of topic {arn}: {e}");
                    None
                }
            };
            rows.push(TopicEncryption {
                region: region.clone(),
                topic_arn: arn,
                kms_key_id,
            });
        }
        debug!(region = %region, topics = rows.len(), "Listed topic encryption");
        listed.insert(region.clone(), rows);
    }

    listed
}

/// Ask for a key ARN until a valid one is given or the operator gives up.
pub async fn prompt_kms_key<K, P>(keys: &K, prompt: &mut P) -> Result<Option<String>>
where
    K: KeyValidation,
    P: Prompter,
{
    loop {
        let key_arn = prompt
            .ask("Enter the KMS Key ARN to use for encryption: ")?
            .trim()
            .to_string();
        let status = keys.validate_kms_key(&key_arn).await;
        println!("{}", status.message(&key_arn));

        if status.is_valid() {
            return Ok(Some(key_arn));
        }
        if !prompt.confirm("Would you like to enter a different KMS key ARN? (yes/no): ")? {
            return Ok(None);
        }
    }
}

/// Set the key on one topic, wait, and read it back. Returns whether the
/// key was confirmed.
pub async fn encrypt_topic<T: TopicOperations>(
    topics: &T,
    region: &str,
    topic_arn: &str,
    key_arn: &str,
    settle_delay: Duration,
) -> bool {
    let mut out = std::io::stdout();
    encrypt_topic_to(&mut out, topics, region, topic_arn, key_arn, settle_delay).await
}

async fn encrypt_topic_to<W: Write, T: TopicOperations>(
    out: &mut W,
    topics: &T,
    region: &str,
    topic_arn: &str,
    key_arn: &str,
    settle_delay: Duration,
) -> bool {
    if let Err(e) = topics.set_topic_kms_key(region, topic_arn, key_arn).await {
        let _ = writeln!(out, "Error encrypting topic {topic_arn}: {e}");
        return false;
    }
    let _ = writeln!(out, "Encrypting topic {topic_arn} with KMS key {key_arn}");

    tokio::time::sleep(settle_delay).await;

    match topics.topic_kms_key(region, topic_arn).await {
        Ok(Some(key)) if key == key_arn => {
            let _ = writeln!(out, "Done");
            let _ = writeln!(out, "Encryption successfully applied to topic {topic_arn}");
            true
        }
        Ok(_) => {
            let _ = writeln!(out, "Failed");
            let _ = writeln!(
                out,
                "Warning: Encryption may not have been properly applied to topic {topic_arn}"
            );
            false
        }
        Err(e) => {
            let _ = writeln!(out, "Error encrypting topic {topic_arn}: {e}");
            false
        }
    }
}

/// Encrypt the chosen topics of one region. Returns false when the region
/// was skipped.
async fn process_region<T, P>(
    topics: &T,
    prompt: &mut P,
    region: &str,
    listed: &[TopicEncryption],
    key_arn: &str,
    settle_delay: Duration,
) -> Result<bool>
where
    T: TopicOperations,
    P: Prompter,
{
    if prompt.confirm(&format!(
        "Do you want to encrypt all SNS topics in {region}? (yes/no): "
    ))? {
        for topic in listed {
            encrypt_topic(topics, region, &topic.topic_arn, key_arn, settle_delay).await;
        }
        return Ok(true);
    }

    let answer = prompt.ask(&format!(
        "How many SNS topics in {region} do you want to encrypt? "
    ))?;
    let Ok(count) = answer.trim().parse::<usize>() else {
        println!("Invalid number of topics: '{}'. Skipping region {region}.", answer.trim());
        return Ok(false);
    };

    for _ in 0..count {
        let arn = prompt.ask("Enter the SNS Topic ARN to encrypt: ")?;
        encrypt_topic(topics, region, arn.trim(), key_arn, settle_delay).await;
    }
    Ok(true)
}

fn final_status(listed: &TopicsByRegion) -> Vec<FinalTopicStatus> {
    listed
        .values()
        .flatten()
        .map(|t| FinalTopicStatus {
            region: t.region.clone(),
            topic_arn: t.topic_arn.clone(),
            encrypted: t.is_encrypted(),
        })
        .collect()
}

fn export_topics(path: &std::path::Path, listed: &TopicsByRegion) -> Result<()> {
    export::write_table(
        export::create(path)?,
        &report::TOPIC_HEADERS,
        listed.values().flatten().map(|t| {
            vec![
                t.region.clone(),
                t.topic_arn.clone(),
                t.kms_key_id
                    .clone()
                    .unwrap_or_else(|| report::NOT_ENCRYPTED.to_string()),
            ]
        }),
    )?;
    println!("Output saved to '{}'", path.display());
    Ok(())
}

/// Run report and remediation rounds until the operator is done.
///
/// Returns the final status of the topics in every processed region.
pub async fn run<T, K, P>(
    topics: &T,
    keys: &K,
    prompt: &mut P,
    regions: &[String],
    config: &SnsEncryptionConfig,
) -> Result<Vec<FinalTopicStatus>>
where
    T: TopicOperations,
    K: KeyValidation,
    P: Prompter,
{
    let mut finals = Vec::new();

    loop {
        let listed = list_topic_encryption(topics, regions).await;
        let rows: Vec<TopicEncryption> = listed.values().flatten().cloned().collect();
        report::print_table("SNS Topics Encryption Status", &report::topic_table(&rows));

        if let Some(path) = &config.csv {
            export_topics(path, &listed)?;
        }

        let selected = parse_region_list(
            &prompt.ask("Enter the regions you want to process (comma-separated): ")?,
        );

        let Some(key_arn) = prompt_kms_key(keys, prompt).await? else {
            println!("Exiting due to invalid KMS key.");
            return Ok(finals);
        };

        let mut processed = Vec::new();
        for region in &selected {
            let Some(region_topics) = listed.get(region) else {
                println!("No SNS topics were listed for region {region}. Skipping.");
                continue;
            };
            if process_region(
                topics,
                prompt,
                region,
                region_topics,
                &key_arn,
                config.settle_delay,
            )
            .await?
            {
                processed.push(region.clone());
            }
        }

        if !processed.is_empty() {
            let after = list_topic_encryption(topics, &processed).await;
            let round = final_status(&after);
            info!(
                regions = processed.len(),
                encrypted = round.iter().filter(|s| s.encrypted).count(),
                "Encryption round finished"
            );
            report::print_table("Final Encryption Status", &report::final_topic_table(&round));
            finals.extend(round);
        }

        if !prompt.confirm("Do you want to process another region? (yes/no): ")? {
            break;
        }
    }

    Ok(finals)
}
