//! cloudaudit: AWS audit reports with optional remediation
//!
//! Each subcommand is one sequential workflow: enumerate resources, print a
//! table, then optionally fix what it found or export the result to CSV.

use anyhow::Result;
use clap::{Parser, Subcommand};
use cloudaudit::aws::{
    CloudFormationClient, ExposureScanner, FromAwsContext, IamClient, KmsClient, SnsClient,
    SsoClient, classify_anyhow_error, discover_instance, get_current_account_id, resolve_regions,
};
use cloudaudit::commands;
use cloudaudit::config::{
    AccountScope, AwsSettings, DEFAULT_GAAD_FILE, DetailsSource, ExposureConfig,
    PermissionsConfig, SnsEncryptionConfig, SsoConfig, StackProtectionConfig,
};
use cloudaudit::prompt::TerminalPrompter;
use cloudaudit_common::AuthorizationDetails;
use cloudaudit_common::defaults::default_exact_permissions;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cloudaudit")]
#[command(about = "AWS audit reports: stack protection, SNS encryption, exposure and permissions")]
#[command(version)]
struct Args {
    /// AWS profile to use
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// AWS region. Multi-region reports scan only this region when set;
    /// `AWS_REGION` sets the SDK region without narrowing the scan
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn aws_settings(&self) -> AwsSettings {
        AwsSettings {
            region: self.region.clone(),
            profile: self.profile.clone(),
        }
    }
}

/// Arguments for the Identity Center report
#[derive(clap::Args, Debug)]
struct SsoArgs {
    /// Identity Center instance ARN (default: first instance found)
    #[arg(long, env = "CLOUDAUDIT_SSO_INSTANCE_ARN")]
    instance_arn: Option<String>,

    /// Identity store ID (default: the instance's store)
    #[arg(long, env = "CLOUDAUDIT_IDENTITY_STORE_ID")]
    identity_store_id: Option<String>,

    /// Report on every account without asking
    #[arg(long, conflicts_with = "account")]
    all_accounts: bool,

    /// Report on one account without asking
    #[arg(long)]
    account: Option<String>,

    /// Write the CSV here without the export prompts
    #[arg(long)]
    csv: Option<PathBuf>,
}

impl From<SsoArgs> for SsoConfig {
    fn from(args: SsoArgs) -> Self {
        let scope = match (args.all_accounts, args.account) {
            (true, _) => AccountScope::All,
            (false, Some(id)) => AccountScope::Account(id),
            (false, None) => AccountScope::Prompt,
        };
        Self {
            instance_arn: args.instance_arn,
            identity_store_id: args.identity_store_id,
            scope,
            csv: args.csv,
        }
    }
}

/// Arguments for the IAM permissions report
#[derive(clap::Args, Debug)]
struct IamArgs {
    /// Authorization-details JSON (`aws iam get-account-authorization-details`)
    #[arg(long, default_value = DEFAULT_GAAD_FILE, conflicts_with = "fetch")]
    input: PathBuf,

    /// Fetch authorization details from IAM instead of reading a file
    #[arg(long)]
    fetch: bool,

    /// Exact permission to search for (repeatable)
    /// (default: secretsmanager:GetSecretValue and secretsmanager:*)
    #[arg(long = "exact")]
    exact: Vec<String>,

    /// Permission prefix to search for, e.g. `s3:*` (repeatable)
    #[arg(long = "prefix")]
    prefix: Vec<String>,

    /// Write the CSV here without the export prompt
    #[arg(long)]
    csv: Option<PathBuf>,
}

impl From<IamArgs> for PermissionsConfig {
    fn from(args: IamArgs) -> Self {
        Self {
            source: if args.fetch {
                DetailsSource::Live
            } else {
                DetailsSource::File(args.input)
            },
            exact: if args.exact.is_empty() {
                default_exact_permissions()
            } else {
                args.exact
            },
            prefixes: args.prefix,
            csv: args.csv,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report stack termination protection and offer to enable it
    StackProtection {
        /// Enable protection without asking
        #[arg(long)]
        yes: bool,

        /// Export the status table to CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Report SNS topic encryption and encrypt topics with a KMS key
    SnsEncryption {
        /// Export the status table to CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Find security groups open to the internet and what uses them
    SgExposure {
        /// Also treat ::/0 ingress as open
        #[arg(long)]
        ipv6: bool,

        /// Export the association table to CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Report Identity Center permission sets, assignments and memberships
    SsoPermissions(SsoArgs),

    /// Find principals granted specific IAM permissions
    IamPermissions(IamArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(hint) = classify_anyhow_error(e).suggestion() {
        let _ = writeln!(stderr, "\n\x1b[36mHint:\x1b[0m {hint}");
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so reports on stdout stay clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,aws_config=warn,aws_sdk=warn,aws_smithy=warn")
            }),
        )
        .init();

    let settings = args.aws_settings();
    if let Some(profile) = &settings.profile {
        info!(profile = %profile, "Using AWS profile");
    }

    let mut prompt = TerminalPrompter;

    match args.command {
        Command::StackProtection { yes, csv } => {
            let ctx = settings.load().await;
            get_current_account_id(&ctx).await?;
            let regions = resolve_regions(&ctx, &settings.region_filter()).await?;
            let config = StackProtectionConfig {
                assume_yes: yes,
                csv,
            };
            commands::stacks::run(
                &CloudFormationClient::from_context(&ctx),
                &mut prompt,
                settings.profile_label(),
                &regions,
                &config,
            )
            .await?;
        }

        Command::SnsEncryption { csv } => {
            let ctx = settings.load().await;
            get_current_account_id(&ctx).await?;
            let regions = resolve_regions(&ctx, &settings.region_filter()).await?;
            let config = SnsEncryptionConfig {
                csv,
                ..SnsEncryptionConfig::default()
            };
            commands::sns::run(
                &SnsClient::from_context(&ctx),
                &KmsClient::from_context(&ctx),
                &mut prompt,
                &regions,
                &config,
            )
            .await?;
        }

        Command::SgExposure { ipv6, csv } => {
            let ctx = settings.load().await;
            get_current_account_id(&ctx).await?;
            info!(region = %ctx.region(), ipv6, "Scanning security groups");
            let config = ExposureConfig {
                include_ipv6: ipv6,
                csv,
            };
            commands::exposure::run(&ExposureScanner::from_context(&ctx), &config).await?;
        }

        Command::SsoPermissions(sso_args) => {
            let config: SsoConfig = sso_args.into();
            let ctx = settings.load().await;
            get_current_account_id(&ctx).await?;
            let instance = discover_instance(
                &ctx,
                config.instance_arn.as_deref(),
                config.identity_store_id.as_deref(),
            )
            .await?;
            commands::sso::run(&SsoClient::new(&ctx, instance), &mut prompt, &config).await?;
        }

        Command::IamPermissions(iam_args) => {
            let config: PermissionsConfig = iam_args.into();
            let details = match &config.source {
                DetailsSource::File(path) => {
                    info!(path = %path.display(), "Reading authorization details");
                    AuthorizationDetails::load(path)?
                }
                DetailsSource::Live => {
                    let ctx = settings.load().await;
                    get_current_account_id(&ctx).await?;
                    IamClient::from_context(&ctx).authorization_details().await?
                }
            };
            commands::permissions::run(&details, &mut prompt, &config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn iam_defaults() {
        let args = Args::try_parse_from(["cloudaudit", "iam-permissions"]).unwrap();
        let Command::IamPermissions(iam) = args.command else {
            panic!("wrong subcommand");
        };
        let config: PermissionsConfig = iam.into();
        assert_eq!(config.source, DetailsSource::File(PathBuf::from("gaad.json")));
        assert_eq!(config.exact, default_exact_permissions());
        assert!(config.prefixes.is_empty());
    }

    #[test]
    fn iam_repeatable_filters() {
        let args = Args::try_parse_from([
            "cloudaudit",
            "iam-permissions",
            "--fetch",
            "--exact",
            "iam:PassRole",
            "--prefix",
            "s3:*",
            "--prefix",
            "kms:",
        ])
        .unwrap();
        let Command::IamPermissions(iam) = args.command else {
            panic!("wrong subcommand");
        };
        let config: PermissionsConfig = iam.into();
        assert_eq!(config.source, DetailsSource::Live);
        assert_eq!(config.exact, vec!["iam:PassRole"]);
        assert_eq!(config.prefixes, vec!["s3:*", "kms:"]);
    }

    #[test]
    fn input_conflicts_with_fetch() {
        assert!(
            Args::try_parse_from([
                "cloudaudit",
                "iam-permissions",
                "--fetch",
                "--input",
                "x.json"
            ])
            .is_err()
        );
    }

    #[test]
    fn sso_scope_flags() {
        let args = Args::try_parse_from(["cloudaudit", "sso-permissions", "--account", "123"]).unwrap();
        let Command::SsoPermissions(sso) = args.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(SsoConfig::from(sso).scope, AccountScope::Account("123".into()));

        assert!(
            Args::try_parse_from([
                "cloudaudit",
                "sso-permissions",
                "--all-accounts",
                "--account",
                "123"
            ])
            .is_err()
        );
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = Args::try_parse_from([
            "cloudaudit",
            "stack-protection",
            "--yes",
            "--profile",
            "audit",
            "--region",
            "eu-west-1",
        ])
        .unwrap();
        let settings = args.aws_settings();
        assert_eq!(settings.profile.as_deref(), Some("audit"));
        assert_eq!(settings.region_filter(), vec!["eu-west-1"]);
    }

    #[test]
    fn region_filter_ignores_environment_region() {
        // SAFETY: no other test in this binary reads AWS_REGION
        unsafe { std::env::set_var("AWS_REGION", "ap-south-1") };
        let args = Args::try_parse_from(["cloudaudit", "sns-encryption"]).unwrap();
        let settings = args.aws_settings();
        assert_eq!(settings.region, None);
        assert!(settings.region_filter().is_empty());
    }
}
