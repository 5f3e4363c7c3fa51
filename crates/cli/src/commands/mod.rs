//! CLI command definitions and execution
//!
//! Each service command resolves its connection settings, builds one
//! client for the named bucket or queue and runs a single operation
//! against the [`ObjectStore`](ak_core::ObjectStore) or
//! [`MessageQueue`](ak_core::MessageQueue) trait.

use std::time::Duration;

use ak_core::{
    CancellationToken, ClientConfig, ConfigManager, Profile, ProfileManager, Result, with_deadline,
};
use clap::{Args, Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

pub mod consume;
mod profile;
mod s3;
mod sqs;

/// Region variable read when no flag or profile names a region
const AMBIENT_REGION_ENV: &str = "AWS_REGION";

/// ak - S3 and SQS command-line client
///
/// Talks to AWS or to a local emulator such as LocalStack.
#[derive(Parser, Debug)]
#[command(name = "ak")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Cancel the command after this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection settings given on the command line
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Profile to take connection settings from
    #[arg(long, global = true, env = "AK_PROFILE")]
    pub profile: Option<String>,

    /// Service region (e.g., "us-east-1")
    #[arg(long, global = true, env = "AK_REGION")]
    pub region: Option<String>,

    /// Override endpoint URL (e.g., "http://localhost:4566")
    #[arg(long, global = true, env = "AK_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Access key ID; requires --secret-key
    #[arg(long, global = true, requires = "secret_key")]
    pub access_key: Option<String>,

    /// Secret access key; requires --access-key
    #[arg(long, global = true, requires = "access_key")]
    pub secret_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage connection profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// Upload, list and download objects
    #[command(subcommand)]
    S3(s3::S3Commands),

    /// Send, receive and delete queue messages
    #[command(subcommand)]
    Sqs(sqs::SqsCommands),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli, cancel: CancellationToken) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json || configured_json_output(),
        no_color: cli.no_color,
        quiet: cli.quiet,
    };

    // The deadline's timer stops when it goes out of scope
    let deadline = cli
        .timeout
        .map(|secs| with_deadline(&cancel, Duration::from_secs(secs)));
    let cancel = deadline.as_ref().map_or(cancel, |d| d.token().clone());

    match cli.command {
        Commands::Profile(cmd) => profile::execute(cmd, &cli.connection, output_config).await,
        Commands::S3(cmd) => s3::execute(cmd, &cli.connection, output_config, &cancel).await,
        Commands::Sqs(cmd) => sqs::execute(cmd, &cli.connection, output_config, &cancel).await,
    }
}

/// `[defaults] output` from the config file; an unreadable file is
/// reported by the command that needs it
fn configured_json_output() -> bool {
    match ConfigManager::new().and_then(|m| m.load()) {
        Ok(config) => config.defaults.json_output(),
        Err(e) => {
            tracing::debug!(error = %e, "config file unavailable, using human output");
            false
        }
    }
}

/// Build the client settings for `resource` from flags, profile and environment
pub(crate) fn client_config(conn: &ConnectionArgs, resource: &str) -> Result<ClientConfig> {
    let profile = ProfileManager::new()?.resolve(conn.profile.as_deref())?;
    if let Some(p) = &profile {
        tracing::debug!(profile = %p.name, "using profile");
    }

    Ok(merge_connection(
        conn,
        profile.as_ref(),
        resource,
        std::env::var(AMBIENT_REGION_ENV).ok(),
    ))
}

/// Flags win over the profile; the ambient region only fills a gap
fn merge_connection(
    conn: &ConnectionArgs,
    profile: Option<&Profile>,
    resource: &str,
    ambient_region: Option<String>,
) -> ClientConfig {
    let region = conn
        .region
        .clone()
        .or_else(|| profile.map(|p| p.region.clone()))
        .or(ambient_region.filter(|r| !r.is_empty()))
        .unwrap_or_else(|| ak_core::profile::DEFAULT_REGION.to_string());

    let mut config = ClientConfig::new(resource, region);

    config.endpoint_url = conn
        .endpoint_url
        .clone()
        .or_else(|| profile.and_then(|p| p.endpoint_url.clone()));

    // Credentials travel as a pair; a flag pair replaces the profile pair
    if conn.access_key.is_some() || conn.secret_key.is_some() {
        config.access_key = conn.access_key.clone();
        config.secret_key = conn.secret_key.clone();
    } else if let Some(p) = profile {
        config.access_key = p.access_key.clone();
        config.secret_key = p.secret_key.clone();
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localstack_profile() -> Profile {
        Profile::new("local", "eu-west-1")
            .with_endpoint_url("http://localhost:4566")
            .with_credentials("test", "test")
    }

    #[test]
    fn test_cli_parses_global_connection_flags() {
        let cli = Cli::try_parse_from([
            "ak",
            "s3",
            "ls",
            "my-bucket",
            "--region",
            "ap-south-1",
            "--endpoint-url",
            "http://localhost:4566",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.connection.region.as_deref(), Some("ap-south-1"));
        assert_eq!(
            cli.connection.endpoint_url.as_deref(),
            Some("http://localhost:4566")
        );
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::S3(_)));
    }

    #[test]
    fn test_cli_rejects_lone_access_key() {
        let result = Cli::try_parse_from(["ak", "sqs", "send", "q", "hi", "--access-key", "AKID"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_defaults_without_profile() {
        let conn = ConnectionArgs::default();
        let config = merge_connection(&conn, None, "orders", None);

        assert_eq!(config.resource, "orders");
        assert_eq!(config.region, "us-east-1");
        assert!(config.endpoint_url.is_none());
        assert!(config.access_key.is_none());
    }

    #[test]
    fn test_merge_ambient_region_fills_gap() {
        let conn = ConnectionArgs::default();
        let config = merge_connection(&conn, None, "orders", Some("sa-east-1".into()));
        assert_eq!(config.region, "sa-east-1");

        let profile = localstack_profile();
        let config = merge_connection(&conn, Some(&profile), "orders", Some("sa-east-1".into()));
        assert_eq!(config.region, "eu-west-1");
    }

    #[test]
    fn test_merge_profile_settings() {
        let conn = ConnectionArgs::default();
        let profile = localstack_profile();
        let config = merge_connection(&conn, Some(&profile), "bucket", None);

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.access_key.as_deref(), Some("test"));
        assert_eq!(config.secret_key.as_deref(), Some("test"));
    }

    #[test]
    fn test_merge_flags_override_profile() {
        let conn = ConnectionArgs {
            region: Some("us-west-2".into()),
            endpoint_url: Some("http://127.0.0.1:9000".into()),
            access_key: Some("AKID".into()),
            secret_key: Some("SECRET".into()),
            ..Default::default()
        };
        let profile = localstack_profile();
        let config = merge_connection(&conn, Some(&profile), "bucket", None);

        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(config.access_key.as_deref(), Some("AKID"));
        assert_eq!(config.secret_key.as_deref(), Some("SECRET"));
    }
}
