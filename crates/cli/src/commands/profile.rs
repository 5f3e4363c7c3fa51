//! Profile management commands
//!
//! A profile stores the region, endpoint override and credentials for one
//! environment (e.g. "local" for LocalStack, "prod" for AWS). The connection
//! settings of `profile set` come from the global flags.

use ak_core::{Profile, ProfileManager, profile::DEFAULT_REGION};
use clap::Subcommand;
use serde::Serialize;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile from --region, --endpoint-url and credentials
    Set(SetArgs),

    /// List all configured profiles
    List,

    /// Remove a profile
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g., "local", "prod")
    pub name: String,

    /// Use this profile when --profile is not given
    #[arg(long)]
    pub default: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the profile to remove
    pub name: String,
}

/// Profile information for output (without secrets)
#[derive(Debug, Serialize)]
struct ProfileInfo {
    name: String,
    region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint_url: Option<String>,
    static_credentials: bool,
    default: bool,
}

impl ProfileInfo {
    fn new(profile: &Profile, default: Option<&str>) -> Self {
        Self {
            name: profile.name.clone(),
            region: profile.region.clone(),
            endpoint_url: profile.endpoint_url.clone(),
            static_credentials: profile.access_key.is_some(),
            default: default == Some(profile.name.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileListOutput {
    profiles: Vec<ProfileInfo>,
}

#[derive(Debug, Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
    message: String,
}

/// Execute a profile subcommand
pub async fn execute(
    cmd: ProfileCommands,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let manager = match ProfileManager::new() {
        Ok(m) => m,
        Err(e) => return formatter.fail("Failed to load configuration", &e),
    };

    match cmd {
        ProfileCommands::Set(args) => execute_set(args, conn, &manager, &formatter),
        ProfileCommands::List => execute_list(&manager, &formatter),
        ProfileCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn execute_set(
    args: SetArgs,
    conn: &ConnectionArgs,
    manager: &ProfileManager,
    formatter: &Formatter,
) -> ExitCode {
    if args.name.trim().is_empty() {
        formatter.error("Profile name cannot be empty");
        return ExitCode::UsageError;
    }

    let region = conn.region.as_deref().unwrap_or(DEFAULT_REGION);
    let mut profile = Profile::new(&args.name, region);
    if let Some(url) = &conn.endpoint_url {
        profile = profile.with_endpoint_url(url);
    }
    if let (Some(key), Some(secret)) = (&conn.access_key, &conn.secret_key) {
        profile = profile.with_credentials(key, secret);
    }

    // Reject settings no client could be built from
    if let Err(e) = profile.client_config("profile-check").resolve(ak_core::Service::Storage) {
        return formatter.fail(&format!("Invalid profile '{}'", args.name), &e);
    }

    if let Err(e) = manager.set(profile, args.default) {
        return formatter.fail("Failed to save profile", &e);
    }

    let message = format!("Profile '{}' configured successfully", args.name);
    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: args.name,
            message,
        });
    } else {
        formatter.success(&message);
    }
    ExitCode::Success
}

fn execute_list(manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profiles = match manager.list() {
        Ok(p) => p,
        Err(e) => return formatter.fail("Failed to list profiles", &e),
    };
    // A dangling default is reported by the commands that use it
    let default = manager.resolve(None).ok().flatten().map(|p| p.name);

    let infos: Vec<ProfileInfo> = profiles
        .iter()
        .map(|p| ProfileInfo::new(p, default.as_deref()))
        .collect();

    if formatter.is_json() {
        formatter.json(&ProfileListOutput { profiles: infos });
    } else if infos.is_empty() {
        formatter.println("No profiles configured.");
    } else {
        for info in &infos {
            let marker = if info.default { "*" } else { " " };
            let endpoint = info.endpoint_url.as_deref().unwrap_or("(aws)");
            let creds = if info.static_credentials {
                "static"
            } else {
                "ambient"
            };
            formatter.println(&format!(
                "{marker} {:<12} {:<16} {:<32} {creds}",
                info.name, info.region, endpoint
            ));
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    if let Err(e) = manager.remove(&args.name) {
        return formatter.fail(&format!("Failed to remove profile '{}'", args.name), &e);
    }

    let message = format!("Profile '{}' removed", args.name);
    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: args.name,
            message,
        });
    } else {
        formatter.success(&message);
    }
    ExitCode::Success
}
