//! s3 commands - upload, list and download objects

use std::io::{Read, Write};
use std::path::PathBuf;

use ak_aws::S3Client;
use ak_core::{CancellationToken, ObjectStore, ObjectSummary};
use clap::{Args, Subcommand};
use humansize::{BINARY, format_size};
use serde::Serialize;

use super::{ConnectionArgs, client_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum S3Commands {
    /// Upload an object from a file or stdin
    Put(PutArgs),

    /// List objects in a bucket (first page only)
    Ls(LsArgs),

    /// Download an object to a file or stdout
    Get(GetArgs),
}

impl S3Commands {
    fn bucket(&self) -> &str {
        match self {
            S3Commands::Put(args) => &args.bucket,
            S3Commands::Ls(args) => &args.bucket,
            S3Commands::Get(args) => &args.bucket,
        }
    }
}

#[derive(Args, Debug)]
pub struct PutArgs {
    pub bucket: String,

    /// Object key (e.g., "reports/2024.csv")
    pub key: String,

    /// File to upload; reads stdin when omitted
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    pub bucket: String,

    /// Only list keys starting with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Show totals after the listing
    #[arg(long)]
    pub summarize: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub bucket: String,

    pub key: String,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output structure for ls (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
    items: Vec<ObjectSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

impl Summary {
    fn of(items: &[ObjectSummary]) -> Self {
        let total_size_bytes = items.iter().map(|o| o.size).sum();
        Self {
            total_objects: items.len(),
            total_size_bytes,
            total_size_human: format_size(total_size_bytes, BINARY),
        }
    }
}

#[derive(Debug, Serialize)]
struct GetOutput {
    location: String,
    size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// Execute an s3 subcommand
pub async fn execute(
    cmd: S3Commands,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
    cancel: &CancellationToken,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match client_config(conn, cmd.bucket()) {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to resolve connection settings", &e),
    };

    let client = match S3Client::new(config).await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create S3 client", &e),
    };

    match cmd {
        S3Commands::Put(args) => put(&client, args, &formatter, cancel).await,
        S3Commands::Ls(args) => list(&client, args, &formatter, cancel).await,
        S3Commands::Get(args) => get(&client, args, &formatter, cancel).await,
    }
}

async fn put(
    store: &dyn ObjectStore,
    args: PutArgs,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> ExitCode {
    let data = match read_input(args.file.as_ref()) {
        Ok(d) => d,
        Err(e) => {
            formatter.error(&format!("Failed to read input: {e}"));
            return ExitCode::GeneralError;
        }
    };
    let size = data.len();
    if size == 0 {
        formatter.warning(&format!("Uploading an empty object to {}", args.key));
    }

    match store.upload(&args.key, data, cancel).await {
        Ok(result) => {
            if formatter.is_json() {
                formatter.json(&result);
            } else {
                formatter.success(&format!(
                    "Uploaded {} ({})",
                    result.location,
                    format_size(size as u64, BINARY)
                ));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail("Failed to upload object", &e),
    }
}

async fn list(
    store: &dyn ObjectStore,
    args: LsArgs,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> ExitCode {
    let result = match args.prefix.as_deref() {
        Some(prefix) => store.list_by_prefix(prefix, cancel).await,
        None => store.list_all(cancel).await,
    };

    let items = match result {
        Ok(items) => items,
        Err(e) => return formatter.fail("Failed to list objects", &e),
    };

    if formatter.is_json() {
        let summary = args.summarize.then(|| Summary::of(&items));
        formatter.json(&LsOutput {
            bucket: store.bucket().to_string(),
            prefix: args.prefix,
            items,
            summary,
        });
        return ExitCode::Success;
    }

    for item in &items {
        let date = item
            .last_modified
            .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| " ".repeat(19));
        let size = format_size(item.size, BINARY);
        formatter.println(&format!("[{date}] {size:>10} {}", item.key));
    }
    if args.summarize {
        let summary = Summary::of(&items);
        formatter.println(&format!(
            "\nTotal: {} objects, {}",
            summary.total_objects, summary.total_size_human
        ));
    }
    ExitCode::Success
}

async fn get(
    store: &dyn ObjectStore,
    args: GetArgs,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> ExitCode {
    let data = match store.get(&args.key, cancel).await {
        Ok(d) => d,
        Err(e) => return formatter.fail("Failed to get object", &e),
    };

    let location = format!("{}/{}", store.bucket(), args.key);
    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &data) {
                formatter.error(&format!("Failed to write {}: {e}", path.display()));
                return ExitCode::GeneralError;
            }
            if formatter.is_json() {
                formatter.json(&GetOutput {
                    location,
                    size_bytes: data.len(),
                    path: Some(path.display().to_string()),
                });
            } else {
                formatter.success(&format!(
                    "Downloaded {location} to {} ({})",
                    path.display(),
                    format_size(data.len() as u64, BINARY)
                ));
            }
        }
        None => {
            // Raw bytes go to stdout regardless of output mode
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(&data).and_then(|()| stdout.flush()) {
                formatter.error(&format!("Failed to write to stdout: {e}"));
                return ExitCode::GeneralError;
            }
        }
    }
    ExitCode::Success
}

fn read_input(file: Option<&PathBuf>) -> std::io::Result<Vec<u8>> {
    match file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buffer)?;
            Ok(buffer)
        }
    }
}
