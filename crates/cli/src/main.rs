//! ak - S3 and SQS command-line client
//!
//! Uploads, lists and downloads objects, and sends, receives and deletes
//! queue messages. Works against AWS or a local emulator such as LocalStack.

use ak_core::CancellationToken;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod exit_code;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; --debug only raises the fallback level
    let fallback = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let exit_code = commands::execute(cli, cancel).await;

    std::process::exit(exit_code.as_i32());
}
