//! Lockbox CLI - terminal front-end for the local vault
//!
//! Secrets never go on the command line: passwords, recovery phrases, keys
//! and PINs are read without echo. The master password may also come from
//! `LOCKBOX_PASSWORD` for scripted use.

mod args;
mod commands;
mod prompt;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so command output on stdout stays clean
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
