//! WiFi login CLI - build-time configuration pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Build artifacts into dist/
//! wifi-login build
//!
//! # Build without the default organization
//! wifi-login build --skip-default
//!
//! # Validate organization documents without writing anything
//! wifi-login check
//!
//! # Remove the default organization from written artifacts
//! wifi-login remove-default --out dist
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wifi_login_cli::commands::{self, build::BuildOptions};

#[derive(Parser)]
#[command(name = "wifi-login")]
#[command(author, version, about = "WiFi login portal build tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge organization documents and write the artifacts
    Build {
        /// Directory holding one directory per organization
        #[arg(long, default_value = "organizations")]
        organizations: PathBuf,

        /// Default organization template
        #[arg(long, default_value = "internals/config/default.yml")]
        defaults: PathBuf,

        /// Output directory
        #[arg(long, default_value = "dist")]
        out: PathBuf,

        /// Leave the `default` organization out of the artifacts
        #[arg(long)]
        skip_default: bool,
    },
    /// Validate organization documents without writing anything
    Check {
        /// Directory holding one directory per organization
        #[arg(long, default_value = "organizations")]
        organizations: PathBuf,

        /// Default organization template
        #[arg(long, default_value = "internals/config/default.yml")]
        defaults: PathBuf,
    },
    /// Remove the `default` organization from written artifacts
    RemoveDefault {
        /// Output directory of a previous build
        #[arg(long, default_value = "dist")]
        out: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli);

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Build {
            organizations,
            defaults,
            out,
            skip_default,
        } => commands::build::run(&BuildOptions {
            organizations,
            defaults,
            out,
            skip_default,
        })?,
        Commands::Check {
            organizations,
            defaults,
        } => commands::check::run(&organizations, &defaults)?,
        Commands::RemoveDefault { out } => commands::remove_default::run(&out)?,
    }

    Ok(())
}
