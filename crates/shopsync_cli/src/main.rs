//! shopsync CLI
//!
//! Command-line tools for inspecting and maintaining a shopsync store
//! directory.
//!
//! # Commands
//!
//! - `status` - Show pending/synced counts
//! - `list` - List pending updates
//! - `enqueue` - Stage a mutation for an owner
//! - `cache` - Show the cached server snapshot for an owner
//! - `purge` - Delete synced records

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// shopsync command-line queue tools.
#[derive(Parser)]
#[command(name = "shopsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pending/synced counts
    Status,

    /// List pending updates
    List {
        /// Only show updates for this owner
        #[arg(short, long)]
        owner: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Stage a mutation for an owner
    Enqueue {
        /// Owner the mutation applies to
        owner: String,

        /// Mutation payload as a JSON object
        payload: String,
    },

    /// Show the cached server snapshot for an owner
    Cache {
        /// Owner to look up
        owner: String,
    },

    /// Delete synced records
    Purge,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status => {
            let path = cli.path.ok_or("Store path required for status")?;
            commands::status::run(&path)?;
        }
        Commands::List { owner, format } => {
            let path = cli.path.ok_or("Store path required for list")?;
            commands::list::run(&path, owner.as_deref(), &format)?;
        }
        Commands::Enqueue { owner, payload } => {
            let path = cli.path.ok_or("Store path required for enqueue")?;
            commands::enqueue::run(&path, &owner, &payload)?;
        }
        Commands::Cache { owner } => {
            let path = cli.path.ok_or("Store path required for cache")?;
            commands::cache::run(&path, &owner)?;
        }
        Commands::Purge => {
            let path = cli.path.ok_or("Store path required for purge")?;
            commands::purge::run(&path)?;
        }
        Commands::Version => {
            println!("shopsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
