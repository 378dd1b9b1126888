//! dicomdb CLI
//!
//! Command-line tools for dicomdb database folders.
//!
//! # Commands
//!
//! - `tree` - Print the patient/study/series hierarchy
//! - `summary` - Print entity counts (text or JSON)
//! - `copy` - Copy an entity under an ancestor and commit
//! - `move` - Move an entity under an ancestor and commit
//! - `delete` - Delete an entity and commit

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// dicomdb command-line database tools.
#[derive(Parser)]
#[command(name = "dicomdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database folder
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
    /// Print the patient/study/series hierarchy
    Tree,

    /// Print entity counts
    Summary {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Copy an entity under an ancestor entity and commit
    Copy {
        /// Identifier tuple of the source entity (1-4 values)
        #[arg(long, num_args = 1..=4, required = true)]
        from: Vec<String>,

        /// Identifier tuple of the target ancestor (0-3 values)
        #[arg(long, num_args = 0..=3)]
        to: Vec<String>,
    },

    /// Move an entity under an ancestor entity and commit
    Move {
        /// Identifier tuple of the source entity (1-4 values)
        #[arg(long, num_args = 1..=4, required = true)]
        from: Vec<String>,

        /// Identifier tuple of the target ancestor (0-3 values)
        #[arg(long, num_args = 0..=3)]
        to: Vec<String>,
    },

    /// Delete an entity and commit
    Delete {
        /// Identifier tuple of the entity (1-4 values)
        #[arg(long, num_args = 1..=4, required = true)]
        at: Vec<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Tree => {
            let path = cli.path.ok_or("Database path required for tree")?;
            commands::tree::run(&path)?;
        }
        Commands::Summary { format } => {
            let path = cli.path.ok_or("Database path required for summary")?;
            commands::summary::run(&path, &format)?;
        }
        Commands::Copy { from, to } => {
            let path = cli.path.ok_or("Database path required for copy")?;
            commands::transfer::run_copy(&path, &from, &to)?;
        }
        Commands::Move { from, to } => {
            let path = cli.path.ok_or("Database path required for move")?;
            commands::transfer::run_move(&path, &from, &to)?;
        }
        Commands::Delete { at } => {
            let path = cli.path.ok_or("Database path required for delete")?;
            commands::delete::run(&path, &at)?;
        }
        Commands::Version => {
            println!("dicomdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("dicomdb Core v{}", dicomdb_core::VERSION);
        }
    }

    Ok(())
}
