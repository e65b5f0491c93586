//! wopihost CLI
//!
//! Runs the WOPI host and manages its document store.
//!
//! # Commands
//!
//! - `serve` - Serve the WOPI endpoints over HTTP
//! - `import` - Add a local file to the store
//! - `list` - List stored documents
//! - `inspect` - Show a document and its revision history

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// WOPI host and document store tools.
#[derive(Parser)]
#[command(name = "wopihost")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long, env = "WOPIHOST_STORE")]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the WOPI endpoints
    Serve {
        /// TOML configuration file
        #[arg(short, long, env = "WOPIHOST_CONFIG")]
        config: Option<PathBuf>,

        /// Address to bind to
        #[arg(short, long, env = "WOPIHOST_BIND")]
        bind: Option<SocketAddr>,

        /// Base URL clients use to reach the host
        #[arg(long, env = "WOPIHOST_PUBLIC_URL")]
        public_url: Option<String>,
    },

    /// Add a local file to the store
    Import {
        /// File to import
        file: PathBuf,

        /// Store the document under this file name
        #[arg(short, long)]
        name: Option<String>,

        /// Owner recorded on the document
        #[arg(short, long, default_value = "wopihost")]
        owner: String,
    },

    /// List stored documents
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show a document and its revisions
    Inspect {
        /// Document id
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            public_url,
        } => {
            commands::serve::run(commands::serve::Options {
                config,
                bind,
                public_url,
                store: cli.store,
            })?;
        }
        Commands::Import { file, name, owner } => {
            let store = cli.store.ok_or("Store path required for import")?;
            commands::import::run(&store, &file, name.as_deref(), &owner)?;
        }
        Commands::List { format } => {
            let store = cli.store.ok_or("Store path required for list")?;
            commands::list::run(&store, &format)?;
        }
        Commands::Inspect { id, format } => {
            let store = cli.store.ok_or("Store path required for inspect")?;
            commands::inspect::run(&store, &id, &format)?;
        }
        Commands::Version => {
            println!("wopihost CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("wopihost core v{}", wopihost_core::VERSION);
            println!("wopihost server v{}", wopihost_server::VERSION);
        }
    }

    Ok(())
}
