//! Serve command implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use wopihost_server::{ServerConfig, WopiServer};

/// Overrides taken from the command line.
#[derive(Debug, Default)]
pub struct Options {
    /// TOML configuration file.
    pub config: Option<PathBuf>,
    /// Bind address override.
    pub bind: Option<SocketAddr>,
    /// Public URL override.
    pub public_url: Option<String>,
    /// Store directory override.
    pub store: Option<PathBuf>,
}

/// Builds the server configuration from a file and command-line overrides.
pub fn config(options: Options) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = match &options.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = options.bind {
        config.bind_addr = bind;
        if options.public_url.is_none() && options.config.is_none() {
            config = config.with_public_url(format!("http://{bind}"));
        }
    }
    if let Some(url) = options.public_url {
        config = config.with_public_url(url);
    }
    if let Some(store) = options.store {
        config = config.with_store_path(store);
    }
    config.validate()?;
    Ok(config)
}

/// Runs the serve command.
pub fn run(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let config = config(options)?;
    match &config.store_path {
        Some(path) => info!(store = %path.display(), "opening store"),
        None => info!("no store path given, documents are kept in memory"),
    }

    let server = Arc::new(WopiServer::open(config)?);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}
