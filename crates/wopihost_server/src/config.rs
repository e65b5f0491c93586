//! Server configuration.

use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;
use wopihost_core::{FileId, LockConfig, StoreConfig};

/// How WOPI proof headers are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofMode {
    /// Accept every request.
    #[default]
    Disabled,
    /// Check proofs only when both `X-WOPI-Proof` and `X-WOPI-ProofOld` are sent.
    Relaxed,
    /// Require a valid proof on every request.
    Strict,
}

/// Configuration for the WOPI host.
///
/// Deserializes from TOML; missing keys take their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Base URL clients use to reach this host, without trailing slash.
    pub public_url: String,
    /// Store directory. `None` keeps everything in memory.
    pub store_path: Option<PathBuf>,
    /// Whether store writes are fsynced.
    pub sync_on_write: bool,
    /// Lock lifetime in seconds.
    pub lock_ttl_secs: u64,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// User id reported by CheckFileInfo and used as default editor.
    pub user_id: String,
    /// Display name reported by CheckFileInfo.
    pub user_friendly_name: String,
    /// Report every document as read-only.
    pub read_only: bool,
    /// Disallow PutRelativeFile for clients.
    pub user_can_not_write_relative: bool,
    /// Ask clients to hide print commands.
    pub disable_print: bool,
    /// Allow clients to offer external marketplace add-ins.
    pub allow_external_marketplace: bool,
    /// Proof validation mode.
    pub proof_mode: ProofMode,
    /// Shared secret for proof validation.
    pub proof_secret: Option<String>,
    /// Reported as `X-WOPI-ServerVersion`.
    pub server_version: String,
}

impl ServerConfig {
    /// Creates a configuration bound to `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            public_url: format!("http://{bind_addr}"),
            store_path: None,
            sync_on_write: true,
            lock_ttl_secs: wopihost_core::DEFAULT_LOCK_TTL.as_secs(),
            max_body_bytes: 100 * 1024 * 1024,
            user_id: String::from("wopihost"),
            user_friendly_name: String::from("WOPI Host User"),
            read_only: false,
            user_can_not_write_relative: false,
            disable_print: false,
            allow_external_marketplace: false,
            proof_mode: ProofMode::Disabled,
            proof_secret: None,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Parses a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the document is malformed or fails validation.
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file can't be read, or `Config` if it is invalid.
    pub fn load(path: &Path) -> ServerResult<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Checks that the settings are consistent.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem found.
    pub fn validate(&self) -> ServerResult<()> {
        if !(self.public_url.starts_with("http://") || self.public_url.starts_with("https://")) {
            return Err(ServerError::Config(format!(
                "public_url must be an http(s) URL: {}",
                self.public_url
            )));
        }
        if self.lock_ttl_secs == 0 {
            return Err(ServerError::Config("lock_ttl_secs must be positive".into()));
        }
        if self.proof_mode != ProofMode::Disabled && self.proof_secret.is_none() {
            return Err(ServerError::Config(
                "proof_secret is required when proof_mode is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Sets the public base URL.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the store directory.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Sets the lock lifetime.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl_secs = ttl.as_secs();
        self
    }

    /// Sets the reported user.
    pub fn with_user(mut self, id: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        self.user_id = id.into();
        self.user_friendly_name = friendly_name.into();
        self
    }

    /// Reports documents as read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Enables proof validation with a shared secret.
    pub fn with_proof(mut self, mode: ProofMode, secret: impl Into<String>) -> Self {
        self.proof_mode = mode;
        self.proof_secret = Some(secret.into());
        self
    }

    /// Returns the lock configuration.
    #[must_use]
    pub fn lock_config(&self) -> LockConfig {
        LockConfig::new().ttl(Duration::from_secs(self.lock_ttl_secs))
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new().sync_on_write(self.sync_on_write)
    }

    /// Returns the CheckFileInfo URL of a document.
    #[must_use]
    pub fn file_url(&self, id: FileId, access_token: Option<&str>) -> String {
        let base = format!("{}/wopi/files/{id}", self.public_url);
        match access_token {
            Some(token) => format!("{base}?access_token={}", urlencoding::encode(token)),
            None => base,
        }
    }

    /// Returns the public download URL of a share.
    #[must_use]
    pub fn share_url(&self, uuid: Uuid) -> String {
        format!("{}/share/{uuid}", self.public_url)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.public_url, "http://127.0.0.1:8080");
        assert_eq!(config.lock_ttl_secs, 30 * 60);
        assert_eq!(config.proof_mode, ProofMode::Disabled);
        config.validate().unwrap();
    }

    #[test]
    fn from_toml_fills_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            bind_addr = "0.0.0.0:9000"
            public_url = "https://wopi.example.test"
            lock_ttl_secs = 100
            proof_mode = "relaxed"
            proof_secret = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.lock_config().ttl, Duration::from_secs(100));
        assert_eq!(config.proof_mode, ProofMode::Relaxed);
        assert_eq!(config.user_id, "wopihost");
        assert!(config.store_path.is_none());
    }

    #[test]
    fn proof_requires_secret() {
        let err = ServerConfig::from_toml("proof_mode = \"strict\"").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn unknown_proof_mode_rejected() {
        assert!(ServerConfig::from_toml("proof_mode = \"rsa\"").is_err());
    }

    #[test]
    fn file_url_encodes_token() {
        let config = ServerConfig::default().with_public_url("http://host/");
        let id = FileId::new();
        assert_eq!(
            config.file_url(id, Some("a b&c")),
            format!("http://host/wopi/files/{id}?access_token=a%20b%26c")
        );
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::default()
            .with_store_path("/tmp/wopi")
            .with_lock_ttl(Duration::from_secs(100))
            .with_user("u1", "User One")
            .with_proof(ProofMode::Strict, "k");

        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/wopi")));
        assert_eq!(config.lock_ttl_secs, 100);
        assert_eq!(config.user_friendly_name, "User One");
        config.validate().unwrap();
    }
}
