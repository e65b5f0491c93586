//! The WOPI host.

use crate::config::{ProofMode, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, WopiHandler};
use crate::http;
use crate::pipeline::{Pipeline, ProofStage, ResponseShaping};
use crate::proof::{AlwaysValid, ProofValidator, RelaxedProofValidator, SharedSecretProofValidator};
use crate::request::WopiRequest;
use crate::response::WopiResponse;
use std::sync::Arc;
use tracing::info;
use wopihost_core::{
    Clock, DocumentStore, FileDocumentStore, FileShareStore, LockStore, MemoryDocumentStore,
    MemoryLockStore, MemoryShareStore, ShareStore, StoreDir, SystemClock,
};

/// The WOPI host.
///
/// Owns the stores, the protocol handler and the request pipeline. Requests
/// can be fed directly through [`WopiServer::handle`] or served over HTTP with
/// [`WopiServer::serve`].
///
/// # Example
///
/// ```
/// use wopihost_server::{Operation, ServerConfig, WopiRequest, WopiServer};
/// use wopihost_core::NewDocument;
///
/// let server = WopiServer::in_memory(ServerConfig::default());
/// let doc = server.documents().create(NewDocument::new("report", "docx")).unwrap();
///
/// let request = WopiRequest::operation(Operation::Lock, doc.id.to_string())
///     .header("X-WOPI-Lock", "editor-1");
/// assert_eq!(server.handle(&request).status, 200);
/// ```
pub struct WopiServer {
    pipeline: Pipeline,
    handler: Arc<WopiHandler>,
    context: Arc<HandlerContext>,
}

impl WopiServer {
    /// Opens the host described by `config`.
    ///
    /// With a `store_path` the documents and shares persist in that
    /// directory; otherwise everything is kept in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store can't be
    /// opened.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let Some(path) = config.store_path.clone() else {
            return Ok(Self::in_memory(config));
        };
        let dir = StoreDir::open(&path, &config.store_config())?;
        let documents = Arc::new(FileDocumentStore::open(dir.clone(), clock.clone())?);
        let shares = Arc::new(FileShareStore::open(dir, clock.clone())?);
        let locks = Arc::new(MemoryLockStore::new(config.lock_config(), clock.clone()));
        info!(path = %path.display(), "using directory store");

        Self::with_stores(config, documents, locks, shares, clock)
    }

    /// Creates a host with in-memory stores.
    pub fn in_memory(config: ServerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::in_memory_with_clock(config, clock)
    }

    /// Creates a host with in-memory stores driven by `clock`.
    pub fn in_memory_with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        let documents = Arc::new(MemoryDocumentStore::new(clock.clone()));
        let locks = Arc::new(MemoryLockStore::new(config.lock_config(), clock.clone()));
        let shares = Arc::new(MemoryShareStore::new(clock.clone()));
        Self::assemble(config, documents, locks, shares, clock)
    }

    /// Creates a host over existing stores.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn with_stores(
        config: ServerConfig,
        documents: Arc<dyn DocumentStore>,
        locks: Arc<dyn LockStore>,
        shares: Arc<dyn ShareStore>,
        clock: Arc<dyn Clock>,
    ) -> ServerResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, documents, locks, shares, clock))
    }

    fn assemble(
        config: ServerConfig,
        documents: Arc<dyn DocumentStore>,
        locks: Arc<dyn LockStore>,
        shares: Arc<dyn ShareStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let validator = proof_validator(&config, clock);
        let server_version = config.server_version.clone();
        let context = Arc::new(HandlerContext::new(config, documents, locks, shares));
        let handler = Arc::new(WopiHandler::new(Arc::clone(&context)));
        let pipeline = Pipeline::new(Arc::clone(&handler))
            .with_stage(ProofStage::new(validator))
            .with_stage(ResponseShaping::new(server_version));

        Self {
            pipeline,
            handler,
            context,
        }
    }

    /// Runs a request through the pipeline.
    pub fn handle(&self, request: &WopiRequest) -> WopiResponse {
        self.pipeline.handle(request)
    }

    /// Serves the public download of a share.
    pub fn download_share(&self, uuid: &str) -> WopiResponse {
        self.handler.download_share(uuid)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the document store.
    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.context.documents
    }

    /// Returns the lock store.
    pub fn locks(&self) -> &Arc<dyn LockStore> {
        &self.context.locks
    }

    /// Returns the share store.
    pub fn shares(&self) -> &Arc<dyn ShareStore> {
        &self.context.shares
    }

    /// Builds the HTTP router for this host.
    pub fn router(self: &Arc<Self>) -> axum::Router {
        http::router(Arc::clone(self))
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the address can't be bound or the server fails.
    pub async fn serve(self: Arc<Self>) -> ServerResult<()> {
        let addr = self.config().bind_addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, public_url = %self.config().public_url, "listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServerError::Io)
    }
}

fn proof_validator(config: &ServerConfig, clock: Arc<dyn Clock>) -> Arc<dyn ProofValidator> {
    let secret = config.proof_secret.clone().unwrap_or_default();
    match config.proof_mode {
        ProofMode::Disabled => Arc::new(AlwaysValid),
        ProofMode::Relaxed => Arc::new(RelaxedProofValidator::new(Arc::new(
            SharedSecretProofValidator::new(secret, clock),
        ))),
        ProofMode::Strict => Arc::new(SharedSecretProofValidator::new(secret, clock)),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Operation;
    use axum::http::StatusCode;
    use tempfile::tempdir;
    use wopihost_core::NewDocument;

    #[test]
    fn responses_carry_server_version() {
        let server = WopiServer::in_memory(ServerConfig::default());
        let doc = server
            .documents()
            .create(NewDocument::new("a", "txt"))
            .unwrap();

        let response = server.handle(&WopiRequest::operation(Operation::CheckFileInfo, doc.id.to_string()));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.header("X-WOPI-ServerVersion"),
            Some(server.config().server_version.as_str())
        );
    }

    #[test]
    fn strict_proof_rejects_unsigned_requests() {
        let config = ServerConfig::default().with_proof(ProofMode::Strict, "secret");
        let server = WopiServer::in_memory(config);
        let doc = server
            .documents()
            .create(NewDocument::new("a", "txt"))
            .unwrap();

        let response = server.handle(&WopiRequest::operation(Operation::CheckFileInfo, doc.id.to_string()));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn relaxed_proof_allows_unsigned_requests() {
        let config = ServerConfig::default().with_proof(ProofMode::Relaxed, "secret");
        let server = WopiServer::in_memory(config);
        let doc = server
            .documents()
            .create(NewDocument::new("a", "txt"))
            .unwrap();

        let response = server.handle(&WopiRequest::operation(Operation::CheckFileInfo, doc.id.to_string()));
        assert_eq!(response.status, StatusCode::OK);
    }

    #[test]
    fn directory_store_persists_documents() {
        let temp = tempdir().unwrap();
        let config = ServerConfig::default().with_store_path(temp.path());

        let id = {
            let server = WopiServer::open(config.clone()).unwrap();
            let doc = server.documents().create(NewDocument::new("a", "txt")).unwrap();
            let response = server.handle(
                &WopiRequest::operation(Operation::PutFile, doc.id.to_string()).body("hello"),
            );
            assert_eq!(response.status, StatusCode::OK);
            doc.id
        };

        let server = WopiServer::open(config).unwrap();
        let response = server.handle(&WopiRequest::operation(Operation::GetFile, id.to_string()));
        assert_eq!(&response.body[..], b"hello");
        assert_eq!(response.header("X-WOPI-ItemVersion"), Some("v2"));
    }

    #[test]
    fn open_rejects_invalid_config() {
        let config = ServerConfig::default().with_public_url("ftp://nope");
        assert!(matches!(
            WopiServer::open(config),
            Err(ServerError::Config(_))
        ));
    }
}
