//! # wopihost server
//!
//! WOPI protocol handler and HTTP host.
//!
//! This crate provides:
//! - The protocol handler for every WOPI file operation
//! - The document lock state machine (Lock, Unlock, RefreshLock, UnlockAndRelock)
//! - Proof header validation (disabled, relaxed or shared-secret HMAC)
//! - A request pipeline of ordered stages around the handler
//! - The axum HTTP binding and the [`WopiServer`] facade
//!
//! # Architecture
//!
//! ```text
//! HTTP → router → WopiRequest → Pipeline (ProofStage → WopiHandler → ResponseShaping) → WopiResponse
//! ```
//!
//! The handler is transport independent: it takes a [`WopiRequest`] and always
//! returns a [`WopiResponse`]. Protocol failures become status codes and
//! `X-WOPI-*` headers, never Rust errors.
//!
//! # Locks
//!
//! A document is locked when the lock store holds an unexpired token for it.
//! Content writes require the holder's token, except the very first write to
//! an empty unlocked document:
//!
//! ```rust
//! use wopihost_server::{Operation, ServerConfig, WopiRequest, WopiServer};
//! use wopihost_core::NewDocument;
//!
//! let server = WopiServer::in_memory(ServerConfig::default());
//! let doc = server.documents().create(NewDocument::new("a", "txt")).unwrap();
//! let id = doc.id.to_string();
//!
//! let first = WopiRequest::operation(Operation::PutFile, id.clone()).body("hello");
//! assert_eq!(server.handle(&first).status, 200);
//!
//! let second = WopiRequest::operation(Operation::PutFile, id).body("again");
//! assert_eq!(server.handle(&second).status, 409);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod file_info;
mod handler;
mod headers;
mod http;
mod pipeline;
mod proof;
mod relative;
mod request;
mod response;
mod server;

pub use config::{ProofMode, ServerConfig};
pub use error::{ServerError, ServerResult, WopiError, WopiResult};
pub use file_info::{CheckFileInfo, PutRelativeFileInfo, RenameFileInfo, ShareUrlInfo};
pub use handler::{HandlerContext, WopiHandler};
pub use http::router;
pub use pipeline::{Pipeline, ProofStage, ResponseShaping, Stage};
pub use proof::{
    proof_data, to_ticks, AlwaysValid, ProofValidator, RelaxedProofValidator,
    SharedSecretProofValidator, DEFAULT_PROOF_MAX_AGE,
};
pub use request::{Operation, Target, WopiRequest};
pub use response::WopiResponse;
pub use server::WopiServer;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
