//! # wopihost core
//!
//! Storage layer of the wopihost WOPI host.
//!
//! This crate provides:
//! - The document model ([`Document`], [`Revision`], [`NewDocument`])
//! - The [`DocumentStore`] trait with in-memory and directory-backed implementations
//! - The [`LockStore`] trait with lazy TTL expiry
//! - The [`ShareStore`] trait for public download links
//! - [`DocumentGuards`] for serializing read-modify-write sequences per document
//!
//! Stores know nothing about HTTP or WOPI headers. The protocol handler in
//! `wopihost_server` composes them.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use wopihost_core::{DocumentStore, LockConfig, LockStore, LockToken, MemoryDocumentStore,
//!     MemoryLockStore, NewDocument, SystemClock};
//!
//! let clock = Arc::new(SystemClock);
//! let documents = MemoryDocumentStore::new(clock.clone());
//! let locks = MemoryLockStore::new(LockConfig::default(), clock);
//!
//! let doc = documents.create(NewDocument::new("report", "docx")).unwrap();
//! locks.set(doc.id, LockToken::new("editor-1").unwrap()).unwrap();
//! assert!(locks.has(doc.id).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod document;
mod error;
mod guard;
mod lock;
mod share;
mod store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LockConfig, StoreConfig, DEFAULT_LOCK_TTL};
pub use document::{split_filename, validate_name, Document, NewDocument, Revision};
pub use error::{CoreError, CoreResult};
pub use guard::{DocumentGuard, DocumentGuards};
pub use lock::{Lock, LockStore, MemoryLockStore};
pub use share::{FileShareStore, MemoryShareStore, Share, ShareStore};
pub use store::{DocumentStore, FileDocumentStore, MemoryDocumentStore, StoreDir};
pub use types::{FileId, LockToken, RevisionNumber, MAX_LOCK_LENGTH};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
