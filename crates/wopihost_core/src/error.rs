//! Error types for wopihost core.

use crate::types::{FileId, RevisionNumber};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Metadata could not be encoded or decoded.
    #[error("metadata encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// No document with this id exists.
    #[error("document not found: {id}")]
    DocumentNotFound {
        /// The id that was looked up.
        id: FileId,
    },

    /// The requested revision does not exist for this document.
    #[error("revision {revision} not found for document {id}")]
    RevisionNotFound {
        /// The document id.
        id: FileId,
        /// The requested revision.
        revision: RevisionNumber,
    },

    /// A document with the same file name already exists.
    #[error("a document named {filename:?} already exists")]
    DuplicateFilename {
        /// The conflicting `name.extension`.
        filename: String,
    },

    /// The value is not a valid file id.
    #[error("invalid file id: {value:?}")]
    InvalidFileId {
        /// The rejected value.
        value: String,
    },

    /// The value is not a valid lock token.
    #[error("invalid lock token: {message}")]
    InvalidLockToken {
        /// Why the token was rejected.
        message: String,
    },

    /// The file name is not acceptable.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidFilename {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// On-disk layout is invalid.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl CoreError {
    /// Creates a document not found error.
    pub fn not_found(id: FileId) -> Self {
        Self::DocumentNotFound { id }
    }

    /// Creates an invalid lock token error.
    pub fn invalid_lock_token(message: impl Into<String>) -> Self {
        Self::InvalidLockToken {
            message: message.into(),
        }
    }

    /// Creates an invalid file name error.
    pub fn invalid_filename(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilename {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by caller input rather than storage.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::DocumentNotFound { .. }
                | CoreError::RevisionNotFound { .. }
                | CoreError::DuplicateFilename { .. }
                | CoreError::InvalidFileId { .. }
                | CoreError::InvalidLockToken { .. }
                | CoreError::InvalidFilename { .. }
        )
    }
}
