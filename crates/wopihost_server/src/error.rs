//! Error types for the WOPI host.

use crate::headers;
use crate::response::WopiResponse;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;
use wopihost_core::CoreError;

/// Result type for protocol operations.
pub type WopiResult<T> = Result<T, WopiError>;

/// Result type for server setup and I/O.
pub type ServerResult<T> = Result<T, ServerError>;

/// Protocol-level failures.
///
/// Every variant maps to one WOPI status code and header set through
/// [`WopiError::into_response`]; these errors never leave the handler as
/// Rust errors.
#[derive(Error, Debug)]
pub enum WopiError {
    /// Malformed request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A requested file name is not allowed (400 with
    /// `X-WOPI-InvalidFileNameError`).
    #[error("invalid file name: {0}")]
    InvalidName(String),

    /// Unknown file or share (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The document is locked with another token (409).
    #[error("lock mismatch: {reason}")]
    LockMismatch {
        /// Token currently holding the lock.
        current: String,
        /// Human readable failure reason.
        reason: String,
        /// Current item version, if known.
        item_version: Option<String>,
    },

    /// The operation requires a lock but the document is unlocked (409).
    #[error("not locked: {reason}")]
    LockMissing {
        /// Human readable failure reason.
        reason: String,
        /// Current item version, if known.
        item_version: Option<String>,
    },

    /// Name collision (409).
    #[error("conflict: {reason}")]
    Conflict {
        /// Human readable failure reason.
        reason: String,
        /// A free alternative name, sent as `X-WOPI-ValidRelativeTarget`.
        valid_target: Option<String>,
    },

    /// A request precondition does not hold (412).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Proof headers did not verify (500).
    #[error("proof rejected: {0}")]
    ProofRejected(String),

    /// Unsupported operation (501).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Store failure (500).
    #[error("storage error: {0}")]
    Storage(#[source] CoreError),
}

impl WopiError {
    /// Creates a lock mismatch against the current token.
    pub fn lock_mismatch(current: impl Into<String>, reason: impl Into<String>) -> Self {
        WopiError::LockMismatch {
            current: current.into(),
            reason: reason.into(),
            item_version: None,
        }
    }

    /// Creates a missing-lock error.
    pub fn lock_missing(reason: impl Into<String>) -> Self {
        WopiError::LockMissing {
            reason: reason.into(),
            item_version: None,
        }
    }

    /// Attaches the document's item version to a lock failure.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_item_version(mut self, version: String) -> Self {
        match &mut self {
            WopiError::LockMismatch { item_version, .. }
            | WopiError::LockMissing { item_version, .. } => *item_version = Some(version),
            _ => {}
        }
        self
    }

    /// Returns the HTTP status of this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            WopiError::BadRequest(_) | WopiError::InvalidName(_) => StatusCode::BAD_REQUEST,
            WopiError::NotFound(_) => StatusCode::NOT_FOUND,
            WopiError::LockMismatch { .. }
            | WopiError::LockMissing { .. }
            | WopiError::Conflict { .. } => StatusCode::CONFLICT,
            WopiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            WopiError::ProofRejected(_) | WopiError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WopiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Returns true if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Converts the error into its WOPI response.
    pub fn into_response(self) -> WopiResponse {
        let status = self.status();
        match self {
            WopiError::LockMismatch {
                current,
                reason,
                item_version,
            } => with_version(
                WopiResponse::new(status)
                    .with_lock(&current)
                    .with_header(headers::LOCK_FAILURE_REASON, &reason),
                item_version,
            ),
            WopiError::LockMissing {
                reason,
                item_version,
            } => with_version(
                WopiResponse::new(status)
                    .with_lock("")
                    .with_header(headers::LOCK_FAILURE_REASON, &reason),
                item_version,
            ),
            WopiError::Conflict {
                valid_target: Some(target),
                ..
            } => WopiResponse::new(status).with_header(headers::VALID_RELATIVE_TARGET, &target),
            WopiError::InvalidName(reason) => {
                WopiResponse::new(status).with_header(headers::INVALID_FILE_NAME_ERROR, &reason)
            }
            WopiError::Storage(err) => {
                error!(error = %err, "storage failure");
                WopiResponse::new(status)
            }
            _ => WopiResponse::new(status),
        }
    }
}

fn with_version(response: WopiResponse, version: Option<String>) -> WopiResponse {
    match version {
        Some(version) => response.with_item_version(&version),
        None => response,
    }
}

impl From<CoreError> for WopiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DocumentNotFound { id } => WopiError::NotFound(id.to_string()),
            CoreError::InvalidFileId { value } => WopiError::NotFound(value),
            CoreError::InvalidLockToken { message } => WopiError::BadRequest(message),
            CoreError::InvalidFilename { reason, .. } => WopiError::InvalidName(reason),
            CoreError::DuplicateFilename { filename } => WopiError::Conflict {
                reason: format!("{filename} already exists"),
                valid_target: None,
            },
            other => WopiError::Storage(other),
        }
    }
}

/// Errors raised while configuring or running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Store failure during startup.
    #[error("store error: {0}")]
    Core(#[from] CoreError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wopihost_core::FileId;

    #[test]
    fn status_mapping() {
        assert_eq!(WopiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(WopiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(WopiError::lock_missing("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            WopiError::PreconditionFailed("x".into()).status(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            WopiError::ProofRejected("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WopiError::NotImplemented("x".into()).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert!(WopiError::NotFound("x".into()).is_client_error());
    }

    #[test]
    fn lock_mismatch_carries_current_lock() {
        let response = WopiError::lock_mismatch("L1", "locked by another editor")
            .with_item_version("v3".into())
            .into_response();
        assert_eq!(response.status, StatusCode::CONFLICT);
        assert_eq!(response.header("X-WOPI-Lock"), Some("L1"));
        assert_eq!(response.header("X-WOPI-ItemVersion"), Some("v3"));
        assert!(response.header("X-WOPI-LockFailureReason").is_some());
    }

    #[test]
    fn lock_missing_sends_empty_lock() {
        let response = WopiError::lock_missing("not locked").into_response();
        assert_eq!(response.header("X-WOPI-Lock"), Some(""));
        assert!(response.header("X-WOPI-ItemVersion").is_none());
    }

    #[test]
    fn core_errors_are_classified() {
        let id = FileId::new();
        assert!(matches!(
            WopiError::from(CoreError::not_found(id)),
            WopiError::NotFound(_)
        ));
        assert!(matches!(
            WopiError::from(CoreError::invalid_filename("a/b", "contains '/'")),
            WopiError::InvalidName(_)
        ));
        assert!(matches!(
            WopiError::from(CoreError::StoreLocked),
            WopiError::Storage(_)
        ));
    }
}
