//! Core type definitions.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum lock token length accepted from a WOPI client.
pub const MAX_LOCK_LENGTH: usize = 1024;

/// Identifier of a document.
///
/// File ids are plain UUIDs and stay stable across revisions and renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Creates a new random file id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for FileId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidFileId {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Content revision of a document.
///
/// Revisions start at 1 when a document is created and grow by exactly one
/// on every content write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionNumber(pub u64);

impl RevisionNumber {
    /// Revision assigned to a newly created document.
    pub const FIRST: Self = Self(1);

    /// Creates a new revision number.
    #[must_use]
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the raw revision value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next revision number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the WOPI item version string (`v<revision>`).
    #[must_use]
    pub fn item_version(self) -> String {
        format!("v{}", self.0)
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque lock token issued by a WOPI client.
///
/// Tokens are compared by exact equality and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LockToken(String);

impl LockToken {
    /// Creates a lock token, rejecting empty or oversized values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLockToken` if the token is empty or longer than
    /// [`MAX_LOCK_LENGTH`] characters.
    pub fn new(token: impl Into<String>) -> CoreResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(CoreError::invalid_lock_token("token is empty"));
        }
        let len = token.chars().count();
        if len > MAX_LOCK_LENGTH {
            return Err(CoreError::invalid_lock_token(format!(
                "token is {len} characters, maximum is {MAX_LOCK_LENGTH}"
            )));
        }
        Ok(Self(token))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LockToken {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl From<LockToken> for String {
    fn from(token: LockToken) -> Self {
        token.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
