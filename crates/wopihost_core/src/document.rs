//! Document and revision model.

use crate::error::{CoreError, CoreResult};
use crate::types::{FileId, RevisionNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Characters WOPI clients and common file systems refuse in file names.
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Maximum length of a document name, in characters.
const MAX_NAME_LENGTH: usize = 255;

/// Document metadata.
///
/// Content bytes are not part of this struct; read them through
/// [`DocumentStore::read`](crate::DocumentStore::read).
///
/// # Invariants
///
/// - `size` equals the length of the current content
/// - `revision` grows by exactly one on every content write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier.
    pub id: FileId,
    /// Base name, without extension.
    pub name: String,
    /// Extension without the leading dot (may be empty).
    pub extension: String,
    /// Content length in bytes.
    pub size: u64,
    /// Current content revision.
    pub revision: RevisionNumber,
    /// SHA-256 digest of the current content.
    pub sha256: [u8; 32],
    /// Owner identity.
    pub owner: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last content write or rename.
    pub last_modified: DateTime<Utc>,
    /// Opaque per-user data stored by `PutUserInfo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<String>,
}

impl Document {
    /// Returns `name.extension`, or just the name if there is no extension.
    #[must_use]
    pub fn basename(&self) -> String {
        join_filename(&self.name, &self.extension)
    }

    /// Returns the WOPI item version of the current content.
    #[must_use]
    pub fn item_version(&self) -> String {
        self.revision.item_version()
    }

    /// Returns true if the document has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Parameters for creating a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// Base name, without extension.
    pub name: String,
    /// Extension without the leading dot.
    pub extension: String,
    /// Initial content.
    pub content: Vec<u8>,
    /// Owner identity.
    pub owner: String,
}

impl NewDocument {
    /// Creates an empty document description.
    pub fn new(name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            content: Vec::new(),
            owner: String::from("wopihost"),
        }
    }

    /// Creates a document description from a `name.extension` file name.
    pub fn from_filename(filename: &str) -> Self {
        let (name, extension) = split_filename(filename);
        Self::new(name, extension)
    }

    /// Sets the initial content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Returns `name.extension`.
    #[must_use]
    pub fn basename(&self) -> String {
        join_filename(&self.name, &self.extension)
    }
}

/// An immutable snapshot of a document's content state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Document this revision belongs to.
    pub file_id: FileId,
    /// Revision number.
    pub number: RevisionNumber,
    /// When the revision was recorded.
    pub timestamp: DateTime<Utc>,
    /// Who produced the revision.
    pub editor: String,
    /// Content length at this revision.
    pub size: u64,
    /// SHA-256 digest of the content at this revision.
    pub sha256: [u8; 32],
}

/// Splits `name.ext` into `("name", "ext")`.
///
/// Names starting with a dot and containing no other dot (`.profile`) are
/// treated as having no extension.
#[must_use]
pub fn split_filename(filename: &str) -> (String, String) {
    match filename.rsplit_once('.') {
        Some((name, ext)) if !name.is_empty() => (name.to_string(), ext.to_string()),
        _ => (filename.to_string(), String::new()),
    }
}

pub(crate) fn join_filename(name: &str, extension: &str) -> String {
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{name}.{extension}")
    }
}

/// Checks that a document name is acceptable.
///
/// # Errors
///
/// Returns `InvalidFilename` for empty or overlong names, names containing
/// path separators or characters reserved on common file systems, and names
/// containing control characters.
pub fn validate_name(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::invalid_filename(name, "name is empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::invalid_filename(
            name,
            format!("name is longer than {MAX_NAME_LENGTH} characters"),
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| FORBIDDEN_NAME_CHARS.contains(c) || c.is_control())
    {
        return Err(CoreError::invalid_filename(
            name,
            format!("contains forbidden character {c:?}"),
        ));
    }
    Ok(())
}

pub(crate) fn digest(content: &[u8]) -> [u8; 32] {
    Sha256::digest(content).into()
}
