//! Document storage.

mod dir;
mod file;
mod memory;

pub use dir::StoreDir;
pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

use crate::document::{Document, NewDocument, Revision};
use crate::error::CoreResult;
use crate::types::{FileId, RevisionNumber};
use bytes::Bytes;

/// Persistent storage for documents and their revision history.
///
/// The store owns revision numbering: `create` records revision 1 and every
/// successful `write` appends exactly one revision. History is append-only.
///
/// # Implementors
///
/// - [`MemoryDocumentStore`] - For tests and ephemeral hosts
/// - [`FileDocumentStore`] - For persistent storage in a directory
pub trait DocumentStore: Send + Sync {
    /// Creates a document and records its first revision.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateFilename` if a document with the same name and
    /// extension exists, or `InvalidFilename` if the name is rejected.
    fn create(&self, new: NewDocument) -> CoreResult<Document>;

    /// Looks up a document by id.
    fn find_by_id(&self, id: FileId) -> CoreResult<Option<Document>>;

    /// Looks up a document by `name.extension`.
    fn find_by_filename(&self, filename: &str) -> CoreResult<Option<Document>>;

    /// Lists all documents ordered by file name.
    fn list(&self) -> CoreResult<Vec<Document>>;

    /// Returns the current content of a document.
    fn read(&self, id: FileId) -> CoreResult<Bytes>;

    /// Replaces the content of a document, appending a revision.
    fn write(&self, id: FileId, content: &[u8], editor: &str) -> CoreResult<Document>;

    /// Renames a document. The extension and content are unchanged.
    fn rename(&self, id: FileId, name: &str) -> CoreResult<Document>;

    /// Stores opaque user info on a document.
    fn set_user_info(&self, id: FileId, info: &str) -> CoreResult<Document>;

    /// Returns every revision of a document, oldest first.
    fn revisions(&self, id: FileId) -> CoreResult<Vec<Revision>>;

    /// Returns the content of a document at a past revision.
    fn read_revision(&self, id: FileId, number: RevisionNumber) -> CoreResult<Bytes>;

    /// Removes a document and its history.
    fn remove(&self, id: FileId) -> CoreResult<()>;

    /// Returns the latest revision of a document.
    fn current_revision(&self, id: FileId) -> CoreResult<Revision> {
        self.revisions(id)?
            .pop()
            .ok_or_else(|| crate::CoreError::not_found(id))
    }

    /// Returns a specific revision of a document, if it exists.
    fn revision_at(&self, id: FileId, number: RevisionNumber) -> CoreResult<Option<Revision>> {
        Ok(self
            .revisions(id)?
            .into_iter()
            .find(|revision| revision.number == number))
    }
}
