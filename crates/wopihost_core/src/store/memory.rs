//! In-memory document store for testing.

use super::DocumentStore;
use crate::clock::Clock;
use crate::document::{digest, validate_name, Document, NewDocument, Revision};
use crate::error::{CoreError, CoreResult};
use crate::types::{FileId, RevisionNumber};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct Entry {
    document: Document,
    history: Vec<(Revision, Bytes)>,
}

/// An in-memory document store.
///
/// Keeps every revision's content in memory. Suitable for:
/// - Unit and integration tests
/// - Ephemeral hosts that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    entries: RwLock<HashMap<FileId, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn create(&self, new: NewDocument) -> CoreResult<Document> {
        validate_name(&new.name)?;
        let mut entries = self.entries.write();

        let filename = new.basename();
        if entries.values().any(|e| e.document.basename() == filename) {
            return Err(CoreError::DuplicateFilename { filename });
        }

        let now = self.clock.now();
        let id = FileId::new();
        let sha256 = digest(&new.content);
        let document = Document {
            id,
            name: new.name,
            extension: new.extension,
            size: new.content.len() as u64,
            revision: RevisionNumber::FIRST,
            sha256,
            owner: new.owner.clone(),
            created_at: now,
            last_modified: now,
            user_info: None,
        };
        let revision = Revision {
            file_id: id,
            number: RevisionNumber::FIRST,
            timestamp: now,
            editor: new.owner,
            size: document.size,
            sha256,
        };

        entries.insert(
            id,
            Entry {
                document: document.clone(),
                history: vec![(revision, Bytes::from(new.content))],
            },
        );
        Ok(document)
    }

    fn find_by_id(&self, id: FileId) -> CoreResult<Option<Document>> {
        Ok(self.entries.read().get(&id).map(|e| e.document.clone()))
    }

    fn find_by_filename(&self, filename: &str) -> CoreResult<Option<Document>> {
        Ok(self
            .entries
            .read()
            .values()
            .find(|e| e.document.basename() == filename)
            .map(|e| e.document.clone()))
    }

    fn list(&self) -> CoreResult<Vec<Document>> {
        let mut documents: Vec<_> = self
            .entries
            .read()
            .values()
            .map(|e| e.document.clone())
            .collect();
        documents.sort_by_key(Document::basename);
        Ok(documents)
    }

    fn read(&self, id: FileId) -> CoreResult<Bytes> {
        let entries = self.entries.read();
        let entry = entries.get(&id).ok_or_else(|| CoreError::not_found(id))?;
        Ok(entry
            .history
            .last()
            .map(|(_, content)| content.clone())
            .unwrap_or_default())
    }

    fn write(&self, id: FileId, content: &[u8], editor: &str) -> CoreResult<Document> {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let entry = entries.get_mut(&id).ok_or_else(|| CoreError::not_found(id))?;

        let number = entry.document.revision.next();
        let sha256 = digest(content);
        entry.document.revision = number;
        entry.document.size = content.len() as u64;
        entry.document.sha256 = sha256;
        entry.document.last_modified = now;

        let revision = Revision {
            file_id: id,
            number,
            timestamp: now,
            editor: editor.to_string(),
            size: content.len() as u64,
            sha256,
        };
        entry
            .history
            .push((revision, Bytes::copy_from_slice(content)));
        Ok(entry.document.clone())
    }

    fn rename(&self, id: FileId, name: &str) -> CoreResult<Document> {
        validate_name(name)?;
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let extension = entries
            .get(&id)
            .map(|e| e.document.extension.clone())
            .ok_or_else(|| CoreError::not_found(id))?;
        let filename = crate::document::join_filename(name, &extension);
        if entries
            .values()
            .any(|e| e.document.id != id && e.document.basename() == filename)
        {
            return Err(CoreError::DuplicateFilename { filename });
        }

        let entry = entries.get_mut(&id).ok_or_else(|| CoreError::not_found(id))?;
        entry.document.name = name.to_string();
        entry.document.last_modified = now;
        Ok(entry.document.clone())
    }

    fn set_user_info(&self, id: FileId, info: &str) -> CoreResult<Document> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(&id).ok_or_else(|| CoreError::not_found(id))?;
        entry.document.user_info = Some(info.to_string());
        Ok(entry.document.clone())
    }

    fn revisions(&self, id: FileId) -> CoreResult<Vec<Revision>> {
        let entries = self.entries.read();
        let entry = entries.get(&id).ok_or_else(|| CoreError::not_found(id))?;
        Ok(entry.history.iter().map(|(r, _)| r.clone()).collect())
    }

    fn read_revision(&self, id: FileId, number: RevisionNumber) -> CoreResult<Bytes> {
        let entries = self.entries.read();
        let entry = entries.get(&id).ok_or_else(|| CoreError::not_found(id))?;
        entry
            .history
            .iter()
            .find(|(r, _)| r.number == number)
            .map(|(_, content)| content.clone())
            .ok_or(CoreError::RevisionNotFound {
                id,
                revision: number,
            })
    }

    fn remove(&self, id: FileId) -> CoreResult<()> {
        self.entries
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found(id))
    }
}
