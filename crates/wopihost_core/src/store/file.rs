//! Directory-backed document store.

use super::dir::StoreDir;
use super::DocumentStore;
use crate::clock::Clock;
use crate::document::{digest, join_filename, validate_name, Document, NewDocument, Revision};
use crate::error::{CoreError, CoreResult};
use crate::types::{FileId, RevisionNumber};
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// On-disk metadata of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Metadata {
    document: Document,
    revisions: Vec<Revision>,
}

/// A persistent document store.
///
/// Metadata of every document is loaded into memory when the store opens;
/// content is read from disk on demand. Each revision's content is kept in its
/// own file, so history is never rewritten.
///
/// # Durability
///
/// Content and metadata are written with write-then-rename. With
/// `sync_on_write` enabled both are fsynced before the call returns.
#[derive(Debug)]
pub struct FileDocumentStore {
    dir: StoreDir,
    index: RwLock<HashMap<FileId, Metadata>>,
    clock: Arc<dyn Clock>,
}

impl FileDocumentStore {
    /// Opens a store in `dir`, loading all document metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if a metadata file cannot be read or decoded.
    pub fn open(dir: StoreDir, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let mut index = HashMap::new();

        for entry in fs::read_dir(dir.documents_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Ok(id) = name.to_string_lossy().parse::<FileId>() else {
                warn!(entry = ?entry.path(), "skipping unexpected directory");
                continue;
            };

            let metadata_path = dir.metadata_path(id);
            if !metadata_path.exists() {
                warn!(file_id = %id, "skipping document without metadata");
                continue;
            }
            let metadata: Metadata = serde_json::from_slice(&fs::read(&metadata_path)?)?;
            if metadata.document.id != id {
                return Err(CoreError::invalid_format(format!(
                    "metadata in {} belongs to {}",
                    metadata_path.display(),
                    metadata.document.id
                )));
            }
            index.insert(id, metadata);
        }

        info!(path = %dir.path().display(), documents = index.len(), "opened document store");
        Ok(Self {
            dir,
            index: RwLock::new(index),
            clock,
        })
    }

    /// Returns the underlying store directory.
    #[must_use]
    pub fn dir(&self) -> &StoreDir {
        &self.dir
    }

    fn save_metadata(&self, metadata: &Metadata) -> CoreResult<()> {
        let data = serde_json::to_vec_pretty(metadata)?;
        self.dir
            .write_atomic(&self.dir.metadata_path(metadata.document.id), &data)
    }

    fn save_content(&self, id: FileId, revision: RevisionNumber, content: &[u8]) -> CoreResult<()> {
        self.dir
            .write_atomic(&self.dir.content_path(id, revision), content)
    }
}

impl DocumentStore for FileDocumentStore {
    fn create(&self, new: NewDocument) -> CoreResult<Document> {
        validate_name(&new.name)?;
        let mut index = self.index.write();

        let filename = new.basename();
        if index.values().any(|m| m.document.basename() == filename) {
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
        let metadata = Metadata {
            document: document.clone(),
            revisions: vec![Revision {
                file_id: id,
                number: RevisionNumber::FIRST,
                timestamp: now,
                editor: new.owner,
                size: document.size,
                sha256,
            }],
        };

        fs::create_dir_all(self.dir.document_dir(id))?;
        self.save_content(id, RevisionNumber::FIRST, &new.content)?;
        self.save_metadata(&metadata)?;
        self.dir.sync_directory(&self.dir.documents_dir())?;

        debug!(file_id = %id, filename = %filename, "created document");
        index.insert(id, metadata);
        Ok(document)
    }

    fn find_by_id(&self, id: FileId) -> CoreResult<Option<Document>> {
        Ok(self.index.read().get(&id).map(|m| m.document.clone()))
    }

    fn find_by_filename(&self, filename: &str) -> CoreResult<Option<Document>> {
        Ok(self
            .index
            .read()
            .values()
            .find(|m| m.document.basename() == filename)
            .map(|m| m.document.clone()))
    }

    fn list(&self) -> CoreResult<Vec<Document>> {
        let mut documents: Vec<_> = self
            .index
            .read()
            .values()
            .map(|m| m.document.clone())
            .collect();
        documents.sort_by_key(Document::basename);
        Ok(documents)
    }

    fn read(&self, id: FileId) -> CoreResult<Bytes> {
        let revision = self
            .index
            .read()
            .get(&id)
            .map(|m| m.document.revision)
            .ok_or_else(|| CoreError::not_found(id))?;
        Ok(Bytes::from(fs::read(self.dir.content_path(id, revision))?))
    }

    fn write(&self, id: FileId, content: &[u8], editor: &str) -> CoreResult<Document> {
        let now = self.clock.now();
        let mut index = self.index.write();
        let current = index.get(&id).ok_or_else(|| CoreError::not_found(id))?;

        let number = current.document.revision.next();
        let sha256 = digest(content);
        let mut updated = current.clone();
        updated.document.revision = number;
        updated.document.size = content.len() as u64;
        updated.document.sha256 = sha256;
        updated.document.last_modified = now;
        updated.revisions.push(Revision {
            file_id: id,
            number,
            timestamp: now,
            editor: editor.to_string(),
            size: content.len() as u64,
            sha256,
        });

        // Content first: metadata must never point at a revision file that
        // doesn't exist yet.
        self.save_content(id, number, content)?;
        self.save_metadata(&updated)?;

        let document = updated.document.clone();
        index.insert(id, updated);
        Ok(document)
    }

    fn rename(&self, id: FileId, name: &str) -> CoreResult<Document> {
        validate_name(name)?;
        let now = self.clock.now();
        let mut index = self.index.write();
        let current = index.get(&id).ok_or_else(|| CoreError::not_found(id))?;

        let filename = join_filename(name, &current.document.extension);
        if index
            .values()
            .any(|m| m.document.id != id && m.document.basename() == filename)
        {
            return Err(CoreError::DuplicateFilename { filename });
        }

        let mut updated = index
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(id))?;
        updated.document.name = name.to_string();
        updated.document.last_modified = now;
        self.save_metadata(&updated)?;

        let document = updated.document.clone();
        index.insert(id, updated);
        Ok(document)
    }

    fn set_user_info(&self, id: FileId, info: &str) -> CoreResult<Document> {
        let mut index = self.index.write();
        let mut updated = index
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(id))?;
        updated.document.user_info = Some(info.to_string());
        self.save_metadata(&updated)?;

        let document = updated.document.clone();
        index.insert(id, updated);
        Ok(document)
    }

    fn revisions(&self, id: FileId) -> CoreResult<Vec<Revision>> {
        self.index
            .read()
            .get(&id)
            .map(|m| m.revisions.clone())
            .ok_or_else(|| CoreError::not_found(id))
    }

    fn read_revision(&self, id: FileId, number: RevisionNumber) -> CoreResult<Bytes> {
        let known = self
            .index
            .read()
            .get(&id)
            .map(|m| m.revisions.iter().any(|r| r.number == number))
            .ok_or_else(|| CoreError::not_found(id))?;
        if !known {
            return Err(CoreError::RevisionNotFound {
                id,
                revision: number,
            });
        }
        Ok(Bytes::from(fs::read(self.dir.content_path(id, number))?))
    }

    fn remove(&self, id: FileId) -> CoreResult<()> {
        let mut index = self.index.write();
        if !index.contains_key(&id) {
            return Err(CoreError::not_found(id));
        }
        fs::remove_dir_all(self.dir.document_dir(id))?;
        self.dir.sync_directory(&self.dir.documents_dir())?;
        index.remove(&id);
        debug!(file_id = %id, "removed document");
        Ok(())
    }
}
