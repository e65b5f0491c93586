//! Store directory management.
//!
//! This module handles the file system layout of a persistent store:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                     # Advisory lock for single-process access
//! ├─ shares.json              # Public share records
//! └─ documents/
//!    └─ <file-id>/
//!       ├─ document.json      # Metadata and revision list
//!       └─ r000001.bin        # Content of each revision
//! ```
//!
//! The LOCK file ensures only one process serves a store at a time.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{FileId, RevisionNumber};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE: &str = "LOCK";
const SHARES_FILE: &str = "shares.json";
const DOCUMENTS_DIR: &str = "documents";
const METADATA_FILE: &str = "document.json";
const TEMP_SUFFIX: &str = "tmp";

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    sync_on_write: bool,
    _lock_file: File,
}

/// An opened store directory.
///
/// Holds an exclusive lock on the directory for as long as any clone is alive.
/// Cloning is cheap; the document store and share store of one host share the
/// same `StoreDir`.
#[derive(Debug, Clone)]
pub struct StoreDir {
    inner: Arc<Inner>,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, config: &StoreConfig) -> CoreResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        fs::create_dir_all(path.join(DOCUMENTS_DIR))?;

        Ok(Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                sync_on_write: config.sync_on_write,
                _lock_file: lock_file,
            }),
        })
    }

    /// Returns the store root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the directory holding all documents.
    #[must_use]
    pub fn documents_dir(&self) -> PathBuf {
        self.inner.path.join(DOCUMENTS_DIR)
    }

    /// Returns the directory of one document.
    #[must_use]
    pub fn document_dir(&self, id: FileId) -> PathBuf {
        self.documents_dir().join(id.to_string())
    }

    /// Returns the metadata file of one document.
    #[must_use]
    pub fn metadata_path(&self, id: FileId) -> PathBuf {
        self.document_dir(id).join(METADATA_FILE)
    }

    /// Returns the content file of one revision.
    #[must_use]
    pub fn content_path(&self, id: FileId, revision: RevisionNumber) -> PathBuf {
        self.document_dir(id)
            .join(format!("r{:06}.bin", revision.as_u64()))
    }

    /// Returns the share records file.
    #[must_use]
    pub fn shares_path(&self) -> PathBuf {
        self.inner.path.join(SHARES_FILE)
    }

    /// Writes a file atomically.
    ///
    /// Uses write-then-rename for crash safety:
    /// 1. Write to a temporary sibling file
    /// 2. Sync it to disk (if `sync_on_write`)
    /// 3. Rename it over the target
    /// 4. Fsync the parent directory so the rename is durable
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> CoreResult<()> {
        let temp_path = path.with_extension(TEMP_SUFFIX);

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        if self.inner.sync_on_write {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&temp_path, path)?;

        if let Some(parent) = path.parent() {
            self.sync_directory(parent)?;
        }
        Ok(())
    }

    /// Fsyncs a directory so entry creation, rename or deletion is durable.
    ///
    /// NTFS journals metadata, so this is a no-op on Windows.
    #[cfg(unix)]
    pub fn sync_directory(&self, dir: &Path) -> CoreResult<()> {
        if self.inner.sync_on_write {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    #[allow(missing_docs)]
    pub fn sync_directory(&self, _dir: &Path) -> CoreResult<()> {
        Ok(())
    }
}
