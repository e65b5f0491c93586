//! Public share links.

use crate::clock::Clock;
use crate::error::CoreResult;
use crate::store::StoreDir;
use crate::types::FileId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A public, unauthenticated download link to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Public identifier used in the share URL.
    pub uuid: Uuid,
    /// The shared document.
    pub file_id: FileId,
    /// When the share was created.
    pub created_at: DateTime<Utc>,
}

/// Storage for share records.
///
/// A document has at most one share. [`ShareStore::ensure`] is idempotent:
/// calling it any number of times yields the same share.
pub trait ShareStore: Send + Sync {
    /// Returns the document's share, creating it if absent.
    fn ensure(&self, file_id: FileId) -> CoreResult<Share>;

    /// Looks up a share by its public uuid.
    fn find(&self, uuid: Uuid) -> CoreResult<Option<Share>>;

    /// Returns the document's share, if any.
    fn find_for(&self, file_id: FileId) -> CoreResult<Option<Share>>;

    /// Removes the document's share. Returns true if one existed.
    fn remove_for(&self, file_id: FileId) -> CoreResult<bool>;
}

fn ensure_in(shares: &mut Vec<Share>, file_id: FileId, now: DateTime<Utc>) -> (Share, bool) {
    if let Some(share) = shares.iter().find(|s| s.file_id == file_id) {
        return (share.clone(), false);
    }
    let share = Share {
        uuid: Uuid::new_v4(),
        file_id,
        created_at: now,
    };
    shares.push(share.clone());
    (share, true)
}

/// In-memory share store.
#[derive(Debug)]
pub struct MemoryShareStore {
    shares: RwLock<Vec<Share>>,
    clock: Arc<dyn Clock>,
}

impl MemoryShareStore {
    /// Creates an empty share store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            shares: RwLock::new(Vec::new()),
            clock,
        }
    }
}

impl ShareStore for MemoryShareStore {
    fn ensure(&self, file_id: FileId) -> CoreResult<Share> {
        let now = self.clock.now();
        Ok(ensure_in(&mut self.shares.write(), file_id, now).0)
    }

    fn find(&self, uuid: Uuid) -> CoreResult<Option<Share>> {
        Ok(self.shares.read().iter().find(|s| s.uuid == uuid).cloned())
    }

    fn find_for(&self, file_id: FileId) -> CoreResult<Option<Share>> {
        Ok(self
            .shares
            .read()
            .iter()
            .find(|s| s.file_id == file_id)
            .cloned())
    }

    fn remove_for(&self, file_id: FileId) -> CoreResult<bool> {
        let mut shares = self.shares.write();
        let before = shares.len();
        shares.retain(|s| s.file_id != file_id);
        Ok(shares.len() != before)
    }
}

/// Share store persisted as `shares.json` in a store directory.
#[derive(Debug)]
pub struct FileShareStore {
    dir: StoreDir,
    shares: RwLock<Vec<Share>>,
    clock: Arc<dyn Clock>,
}

impl FileShareStore {
    /// Opens the share records of a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `shares.json` exists but cannot be read or decoded.
    pub fn open(dir: StoreDir, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let path = dir.shares_path();
        let shares = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            Vec::new()
        };
        Ok(Self {
            dir,
            shares: RwLock::new(shares),
            clock,
        })
    }

    fn persist(&self, shares: &[Share]) -> CoreResult<()> {
        let data = serde_json::to_vec_pretty(shares)?;
        self.dir.write_atomic(&self.dir.shares_path(), &data)
    }
}

impl ShareStore for FileShareStore {
    fn ensure(&self, file_id: FileId) -> CoreResult<Share> {
        let now = self.clock.now();
        let mut shares = self.shares.write();
        let (share, created) = ensure_in(&mut shares, file_id, now);
        if created {
            if let Err(err) = self.persist(&shares) {
                shares.retain(|s| s.uuid != share.uuid);
                return Err(err);
            }
            debug!(file_id = %file_id, share = %share.uuid, "created share");
        }
        Ok(share)
    }

    fn find(&self, uuid: Uuid) -> CoreResult<Option<Share>> {
        Ok(self.shares.read().iter().find(|s| s.uuid == uuid).cloned())
    }

    fn find_for(&self, file_id: FileId) -> CoreResult<Option<Share>> {
        Ok(self
            .shares
            .read()
            .iter()
            .find(|s| s.file_id == file_id)
            .cloned())
    }

    fn remove_for(&self, file_id: FileId) -> CoreResult<bool> {
        let mut shares = self.shares.write();
        let before = shares.len();
        shares.retain(|s| s.file_id != file_id);
        if shares.len() == before {
            return Ok(false);
        }
        self.persist(&shares)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::StoreConfig;
    use tempfile::tempdir;

    #[test]
    fn ensure_is_idempotent() {
        let store = MemoryShareStore::new(Arc::new(SystemClock));
        let id = FileId::new();
        let first = store.ensure(id).unwrap();
        let second = store.ensure(id).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.find(first.uuid).unwrap(), Some(first));
    }

    #[test]
    fn one_share_per_document() {
        let store = MemoryShareStore::new(Arc::new(SystemClock));
        let a = store.ensure(FileId::new()).unwrap();
        let b = store.ensure(FileId::new()).unwrap();
        assert_ne!(a.uuid, b.uuid);
    }

    #[test]
    fn remove_for_document() {
        let store = MemoryShareStore::new(Arc::new(SystemClock));
        let id = FileId::new();
        let share = store.ensure(id).unwrap();
        assert!(store.remove_for(id).unwrap());
        assert!(!store.remove_for(id).unwrap());
        assert!(store.find(share.uuid).unwrap().is_none());
    }

    #[test]
    fn file_shares_survive_reopen() {
        let temp = tempdir().unwrap();
        let id = FileId::new();
        let share = {
            let dir = StoreDir::open(temp.path(), &StoreConfig::default()).unwrap();
            FileShareStore::open(dir, Arc::new(SystemClock))
                .unwrap()
                .ensure(id)
                .unwrap()
        };

        let dir = StoreDir::open(temp.path(), &StoreConfig::default()).unwrap();
        let store = FileShareStore::open(dir, Arc::new(SystemClock)).unwrap();
        assert_eq!(store.find_for(id).unwrap(), Some(share));
    }
}
