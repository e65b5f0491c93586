//! Advisory document locks with lazy expiry.

use crate::clock::Clock;
use crate::config::LockConfig;
use crate::error::CoreResult;
use crate::types::{FileId, LockToken};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A lock held on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    /// Token presented by the lock holder.
    pub token: LockToken,
    /// When the lock was acquired or last refreshed.
    pub acquired_at: DateTime<Utc>,
}

impl Lock {
    /// Creates a lock acquired at `at`.
    #[must_use]
    pub fn new(token: LockToken, at: DateTime<Utc>) -> Self {
        Self {
            token,
            acquired_at: at,
        }
    }

    /// Returns true while `now - acquired_at <= ttl`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.acquired_at <= ttl,
            // A TTL too large to represent never expires.
            Err(_) => true,
        }
    }
}

/// Storage for document locks.
///
/// A document has at most one lock. Every read checks the lock's age against
/// the store's TTL first; an expired lock is removed by that read and reported
/// as absent. There is no background sweeper.
///
/// Each method is atomic with respect to the others for the same document id.
pub trait LockStore: Send + Sync {
    /// Returns the valid lock on a document, evicting it if it has expired.
    fn lock(&self, id: FileId) -> CoreResult<Option<Lock>>;

    /// Sets (or replaces) the lock on a document, stamped with the current time.
    fn set(&self, id: FileId, token: LockToken) -> CoreResult<()>;

    /// Resets the timestamp of a valid lock. Returns false if there is none.
    fn refresh(&self, id: FileId) -> CoreResult<bool>;

    /// Removes the lock. Returns true if a lock (valid or not) was removed.
    fn delete(&self, id: FileId) -> CoreResult<bool>;

    /// Returns the token of the valid lock on a document.
    fn get(&self, id: FileId) -> CoreResult<Option<LockToken>> {
        Ok(self.lock(id)?.map(|lock| lock.token))
    }

    /// Returns true if the document holds a valid lock.
    fn has(&self, id: FileId) -> CoreResult<bool> {
        Ok(self.lock(id)?.is_some())
    }
}

/// In-memory lock store.
///
/// Locks are process-local; they vanish on restart, which matches their
/// short TTL.
#[derive(Debug)]
pub struct MemoryLockStore {
    locks: Mutex<HashMap<FileId, Lock>>,
    config: LockConfig,
    clock: Arc<dyn Clock>,
}

impl MemoryLockStore {
    /// Creates an empty lock store.
    pub fn new(config: LockConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Returns the number of stored locks, including expired ones not yet read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns true if no lock is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LockStore for MemoryLockStore {
    fn lock(&self, id: FileId) -> CoreResult<Option<Lock>> {
        let now = self.clock.now();
        let mut locks = self.locks.lock();
        match locks.get(&id) {
            Some(lock) if lock.is_valid_at(now, self.config.ttl) => Ok(Some(lock.clone())),
            Some(lock) => {
                debug!(file_id = %id, token = %lock.token, "evicting expired lock");
                locks.remove(&id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, id: FileId, token: LockToken) -> CoreResult<()> {
        let now = self.clock.now();
        self.locks.lock().insert(id, Lock::new(token, now));
        Ok(())
    }

    fn refresh(&self, id: FileId) -> CoreResult<bool> {
        let now = self.clock.now();
        let mut locks = self.locks.lock();
        match locks.get_mut(&id) {
            Some(lock) if lock.is_valid_at(now, self.config.ttl) => {
                lock.acquired_at = now;
                Ok(true)
            }
            Some(_) => {
                locks.remove(&id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: FileId) -> CoreResult<bool> {
        Ok(self.locks.lock().remove(&id).is_some())
    }
}
