//! Per-document serialization.

use crate::types::FileId;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

/// Guard returned by [`DocumentGuards::acquire`].
pub type DocumentGuard = ArcMutexGuard<RawMutex, ()>;

/// A keyed mutex: one lock slot per document.
///
/// The protocol handler holds a document's guard across every
/// check-then-act sequence (inspect the lock, then write content; unlock, then
/// relock). Two requests for the same document therefore observe each other's
/// effects in order, while requests for different documents never contend.
#[derive(Debug, Default)]
pub struct DocumentGuards {
    slots: Mutex<HashMap<FileId, Arc<Mutex<()>>>>,
}

impl DocumentGuards {
    /// Creates an empty guard table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the document's slot is free and returns its guard.
    pub fn acquire(&self, id: FileId) -> DocumentGuard {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(id).or_default())
        };
        slot.lock_arc()
    }

    /// Drops the slot of a document that no longer exists.
    ///
    /// Callers still holding the guard keep it; the next `acquire` creates a
    /// fresh slot.
    pub fn forget(&self, id: FileId) {
        self.slots.lock().remove(&id);
    }

    /// Returns the number of tracked slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if no slot is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
