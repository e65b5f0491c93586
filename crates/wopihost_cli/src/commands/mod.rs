//! CLI command implementations.

pub mod import;
pub mod inspect;
pub mod list;
pub mod serve;

use std::path::Path;
use std::sync::Arc;
use wopihost_core::{FileDocumentStore, StoreConfig, StoreDir, SystemClock};

/// Opens the document store at `path`.
///
/// Fails if a running host holds the store.
pub fn open_store(
    path: &Path,
    create_if_missing: bool,
) -> Result<FileDocumentStore, Box<dyn std::error::Error>> {
    let config = StoreConfig::new().create_if_missing(create_if_missing);
    let dir = StoreDir::open(path, &config)?;
    Ok(FileDocumentStore::open(dir, Arc::new(SystemClock))?)
}
