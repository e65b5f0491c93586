//! Import command implementation.

use super::open_store;
use std::path::Path;
use tracing::info;
use wopihost_core::{split_filename, DocumentStore, NewDocument};

/// Runs the import command.
pub fn run(
    store: &Path,
    file: &Path,
    name: Option<&str>,
    owner: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let filename = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("Cannot derive a file name from {}", file.display()))?
            .to_string(),
    };
    let content = std::fs::read(file)?;
    let (name, extension) = split_filename(&filename);

    let documents = open_store(store, true)?;
    let doc = documents.create(
        NewDocument::new(name, extension)
            .with_content(content)
            .with_owner(owner),
    )?;
    info!(file_id = %doc.id, size = doc.size, "imported {}", doc.basename());
    println!("{}\t{}", doc.id, doc.basename());
    Ok(())
}
