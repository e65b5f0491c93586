//! List command implementation.

use super::open_store;
use serde::Serialize;
use std::path::Path;
use wopihost_core::DocumentStore;

/// One row of the listing.
#[derive(Debug, Serialize)]
pub struct Entry {
    /// Document id.
    pub id: String,
    /// File name with extension.
    pub name: String,
    /// Content size in bytes.
    pub size: u64,
    /// Item version.
    pub version: String,
    /// Last modification time, RFC 3339.
    pub last_modified: String,
}

/// Runs the list command.
pub fn run(store: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let documents = open_store(store, false)?;
    let mut entries: Vec<Entry> = documents
        .list()?
        .into_iter()
        .map(|doc| Entry {
            id: doc.id.to_string(),
            name: doc.basename(),
            size: doc.size,
            version: doc.item_version(),
            last_modified: doc.last_modified.to_rfc3339(),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            if entries.is_empty() {
                println!("No documents");
            }
            for entry in &entries {
                println!(
                    "{}  {:>10}  {:>5}  {}",
                    entry.id, entry.size, entry.version, entry.name
                );
            }
        }
    }
    Ok(())
}
