//! Inspect command implementation.

use super::open_store;
use serde::Serialize;
use std::path::Path;
use wopihost_core::{Document, DocumentStore, FileId, Revision};

/// Document inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Current metadata.
    pub document: Document,
    /// Content history, oldest first.
    pub revisions: Vec<Revision>,
}

/// Runs the inspect command.
pub fn run(store: &Path, id: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id: FileId = id.parse()?;
    let documents = open_store(store, false)?;
    let document = documents
        .find_by_id(id)?
        .ok_or_else(|| format!("No document {id}"))?;
    let revisions = documents.revisions(id)?;
    let result = InspectResult {
        document,
        revisions,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    let doc = &result.document;
    println!("Document {}", doc.id);
    println!("  Name:          {}", doc.basename());
    println!("  Owner:         {}", doc.owner);
    println!("  Size:          {} bytes", doc.size);
    println!("  Version:       {}", doc.item_version());
    println!("  Created:       {}", doc.created_at.to_rfc3339());
    println!("  Last modified: {}", doc.last_modified.to_rfc3339());
    println!("  SHA-256:       {}", hex(&doc.sha256));
    if let Some(info) = &doc.user_info {
        println!("  User info:     {info}");
    }

    println!();
    println!("Revisions:");
    for rev in &result.revisions {
        println!(
            "  r{:<4} {}  {:>10} bytes  {}",
            rev.number.as_u64(),
            rev.timestamp.to_rfc3339(),
            rev.size,
            rev.editor
        );
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
