//! JSON persistence for Taxograph
//!
//! The catalog core is format-agnostic. This crate owns the on-disk shapes:
//! - **Snapshot documents**: a versioned wrapper around
//!   [`SerializableState`]
//! - **Inventories**: a flat list of keyed items with category, tags and
//!   metadata, used to seed a catalog
//!
//! Inventory catalogs store a [`CatalogItem`] per key, so a full snapshot of
//! one can be restored without any outside data.

mod inventory;

pub use inventory::{
    inventory_catalog, load_inventory_into, read_inventory, restore_inventory,
    snapshot_inventory, CatalogItem, Inventory, InventoryCatalog, InventoryItem,
};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use taxograph_catalog::SerializableState;

/// Snapshot document version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

pub type Result<T> = std::result::Result<T, JsonError>;

/// Versioned, self-describing catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub format_version: u32,
    pub state: SerializableState,
}

impl SnapshotDocument {
    pub fn new(state: SerializableState) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            state,
        }
    }
}

pub fn to_json_string(doc: &SnapshotDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Parse a snapshot, rejecting versions this crate does not understand.
pub fn from_json_str(input: &str) -> Result<SnapshotDocument> {
    let doc: SnapshotDocument = serde_json::from_str(input)?;
    if doc.format_version != FORMAT_VERSION {
        return Err(JsonError::UnsupportedVersion {
            found: doc.format_version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(doc)
}

pub fn write_snapshot(path: impl AsRef<Path>, doc: &SnapshotDocument) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_json_string(doc)?)?;
    tracing::info!(
        path = %path.display(),
        entities = doc.state.entities.len(),
        "wrote snapshot"
    );
    Ok(())
}

pub fn read_snapshot(path: impl AsRef<Path>) -> Result<SnapshotDocument> {
    from_json_str(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_future_versions() {
        let doc = SnapshotDocument {
            format_version: FORMAT_VERSION + 1,
            state: SerializableState::default(),
        };
        let text = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            from_json_str(&text),
            Err(JsonError::UnsupportedVersion { found, .. }) if found == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn missing_metadata_section_defaults_to_empty() {
        let text = r#"{
            "format_version": 1,
            "state": {
                "categories": ["A"],
                "entities": [{ "key": "k1", "category": "A" }],
                "tags": [{ "tag": "t", "keys": ["k1"] }]
            }
        }"#;
        let doc = from_json_str(text).unwrap();
        assert!(doc.state.metadata.is_empty());
        assert!(doc.state.is_structure_only());
        assert_eq!(doc.state.tags[0].keys, vec!["k1"]);
    }
}
