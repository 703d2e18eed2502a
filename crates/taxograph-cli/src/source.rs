//! Opening a catalog from either an inventory or a snapshot file.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

use taxograph_catalog::CatalogConfig;
use taxograph_json::{Inventory, InventoryCatalog};

/// Snapshot documents carry a `format_version` field; anything else is read
/// as an inventory.
pub fn open(path: &Path, config: CatalogConfig) -> Result<InventoryCatalog> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let probe: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?;

    let catalog = taxograph_json::inventory_catalog(config);
    if probe.get("format_version").is_some() {
        let doc = taxograph_json::from_json_str(&text)?;
        let report = taxograph_json::restore_inventory(&catalog, &doc, None);
        for failure in &report.failures {
            tracing::warn!(record = %failure.record, error = %failure.error, "snapshot record skipped");
        }
        if report.entities_loaded == 0 && !doc.state.entities.is_empty() {
            return Err(anyhow!(
                "{} is a structure-only snapshot; use `snapshot inspect --inventory`",
                path.display()
            ));
        }
        return Ok(catalog);
    }

    let inventory = Inventory::from_json_str(&text)?;
    let result = taxograph_json::load_inventory_into(&catalog, &inventory);
    for (key, err) in result.failures() {
        tracing::warn!(key = %key, error = %err, "inventory item skipped");
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const INVENTORY: &str = r#"{ "items": [
        { "key": "a", "name": "Alpha", "category": "Zone.North", "tags": ["x"] },
        { "key": "b", "name": "Beta", "category": "Zone.South" }
    ] }"#;

    #[test]
    fn opens_inventories_and_snapshots_alike() {
        let dir = tempdir().unwrap();
        let inventory_path = dir.path().join("inventory.json");
        fs::write(&inventory_path, INVENTORY).unwrap();

        let catalog = open(&inventory_path, CatalogConfig::default()).unwrap();
        assert_eq!(catalog.entity_count(), 2);

        let snapshot_path = dir.path().join("snapshot.json");
        taxograph_json::write_snapshot(
            &snapshot_path,
            &taxograph_json::snapshot_inventory(&catalog, true),
        )
        .unwrap();
        let reopened = open(&snapshot_path, CatalogConfig::default()).unwrap();
        assert_eq!(reopened.get_by_category("Zone", true).len(), 2);
        assert!(reopened.has_tag(&"a".to_string(), "x"));
    }

    #[test]
    fn structure_only_snapshot_is_rejected() {
        let dir = tempdir().unwrap();
        let inventory_path = dir.path().join("inventory.json");
        fs::write(&inventory_path, INVENTORY).unwrap();
        let catalog = open(&inventory_path, CatalogConfig::default()).unwrap();

        let snapshot_path = dir.path().join("bare.json");
        taxograph_json::write_snapshot(
            &snapshot_path,
            &taxograph_json::snapshot_inventory(&catalog, false),
        )
        .unwrap();
        assert!(open(&snapshot_path, CatalogConfig::default()).is_err());
    }
}
