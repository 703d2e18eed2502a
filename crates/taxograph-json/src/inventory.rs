//! Inventory files and catalogs built from them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use taxograph_catalog::{
    BatchResult, CatalogConfig, CategoryManager, LoadReport, Metadata, StateDecoders,
    StateEncoders,
};

use crate::{Result, SnapshotDocument};

/// One line of an inventory file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub key: String,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// What an inventory catalog stores per key. Category, tags and metadata
/// live in the catalog's own indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub key: String,
    pub name: String,
}

impl From<&InventoryItem> for CatalogItem {
    fn from(item: &InventoryItem) -> Self {
        Self {
            key: item.key.clone(),
            name: item.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<InventoryItem>,
}

impl Inventory {
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, key: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|item| item.key == key)
    }
}

pub fn read_inventory(path: impl AsRef<Path>) -> Result<Inventory> {
    Inventory::from_json_str(&fs::read_to_string(path)?)
}

pub type InventoryCatalog = CategoryManager<CatalogItem, String>;

/// Empty catalog keyed by [`CatalogItem::key`].
pub fn inventory_catalog(config: CatalogConfig) -> InventoryCatalog {
    CategoryManager::with_config(config, |item: &CatalogItem| item.key.clone())
}

/// Register every inventory item with its tags and metadata.
pub fn load_inventory_into(
    catalog: &InventoryCatalog,
    inventory: &Inventory,
) -> BatchResult<String> {
    let mut out = BatchResult::new();
    for item in &inventory.items {
        let mut registration = catalog
            .register_with(
                item.key.clone(),
                CatalogItem::from(item),
                item.category.clone(),
            )
            .with_tags(item.tags.iter().cloned());
        if !item.metadata.is_empty() {
            registration = registration.with_metadata(item.metadata.clone());
        }
        out.push(item.key.clone(), registration.complete());
    }
    tracing::debug!(
        loaded = out.success_count(),
        failed = out.failure_count(),
        "loaded inventory"
    );
    out
}

fn encode<T: Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(%err, "could not encode snapshot payload");
            "null".to_string()
        }
    }
}

/// Snapshot an inventory catalog. Without `with_payload` only structure is
/// kept (categories, keys, tag links).
pub fn snapshot_inventory(catalog: &InventoryCatalog, with_payload: bool) -> SnapshotDocument {
    let key = |k: &String| k.clone();
    let entity = |e: &CatalogItem| encode(e);
    let metadata = |m: &Metadata| encode(m);

    let encoders = StateEncoders::<CatalogItem, String, Metadata>::structure_only(&key);
    let encoders = if with_payload {
        encoders.with_entities(&entity).with_metadata(&metadata)
    } else {
        encoders
    };
    SnapshotDocument::new(catalog.get_serializable_state(&encoders))
}

/// Replace `catalog`'s contents with `doc`.
///
/// Entities without an encoded payload are rehydrated from `source` when
/// given; otherwise they are reported as failures.
pub fn restore_inventory(
    catalog: &InventoryCatalog,
    doc: &SnapshotDocument,
    source: Option<&Inventory>,
) -> LoadReport {
    let by_key: HashMap<&str, &InventoryItem> = source
        .map(|inv| inv.items.iter().map(|i| (i.key.as_str(), i)).collect())
        .unwrap_or_default();

    let key = |s: &str| Some(s.to_string());
    let entity = |k: &String, payload: Option<&str>| match payload {
        Some(text) => serde_json::from_str::<CatalogItem>(text).ok(),
        None => by_key.get(k.as_str()).map(|item| CatalogItem::from(*item)),
    };
    let metadata = |s: &str| serde_json::from_str::<Metadata>(s).ok();

    catalog.load_serializable_state(
        &doc.state,
        &StateDecoders::<CatalogItem, String, Metadata> {
            key: &key,
            entity: &entity,
            metadata: Some(&metadata),
        },
    )
}
