//! Serializer-agnostic catalog snapshot.
//!
//! The catalog never picks a wire format. It hands out a [`SerializableState`]
//! made of caller-encoded strings and rebuilds itself from one through
//! caller-supplied decoders.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub key: String,
    /// `None` in a structure-only snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub key: String,
    pub metadata: String,
}

/// Everything needed to rebuild a catalog. Lists are sorted for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableState {
    pub categories: Vec<String>,
    pub entities: Vec<EntityRecord>,
    pub tags: Vec<TagRecord>,
    #[serde(default)]
    pub metadata: Vec<MetadataRecord>,
}

impl SerializableState {
    /// True when no entity payload was encoded.
    pub fn is_structure_only(&self) -> bool {
        self.entities.iter().all(|e| e.entity.is_none())
    }
}

/// Caller-supplied encoders for [`crate::CategoryManager::get_serializable_state`].
pub struct StateEncoders<'a, E, K, M> {
    pub key: &'a dyn Fn(&K) -> String,
    pub entity: Option<&'a dyn Fn(&E) -> String>,
    pub metadata: Option<&'a dyn Fn(&M) -> String>,
}

impl<'a, E, K, M> StateEncoders<'a, E, K, M> {
    /// Keys only: categories and tags without entity or metadata payloads.
    pub fn structure_only(key: &'a dyn Fn(&K) -> String) -> Self {
        Self {
            key,
            entity: None,
            metadata: None,
        }
    }

    pub fn with_entities(mut self, entity: &'a dyn Fn(&E) -> String) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_metadata(mut self, metadata: &'a dyn Fn(&M) -> String) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Caller-supplied decoders for [`crate::CategoryManager::load_serializable_state`].
///
/// `entity` receives the decoded key and the encoded payload, if any, so a
/// structure-only snapshot can be rehydrated from an external entity source.
pub struct StateDecoders<'a, E, K, M> {
    pub key: &'a dyn Fn(&str) -> Option<K>,
    pub entity: &'a dyn Fn(&K, Option<&str>) -> Option<E>,
    pub metadata: Option<&'a dyn Fn(&str) -> Option<M>>,
}

/// What could not be restored, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub record: String,
    pub error: CatalogError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub entities_loaded: usize,
    pub tag_links_loaded: usize,
    pub metadata_loaded: usize,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, record: impl Into<String>, error: CatalogError) {
        self.failures.push(LoadFailure {
            record: record.into(),
            error,
        });
    }
}
