//! The catalog: keyed entities, a category forest, a tag index and metadata.
//!
//! ## Locks
//!
//! | lock | guards |
//! |------|--------|
//! | `tree` | category arena, `entity_key_to_node`, `node_to_entity_keys` |
//! | `tags` | `tag_to_entity_keys`, `entity_to_tag_ids`, the tag cache |
//! | `metadata` | per-entity metadata blobs |
//!
//! Any operation that needs more than one of them acquires them in the order
//! **tree → tags → metadata**. The entity store (`DashMap`) and both
//! [`IntegerMapper`]s are leaves: their internal locks are taken last and a
//! guard into them is never held while acquiring anything else.
//!
//! Removing an entity from the entity store always happens while all three
//! locks are held, so a holder of any one of them can trust
//! `entities.contains_key` for the duration of its critical section.

mod batch;
mod lifecycle;
mod query;
mod registration;
mod state;
mod tags;

pub use batch::{BatchOutcome, BatchResult};
pub use registration::Registration;

use ahash::{AHashMap, AHashSet};
use dashmap::DashMap;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::config::CatalogConfig;
use crate::mapper::{IntegerMapper, TermId};
use crate::node::CategoryTree;
use crate::normalize::{CategoryNormalizer, DefaultNormalizer};
use crate::regex_cache::RegexCache;
use crate::stats::{
    CatalogStatistics, CountingStatistics, NoopStatistics, StatEvent, StatisticsCollector,
};

/// Bounds every entity key must satisfy.
pub trait CatalogKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}
impl<T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static> CatalogKey for T {}

pub trait CatalogEntity: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> CatalogEntity for T {}

pub trait CatalogMetadata: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> CatalogMetadata for T {}

/// Default metadata blob: string fields.
pub type Metadata = BTreeMap<String, String>;

/// Derives an entity's key. Must be stable for the entity's lifetime.
pub type KeyFn<E, K> = Arc<dyn Fn(&E) -> K + Send + Sync>;

pub(crate) struct TreeState<K> {
    pub(crate) tree: CategoryTree,
    pub(crate) entity_key_to_node: AHashMap<K, TermId>,
    pub(crate) node_to_entity_keys: AHashMap<TermId, AHashSet<K>>,
}

impl<K: CatalogKey> TreeState<K> {
    fn new() -> Self {
        Self {
            tree: CategoryTree::new(),
            entity_key_to_node: AHashMap::new(),
            node_to_entity_keys: AHashMap::new(),
        }
    }

    pub(crate) fn link(&mut self, key: K, node: TermId) {
        self.node_to_entity_keys
            .entry(node)
            .or_default()
            .insert(key.clone());
        self.entity_key_to_node.insert(key, node);
    }

    /// Remove `key` from the reverse index, returning the node it was in.
    pub(crate) fn unlink(&mut self, key: &K) -> Option<TermId> {
        let node = self.entity_key_to_node.remove(key)?;
        if let Some(members) = self.node_to_entity_keys.get_mut(&node) {
            members.remove(key);
            if members.is_empty() {
                self.node_to_entity_keys.remove(&node);
            }
        }
        Some(node)
    }

    /// Direct members of every node in `nodes`.
    pub(crate) fn members_of(&self, nodes: &RoaringBitmap) -> Vec<K> {
        nodes
            .iter()
            .filter_map(|raw| self.node_to_entity_keys.get(&TermId::new(raw)))
            .flat_map(|members| members.iter().cloned())
            .collect()
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.entity_key_to_node.clear();
        self.node_to_entity_keys.clear();
    }
}

pub(crate) struct TagState<E, K> {
    pub(crate) tag_to_entity_keys: AHashMap<TermId, AHashSet<K>>,
    pub(crate) entity_to_tag_ids: AHashMap<K, RoaringBitmap>,
    pub(crate) cache: AHashMap<TermId, Vec<Arc<E>>>,
}

impl<E, K: CatalogKey> TagState<E, K> {
    fn new() -> Self {
        Self {
            tag_to_entity_keys: AHashMap::new(),
            entity_to_tag_ids: AHashMap::new(),
            cache: AHashMap::new(),
        }
    }

    /// Link `key` to `tag`. Returns false if it was already linked.
    pub(crate) fn link(&mut self, key: &K, tag: TermId) -> bool {
        let added = self
            .entity_to_tag_ids
            .entry(key.clone())
            .or_default()
            .insert(tag.raw());
        if added {
            self.tag_to_entity_keys
                .entry(tag)
                .or_default()
                .insert(key.clone());
            self.cache.remove(&tag);
        }
        added
    }

    pub(crate) fn unlink(&mut self, key: &K, tag: TermId) -> bool {
        let Some(ids) = self.entity_to_tag_ids.get_mut(key) else {
            return false;
        };
        if !ids.remove(tag.raw()) {
            return false;
        }
        if ids.is_empty() {
            self.entity_to_tag_ids.remove(key);
        }
        self.drop_member(key, tag);
        true
    }

    /// Remove every tag `key` holds. Returns how many were removed.
    pub(crate) fn unlink_all(&mut self, key: &K) -> usize {
        let Some(ids) = self.entity_to_tag_ids.remove(key) else {
            return 0;
        };
        for raw in ids.iter() {
            self.drop_member(key, TermId::new(raw));
        }
        ids.len() as usize
    }

    fn drop_member(&mut self, key: &K, tag: TermId) {
        if let Some(members) = self.tag_to_entity_keys.get_mut(&tag) {
            members.remove(key);
            if members.is_empty() {
                self.tag_to_entity_keys.remove(&tag);
            }
        }
        self.cache.remove(&tag);
    }

    pub(crate) fn invalidate_for(&mut self, key: &K) {
        let Some(ids) = self.entity_to_tag_ids.get(key) else {
            return;
        };
        for raw in ids.iter() {
            self.cache.remove(&TermId::new(raw));
        }
    }

    fn clear(&mut self) {
        self.tag_to_entity_keys.clear();
        self.entity_to_tag_ids.clear();
        self.cache.clear();
    }
}

/// Concurrent categorization and tag index over entities of type `E`, keyed
/// by `K`, each carrying an optional metadata blob `M`.
pub struct CategoryManager<E, K, M = Metadata> {
    config: CatalogConfig,
    key_of: KeyFn<E, K>,
    normalizer: Arc<dyn CategoryNormalizer>,
    stats: Arc<dyn StatisticsCollector>,
    entities: DashMap<K, Arc<E>>,
    category_mapper: IntegerMapper,
    tag_mapper: IntegerMapper,
    regex_cache: RegexCache,
    tree: RwLock<TreeState<K>>,
    tags: RwLock<TagState<E, K>>,
    metadata: RwLock<AHashMap<K, M>>,
}

impl<E, K, M> CategoryManager<E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    /// Manager with the default configuration.
    pub fn new(key_of: impl Fn(&E) -> K + Send + Sync + 'static) -> Self {
        Self::with_config(CatalogConfig::default(), key_of)
    }

    pub fn with_config(
        config: CatalogConfig,
        key_of: impl Fn(&E) -> K + Send + Sync + 'static,
    ) -> Self {
        let normalizer: Arc<dyn CategoryNormalizer> =
            Arc::new(DefaultNormalizer::from_config(&config));
        let stats: Arc<dyn StatisticsCollector> = if config.enable_statistics {
            Arc::new(CountingStatistics::new())
        } else {
            Arc::new(NoopStatistics)
        };
        Self::from_parts(config, Arc::new(key_of), normalizer, stats)
    }

    /// Full control over the injected collaborators.
    pub fn from_parts(
        config: CatalogConfig,
        key_of: KeyFn<E, K>,
        normalizer: Arc<dyn CategoryNormalizer>,
        stats: Arc<dyn StatisticsCollector>,
    ) -> Self {
        Self {
            category_mapper: IntegerMapper::with_max_terms(config.max_term_count),
            tag_mapper: IntegerMapper::with_max_terms(config.max_term_count),
            regex_cache: RegexCache::with_capacity(config.max_cached_patterns),
            config,
            key_of,
            normalizer,
            stats,
            entities: DashMap::new(),
            tree: RwLock::new(TreeState::new()),
            tags: RwLock::new(TagState::new()),
            metadata: RwLock::new(AHashMap::new()),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn key_of(&self, entity: &E) -> K {
        (self.key_of)(entity)
    }

    pub(crate) fn record(&self, event: StatEvent) {
        self.stats.record(event);
    }

    /// Normalize and validate a category path.
    pub(crate) fn checked_path(&self, path: &str) -> crate::Result<String> {
        let normalized = self.normalizer.normalize(path);
        self.normalizer
            .is_valid(&normalized)
            .map_err(crate::CatalogError::InvalidCategory)?;
        Ok(normalized)
    }

    /// Trimmed tag name, rejecting empty ones.
    pub(crate) fn checked_tag(tag: &str) -> crate::Result<&str> {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(crate::CatalogError::InvalidCategory(
                "tag name is empty".to_string(),
            ));
        }
        Ok(trimmed)
    }

    pub(crate) fn resolve(&self, keys: impl IntoIterator<Item = K>) -> Vec<Arc<E>> {
        keys.into_iter()
            .filter_map(|k| self.entities.get(&k).map(|e| Arc::clone(e.value())))
            .collect()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn get_entity(&self, key: &K) -> Option<Arc<E>> {
        self.entities.get(key).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entities.contains_key(key)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn category_count(&self) -> usize {
        self.tree.read().tree.len()
    }

    /// Full path of the category `key` is in.
    pub fn get_entity_category(&self, key: &K) -> Option<String> {
        let tree = self.tree.read();
        let node = tree.entity_key_to_node.get(key)?;
        tree.tree.name_of(*node).map(str::to_string)
    }

    pub fn category_exists(&self, path: &str) -> bool {
        let normalized = self.normalizer.normalize(path);
        self.tree.read().tree.lookup(&normalized).is_some()
    }

    /// Create a category (and its ancestors) without assigning anything to it.
    pub fn create_category(&self, path: &str) -> crate::Result<()> {
        let normalized = self.checked_path(path)?;
        let mut tree = self.tree.write();
        tree.tree.ensure_path(&self.category_mapper, &normalized);
        Ok(())
    }

    /// Every category path, sorted.
    pub fn get_all_categories(&self) -> Vec<String> {
        let tree = self.tree.read();
        let mut out: Vec<String> = tree.tree.names().map(|(_, s)| s.to_string()).collect();
        out.sort();
        out
    }

    /// Direct children of `path`, sorted.
    pub fn get_child_categories(&self, path: &str) -> Vec<String> {
        let normalized = self.normalizer.normalize(path);
        let tree = self.tree.read();
        let Some(node) = tree
            .tree
            .lookup(&normalized)
            .and_then(|id| tree.tree.get(id))
        else {
            return Vec::new();
        };
        let mut out: Vec<String> = node
            .children()
            .filter_map(|c| tree.tree.name_of(c).map(str::to_string))
            .collect();
        out.sort();
        out
    }

    // ========================================================================
    // Cache, statistics, reset
    // ========================================================================

    /// Number of materialized tag results currently cached.
    pub fn cache_size(&self) -> usize {
        self.tags.read().cache.len()
    }

    pub fn clear_cache(&self) {
        self.tags.write().cache.clear();
    }

    pub fn statistics(&self) -> CatalogStatistics {
        let tree = self.tree.read();
        let tags = self.tags.read();
        let metadata = self.metadata.read();
        CatalogStatistics {
            entity_count: self.entities.len(),
            category_count: tree.tree.len(),
            tag_count: tags.tag_to_entity_keys.len(),
            cached_tag_count: tags.cache.len(),
            metadata_count: metadata.len(),
            counters: self.stats.snapshot(),
        }
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /// Drop every entity, category, tag and metadata blob.
    pub fn clear(&self) {
        let mut tree = self.tree.write();
        let mut tags = self.tags.write();
        let mut metadata = self.metadata.write();

        self.entities.clear();
        tree.clear();
        tags.clear();
        metadata.clear();
        self.category_mapper.clear();
        self.tag_mapper.clear();
        self.regex_cache.clear();
        tracing::info!("catalog cleared");
    }
}

impl<E, K, M> fmt::Debug for CategoryManager<E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryManager")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("categories", &self.category_count())
            .finish_non_exhaustive()
    }
}
