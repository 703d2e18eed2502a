//! Deletion, moves, renames and entity replacement.

use ahash::AHashMap;
use std::sync::Arc;

use super::{
    BatchResult, CatalogEntity, CatalogKey, CatalogMetadata, CategoryManager, TagState, TreeState,
};
use crate::error::{CatalogError, Result};
use crate::mapper::TermId;
use crate::stats::StatEvent;

/// What a purge found for one key.
#[derive(Debug, Default, Clone, Copy)]
struct Purged {
    stored: bool,
    linked: bool,
    tags: usize,
    metadata: bool,
}

impl Purged {
    fn found_anything(&self) -> bool {
        self.stored || self.linked || self.tags > 0 || self.metadata
    }
}

impl<E, K, M> CategoryManager<E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    /// Remove every trace of `key`. Caller holds all three locks.
    fn purge_locked(
        &self,
        key: &K,
        tree: &mut TreeState<K>,
        tags: &mut TagState<E, K>,
        metadata: &mut AHashMap<K, M>,
    ) -> Purged {
        let purged = Purged {
            linked: tree.unlink(key).is_some(),
            tags: tags.unlink_all(key),
            metadata: metadata.remove(key).is_some(),
            stored: self.entities.remove(key).is_some(),
        };
        if purged.stored {
            self.record(StatEvent::Deleted);
        } else if purged.found_anything() {
            tracing::warn!(key = ?key, "cleaned up index entries for an entity missing from the store");
        }
        purged
    }

    /// Delete an entity together with its category link, tags and metadata.
    ///
    /// An entity that is already gone from the store but still has index
    /// entries is cleaned up and reported as success.
    pub fn delete_entity(&self, key: &K) -> Result<()> {
        let mut tree = self.tree.write();
        let mut tags = self.tags.write();
        let mut metadata = self.metadata.write();

        let purged = self.purge_locked(key, &mut tree, &mut tags, &mut metadata);
        if !purged.found_anything() {
            return Err(CatalogError::entity_not_found(key));
        }
        Ok(())
    }

    pub fn delete_batch<'k, I>(&self, keys: I) -> BatchResult<K>
    where
        I: IntoIterator<Item = &'k K>,
    {
        let mut out = BatchResult::new();
        for key in keys {
            out.push(key.clone(), self.delete_entity(key));
        }
        out
    }

    /// Delete the entities assigned directly to `path`. Descendants and the
    /// category node itself are kept. Returns the number of entities deleted.
    pub fn delete_category(&self, path: &str) -> Result<usize> {
        let normalized = self.normalizer.normalize(path);
        let mut tree = self.tree.write();
        let Some(node) = tree.tree.lookup(&normalized) else {
            return Err(CatalogError::category_not_found(&normalized));
        };

        let keys: Vec<K> = tree
            .node_to_entity_keys
            .get(&node)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();

        let mut tags = self.tags.write();
        let mut metadata = self.metadata.write();
        let deleted = keys
            .iter()
            .filter(|k| {
                self.purge_locked(k, &mut tree, &mut tags, &mut metadata)
                    .stored
            })
            .count();
        Ok(deleted)
    }

    /// Delete `path`, all of its descendants and every entity in them.
    /// Returns the number of entities deleted.
    pub fn delete_category_recursive(&self, path: &str) -> Result<usize> {
        let normalized = self.normalizer.normalize(path);
        let mut tree = self.tree.write();
        let Some(node) = tree.tree.lookup(&normalized) else {
            return Err(CatalogError::category_not_found(&normalized));
        };

        let nodes: Vec<TermId> = tree.tree.subtree_preorder(node);
        let keys: Vec<K> = nodes
            .iter()
            .filter_map(|n| tree.node_to_entity_keys.get(n))
            .flat_map(|members| members.iter().cloned())
            .collect();

        let mut tags = self.tags.write();
        let mut metadata = self.metadata.write();
        let deleted = keys
            .iter()
            .filter(|k| {
                self.purge_locked(k, &mut tree, &mut tags, &mut metadata)
                    .stored
            })
            .count();

        for n in &nodes {
            tree.node_to_entity_keys.remove(n);
        }
        tree.tree.remove_nodes(&self.category_mapper, &nodes);
        tracing::debug!(
            category = %normalized,
            nodes = nodes.len(),
            entities = deleted,
            "deleted category subtree"
        );
        Ok(deleted)
    }

    /// Reassign `key` to `new_path`. Tags and metadata are untouched.
    pub fn move_entity_to_category(&self, key: &K, new_path: &str) -> Result<()> {
        let normalized = self.checked_path(new_path)?;
        let mut tree = self.tree.write();
        if !self.entities.contains_key(key) {
            return Err(CatalogError::entity_not_found(key));
        }

        let node = tree.tree.ensure_path(&self.category_mapper, &normalized);
        if tree.entity_key_to_node.get(key) == Some(&node) {
            return Ok(());
        }
        tree.unlink(key);
        tree.link(key.clone(), node);
        self.record(StatEvent::Moved);
        Ok(())
    }

    /// Rename a category and its whole subtree. Ids, memberships and tags are
    /// preserved because every index refers to nodes by id.
    pub fn rename_category(&self, old: &str, new: &str) -> Result<()> {
        let old = self.normalizer.normalize(old);
        let new = self.checked_path(new)?;
        let mut tree = self.tree.write();
        let validate = |path: &str| self.normalizer.is_valid(path);
        let renamed = tree
            .tree
            .rename(&self.category_mapper, &old, &new, &validate)?;
        self.record(StatEvent::CategoryRenamed);
        tracing::debug!(from = %old, to = %new, nodes = renamed.len(), "renamed category");
        Ok(())
    }

    /// Replace the stored entity for `key`. Its category, tags and metadata
    /// stay as they are.
    pub fn update_entity(&self, key: &K, entity: E) -> Result<()> {
        if self.key_of(&entity) != *key {
            return Err(CatalogError::InvalidParameter(format!(
                "replacement entity does not carry key {key:?}"
            )));
        }
        let mut tags = self.tags.write();
        match self.entities.get_mut(key) {
            Some(mut slot) => *slot = Arc::new(entity),
            None => return Err(CatalogError::entity_not_found(key)),
        }
        tags.invalidate_for(key);
        Ok(())
    }
}
