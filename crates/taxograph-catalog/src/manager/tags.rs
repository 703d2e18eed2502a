//! Tag membership and per-entity metadata.
//!
//! Every membership change drops the affected tag's cached result inside the
//! same critical section that made the change.

use super::{BatchResult, CatalogEntity, CatalogKey, CatalogMetadata, CategoryManager};
use crate::error::{CatalogError, Result};
use crate::mapper::TermId;
use crate::stats::StatEvent;

impl<E, K, M> CategoryManager<E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    /// Tag `key`. Adding a tag the entity already has is a no-op.
    pub fn add_tag(&self, key: &K, tag: &str) -> Result<()> {
        self.add_tags(key, &[tag])
    }

    /// Tag `key` with every tag in `tags`. All names are validated first; on
    /// error nothing is added.
    pub fn add_tags<S: AsRef<str>>(&self, key: &K, tags: &[S]) -> Result<()> {
        let names: Vec<&str> = tags
            .iter()
            .map(|t| Self::checked_tag(t.as_ref()))
            .collect::<Result<_>>()?;

        let mut state = self.tags.write();
        if !self.entities.contains_key(key) {
            return Err(CatalogError::entity_not_found(key));
        }
        for name in names {
            let id = self.tag_mapper.get_or_assign_id(name);
            if state.link(key, id) {
                self.record(StatEvent::TagAdded);
            }
        }
        Ok(())
    }

    /// Tag every key in `keys` with `tag`, recording each outcome.
    pub fn add_tag_batch<'k, I>(&self, keys: I, tag: &str) -> BatchResult<K>
    where
        I: IntoIterator<Item = &'k K>,
    {
        let mut out = BatchResult::new();
        for key in keys {
            out.push(key.clone(), self.add_tag(key, tag));
        }
        out
    }

    /// Returns whether the tag was present.
    pub fn remove_tag(&self, key: &K, tag: &str) -> Result<bool> {
        let name = Self::checked_tag(tag)?;
        let mut state = self.tags.write();
        if !self.entities.contains_key(key) {
            return Err(CatalogError::entity_not_found(key));
        }
        let Some(id) = self.tag_mapper.try_get_id(name) else {
            return Ok(false);
        };
        let removed = state.unlink(key, id);
        if removed {
            self.record(StatEvent::TagRemoved);
        }
        Ok(removed)
    }

    /// Drop every tag from `key`. Returns how many were removed.
    pub fn remove_all_tags(&self, key: &K) -> Result<usize> {
        let mut state = self.tags.write();
        if !self.entities.contains_key(key) {
            return Err(CatalogError::entity_not_found(key));
        }
        Ok(state.unlink_all(key))
    }

    pub fn has_tag(&self, key: &K, tag: &str) -> bool {
        let state = self.tags.read();
        let Some(id) = self.tag_mapper.try_get_id(tag.trim()) else {
            return false;
        };
        state
            .entity_to_tag_ids
            .get(key)
            .map_or(false, |ids| ids.contains(id.raw()))
    }

    /// Tag names held by `key`, sorted.
    pub fn get_entity_tags(&self, key: &K) -> Vec<String> {
        let state = self.tags.read();
        let Some(ids) = state.entity_to_tag_ids.get(key) else {
            return Vec::new();
        };
        let mut out: Vec<String> = ids
            .iter()
            .filter_map(|raw| self.tag_mapper.try_get_string(TermId::new(raw)))
            .collect();
        out.sort();
        out
    }

    /// Every tag with at least one member, sorted.
    pub fn get_all_tags(&self) -> Vec<String> {
        let state = self.tags.read();
        let mut out: Vec<String> = state
            .tag_to_entity_keys
            .keys()
            .filter_map(|id| self.tag_mapper.try_get_string(*id))
            .collect();
        out.sort();
        out
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn get_metadata(&self, key: &K) -> Option<M> {
        self.metadata.read().get(key).cloned()
    }

    /// Replace `key`'s metadata wholesale.
    pub fn update_metadata(&self, key: &K, metadata: M) -> Result<()> {
        let mut store = self.metadata.write();
        if !self.entities.contains_key(key) {
            return Err(CatalogError::entity_not_found(key));
        }
        store.insert(key.clone(), metadata);
        Ok(())
    }

    /// Returns whether `key` had metadata.
    pub fn delete_metadata(&self, key: &K) -> Result<bool> {
        let mut store = self.metadata.write();
        if !self.entities.contains_key(key) {
            return Err(CatalogError::entity_not_found(key));
        }
        Ok(store.remove(key).is_some())
    }
}
