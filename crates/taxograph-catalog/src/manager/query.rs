//! Category and tag queries.

use ahash::AHashSet;
use regex::Regex;
use roaring::RoaringBitmap;
use std::sync::Arc;

use super::{CatalogEntity, CatalogKey, CatalogMetadata, CategoryManager};
use crate::error::{CatalogError, Result};
use crate::stats::StatEvent;

const WILDCARD: char = '*';

impl<E, K, M> CategoryManager<E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    /// Entities in the category `pattern`.
    ///
    /// A pattern containing `*` is a wildcard over full category paths
    /// (`Equipment.Weapon.*`). Otherwise it is an exact path. With
    /// `include_children`, members of every descendant category are included.
    pub fn get_by_category(&self, pattern: &str, include_children: bool) -> Vec<Arc<E>> {
        self.record(StatEvent::CategoryQuery);
        let keys = self.category_keys(pattern, include_children);
        self.resolve(keys)
    }

    /// Like [`CategoryManager::get_by_category`] but `pattern` is a regex
    /// matched against full category paths as-is.
    pub fn get_by_category_regex(
        &self,
        pattern: &str,
        include_children: bool,
    ) -> Result<Vec<Arc<E>>> {
        self.record(StatEvent::CategoryQuery);
        let re = self
            .regex_cache
            .get_or_compile(pattern)
            .map_err(|err| CatalogError::InvalidParameter(format!("bad regex `{pattern}`: {err}")))?;
        let keys = self.matching_keys(&re, include_children);
        Ok(self.resolve(keys))
    }

    /// Entities carrying `tag`. Results are memoized per tag until that tag's
    /// membership changes.
    pub fn get_by_tag(&self, tag: &str) -> Vec<Arc<E>> {
        self.record(StatEvent::TagQuery);
        let tag = tag.trim();

        // Ids are only meaningful under the tag lock: `clear` and loads
        // reset the mapper while holding it.
        if !self.config.enable_tag_cache {
            let tags = self.tags.read();
            let Some(id) = self.tag_mapper.try_get_id(tag) else {
                return Vec::new();
            };
            let keys: Vec<K> = tags
                .tag_to_entity_keys
                .get(&id)
                .map(|members| members.iter().cloned().collect())
                .unwrap_or_default();
            return self.resolve(keys);
        }

        {
            let tags = self.tags.read();
            let Some(id) = self.tag_mapper.try_get_id(tag) else {
                return Vec::new();
            };
            if let Some(hit) = tags.cache.get(&id) {
                self.record(StatEvent::TagCacheHit);
                return hit.clone();
            }
        }

        let mut tags = self.tags.write();
        let Some(id) = self.tag_mapper.try_get_id(tag) else {
            return Vec::new();
        };
        if let Some(hit) = tags.cache.get(&id) {
            self.record(StatEvent::TagCacheHit);
            return hit.clone();
        }
        self.record(StatEvent::TagCacheMiss);
        let keys: Vec<K> = tags
            .tag_to_entity_keys
            .get(&id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        let materialized = self.resolve(keys);
        tracing::debug!(tag, entities = materialized.len(), "materialized tag result");
        tags.cache.insert(id, materialized.clone());
        materialized
    }

    /// Entities carrying all (`match_all`) or any of `tags`.
    pub fn get_by_tags<S: AsRef<str>>(&self, tags: &[S], match_all: bool) -> Vec<Arc<E>> {
        self.record(StatEvent::TagQuery);
        let keys = self.tag_keys(tags, match_all);
        self.resolve(keys)
    }

    /// Entities in `category` that also carry `tag`.
    pub fn get_by_category_and_tag(
        &self,
        category: &str,
        tag: &str,
        include_children: bool,
    ) -> Vec<Arc<E>> {
        self.record(StatEvent::CategoryQuery);
        self.record(StatEvent::TagQuery);
        let in_category: AHashSet<K> = self
            .category_keys(category, include_children)
            .into_iter()
            .collect();
        if in_category.is_empty() {
            return Vec::new();
        }
        let tagged = self.tag_keys(&[tag], true);
        self.resolve(tagged.into_iter().filter(|k| in_category.contains(k)))
    }

    fn category_keys(&self, pattern: &str, include_children: bool) -> Vec<K> {
        let trimmed = pattern.trim();
        if trimmed.contains(WILDCARD) {
            let re = self.regex_cache.wildcard(trimmed);
            return self.matching_keys(&re, include_children);
        }

        let normalized = self.normalizer.normalize(trimmed);
        let tree = self.tree.read();
        let Some(node) = tree.tree.lookup(&normalized) else {
            return Vec::new();
        };
        let nodes = if include_children {
            tree.tree.subtree_bitmap(node)
        } else {
            std::iter::once(node.raw()).collect()
        };
        tree.members_of(&nodes)
    }

    fn matching_keys(&self, re: &Regex, include_children: bool) -> Vec<K> {
        let tree = self.tree.read();
        let mut nodes = RoaringBitmap::new();
        for (id, name) in tree.tree.names() {
            if !re.is_match(name) {
                continue;
            }
            if include_children {
                nodes |= tree.tree.subtree_bitmap(id);
            } else {
                nodes.insert(id.raw());
            }
        }
        tree.members_of(&nodes)
    }

    fn tag_keys<S: AsRef<str>>(&self, tags: &[S], match_all: bool) -> Vec<K> {
        if tags.is_empty() {
            return Vec::new();
        }
        let state = self.tags.read();
        let mut acc: Option<AHashSet<K>> = None;

        for tag in tags {
            let members = self
                .tag_mapper
                .try_get_id(tag.as_ref().trim())
                .and_then(|id| state.tag_to_entity_keys.get(&id));

            match (members, match_all) {
                (None, true) => return Vec::new(),
                (None, false) => {}
                (Some(members), true) => match acc.as_mut() {
                    Some(current) => {
                        current.retain(|k| members.contains(k));
                        if current.is_empty() {
                            return Vec::new();
                        }
                    }
                    None => acc = Some(members.clone()),
                },
                (Some(members), false) => {
                    acc.get_or_insert_with(AHashSet::new)
                        .extend(members.iter().cloned());
                }
            }
        }

        acc.map(|set| set.into_iter().collect()).unwrap_or_default()
    }
}
