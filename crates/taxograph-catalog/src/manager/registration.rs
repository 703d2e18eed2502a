//! Entity registration.

use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use super::{BatchResult, CatalogEntity, CatalogKey, CatalogMetadata, CategoryManager};
use crate::error::{CatalogError, Result};
use crate::stats::StatEvent;

/// Pending registration. Nothing touches shared state until [`Registration::complete`].
#[must_use = "a registration does nothing until `complete()` is called"]
pub struct Registration<'a, E, K, M> {
    manager: &'a CategoryManager<E, K, M>,
    key: K,
    entity: E,
    category: String,
    tags: Vec<String>,
    metadata: Option<M>,
}

impl<'a, E, K, M> Registration<'a, E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_metadata(mut self, metadata: M) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Commit the entity, its category link, tags and metadata in one
    /// critical section.
    pub fn complete(self) -> Result<()> {
        let manager = self.manager;
        let result = manager.commit_registration(self);
        manager.record(if result.is_ok() {
            StatEvent::Registered
        } else {
            StatEvent::RegistrationFailed
        });
        result
    }
}

impl<E, K, M> CategoryManager<E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    /// Start a registration that can carry tags and metadata.
    pub fn register_with(
        &self,
        key: K,
        entity: E,
        category: impl Into<String>,
    ) -> Registration<'_, E, K, M> {
        Registration {
            manager: self,
            key,
            entity,
            category: category.into(),
            tags: Vec::new(),
            metadata: None,
        }
    }

    /// Register `entity` under `category`.
    ///
    /// Fails with `DuplicateId` if `key` is taken, `InvalidCategory` if the
    /// path is rejected and `InvalidParameter` if `key` is not the entity's
    /// own key. A failed registration leaves the catalog untouched.
    pub fn register_entity(&self, key: K, entity: E, category: &str) -> Result<()> {
        self.register_with(key, entity, category).complete()
    }

    /// Register `entity` under its derived key.
    pub fn register(&self, entity: E, category: &str) -> Result<()> {
        let key = self.key_of(&entity);
        self.register_entity(key, entity, category)
    }

    /// Register every item, recording each outcome. Never stops early.
    pub fn register_batch<I, S>(&self, items: I) -> BatchResult<K>
    where
        I: IntoIterator<Item = (K, E, S)>,
        S: AsRef<str>,
    {
        let mut out = BatchResult::new();
        for (key, entity, category) in items {
            let result = self.register_entity(key.clone(), entity, category.as_ref());
            out.push(key, result);
        }
        out
    }

    fn commit_registration(&self, reg: Registration<'_, E, K, M>) -> Result<()> {
        let Registration {
            key,
            entity,
            category,
            tags,
            metadata,
            ..
        } = reg;

        // Validate everything before taking any lock.
        let path = self.checked_path(&category)?;
        if self.key_of(&entity) != key {
            return Err(CatalogError::InvalidParameter(format!(
                "key {key:?} does not match the entity's own key"
            )));
        }
        let tags: Vec<&str> = tags
            .iter()
            .map(|t| Self::checked_tag(t))
            .collect::<Result<_>>()?;

        let mut tree = self.tree.write();
        match self.entities.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(CatalogError::DuplicateId(format!("entity {key:?}")));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(entity));
            }
        }

        let node = tree.tree.ensure_path(&self.category_mapper, &path);
        if let Some(stale) = tree.unlink(&key) {
            tracing::warn!(key = ?key, node = stale.raw(), "dropped stale category link on register");
        }
        tree.link(key.clone(), node);

        // A fresh key starts with no tags and no metadata.
        let mut tag_state = self.tags.write();
        if tag_state.unlink_all(&key) > 0 {
            tracing::warn!(key = ?key, "dropped stale tags on register");
        }
        for tag in tags {
            let id = self.tag_mapper.get_or_assign_id(tag);
            if tag_state.link(&key, id) {
                self.record(StatEvent::TagAdded);
            }
        }

        let mut meta = self.metadata.write();
        match metadata {
            Some(m) => {
                meta.insert(key, m);
            }
            None => {
                meta.remove(&key);
            }
        }
        Ok(())
    }
}
