//! Snapshot export and restore.

use std::sync::Arc;

use super::{CatalogEntity, CatalogKey, CatalogMetadata, CategoryManager};
use crate::error::CatalogError;
use crate::snapshot::{
    EntityRecord, LoadReport, MetadataRecord, SerializableState, StateDecoders, StateEncoders,
    TagRecord,
};
use crate::stats::NoopStatistics;

impl<E, K, M> CategoryManager<E, K, M>
where
    E: CatalogEntity,
    K: CatalogKey,
    M: CatalogMetadata,
{
    /// Export the catalog through caller-supplied encoders.
    ///
    /// Without an entity (or metadata) encoder the snapshot carries
    /// structure only: categories, entity keys and tag memberships.
    pub fn get_serializable_state(
        &self,
        encoders: &StateEncoders<'_, E, K, M>,
    ) -> SerializableState {
        let tree = self.tree.read();
        let tags = self.tags.read();
        let metadata = self.metadata.read();

        let mut categories: Vec<String> =
            tree.tree.names().map(|(_, name)| name.to_string()).collect();
        categories.sort();

        let mut entities: Vec<EntityRecord> = tree
            .entity_key_to_node
            .iter()
            .filter_map(|(key, node)| {
                let Some(entity) = self.get_entity(key) else {
                    tracing::warn!(key = ?key, "indexed entity missing from store, not snapshotted");
                    return None;
                };
                Some(EntityRecord {
                    key: (encoders.key)(key),
                    entity: encoders.entity.map(|encode| encode(entity.as_ref())),
                    category: tree.tree.name_of(*node)?.to_string(),
                })
            })
            .collect();
        entities.sort_by(|a, b| a.key.cmp(&b.key));

        let mut tag_records: Vec<TagRecord> = tags
            .tag_to_entity_keys
            .iter()
            .filter_map(|(id, members)| {
                let tag = self.tag_mapper.try_get_string(*id)?;
                let mut keys: Vec<String> = members.iter().map(|k| (encoders.key)(k)).collect();
                keys.sort();
                Some(TagRecord { tag, keys })
            })
            .collect();
        tag_records.sort_by(|a, b| a.tag.cmp(&b.tag));

        let mut metadata_records: Vec<MetadataRecord> = match encoders.metadata {
            Some(encode) => metadata
                .iter()
                .map(|(key, m)| MetadataRecord {
                    key: (encoders.key)(key),
                    metadata: encode(m),
                })
                .collect(),
            None => Vec::new(),
        };
        metadata_records.sort_by(|a, b| a.key.cmp(&b.key));

        SerializableState {
            categories,
            entities,
            tags: tag_records,
            metadata: metadata_records,
        }
    }

    /// Replace the catalog's contents with `state`.
    ///
    /// A fresh catalog is built from the snapshot first; records that fail to
    /// decode or register are skipped and listed in the report. The fresh
    /// catalog is then swapped in under all three write locks.
    pub fn load_serializable_state(
        &self,
        state: &SerializableState,
        decoders: &StateDecoders<'_, E, K, M>,
    ) -> LoadReport {
        let fresh = Self::from_parts(
            self.config.clone(),
            Arc::clone(&self.key_of),
            Arc::clone(&self.normalizer),
            Arc::new(NoopStatistics),
        );
        let mut report = LoadReport::default();

        for path in &state.categories {
            if let Err(err) = fresh.create_category(path) {
                report.fail(format!("category `{path}`"), err);
            }
        }

        for record in &state.entities {
            let Some(key) = (decoders.key)(&record.key) else {
                report.fail(record.key.clone(), undecodable("key", &record.key));
                continue;
            };
            let Some(entity) = (decoders.entity)(&key, record.entity.as_deref()) else {
                report.fail(record.key.clone(), undecodable("entity", &record.key));
                continue;
            };
            match fresh.register_entity(key, entity, &record.category) {
                Ok(()) => report.entities_loaded += 1,
                Err(err) => report.fail(record.key.clone(), err),
            }
        }

        for record in &state.tags {
            for encoded in &record.keys {
                let Some(key) = (decoders.key)(encoded) else {
                    report.fail(encoded.clone(), undecodable("key", encoded));
                    continue;
                };
                match fresh.add_tag(&key, &record.tag) {
                    Ok(()) => report.tag_links_loaded += 1,
                    Err(err) => report.fail(format!("{encoded} #{}", record.tag), err),
                }
            }
        }

        if let Some(decode_metadata) = decoders.metadata {
            for record in &state.metadata {
                let decoded = (decoders.key)(&record.key)
                    .and_then(|key| decode_metadata(&record.metadata).map(|m| (key, m)));
                let Some((key, m)) = decoded else {
                    report.fail(record.key.clone(), undecodable("metadata", &record.key));
                    continue;
                };
                match fresh.update_metadata(&key, m) {
                    Ok(()) => report.metadata_loaded += 1,
                    Err(err) => report.fail(record.key.clone(), err),
                }
            }
        }

        self.replace_with(fresh);
        tracing::info!(
            entities = report.entities_loaded,
            tag_links = report.tag_links_loaded,
            metadata = report.metadata_loaded,
            failures = report.failures.len(),
            "loaded catalog state"
        );
        report
    }

    fn replace_with(&self, fresh: Self) {
        let CategoryManager {
            entities,
            category_mapper,
            tag_mapper,
            tree: fresh_tree,
            tags: fresh_tags,
            metadata: fresh_metadata,
            ..
        } = fresh;

        let mut tree = self.tree.write();
        let mut tags = self.tags.write();
        let mut metadata = self.metadata.write();

        self.entities.clear();
        for (key, entity) in entities {
            self.entities.insert(key, entity);
        }
        *tree = fresh_tree.into_inner();
        *tags = fresh_tags.into_inner();
        *metadata = fresh_metadata.into_inner();
        self.category_mapper.absorb(category_mapper);
        self.tag_mapper.absorb(tag_mapper);
        self.regex_cache.clear();
    }
}

fn undecodable(what: &str, record: &str) -> CatalogError {
    CatalogError::InvalidParameter(format!("could not decode {what} for `{record}`"))
}
