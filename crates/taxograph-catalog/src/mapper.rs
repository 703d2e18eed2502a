//! Bidirectional string ↔ integer interning.
//!
//! The catalog keeps two independent mappers: one for full category paths and
//! one for tag names. Every other index refers to terms by [`TermId`], so a
//! rename only has to touch the mapper.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default ceiling on the number of ids a single mapper hands out.
pub const DEFAULT_MAX_TERMS: u32 = 1 << 24;

/// Interned term id (category path or tag name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TermId(u32);

impl TermId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapperError {
    #[error("unknown term `{0}`")]
    UnknownTerm(String),

    #[error("term `{0}` is already mapped")]
    Conflict(String),

    #[error("term id space exhausted ({limit} ids)")]
    Overflow { limit: u32 },
}

#[derive(Debug, Default)]
struct MapperInner {
    str_to_id: AHashMap<String, TermId>,
    id_to_str: AHashMap<TermId, String>,
    next_id: u32,
}

/// Thread-safe string ↔ [`TermId`] bijection.
///
/// Ids are assigned monotonically. Released terms never give their id back;
/// only [`IntegerMapper::clear`] resets the counter (together with both maps).
#[derive(Debug)]
pub struct IntegerMapper {
    inner: RwLock<MapperInner>,
    max_terms: u32,
}

impl IntegerMapper {
    pub fn new() -> Self {
        Self::with_max_terms(DEFAULT_MAX_TERMS)
    }

    pub fn with_max_terms(max_terms: u32) -> Self {
        Self {
            inner: RwLock::new(MapperInner::default()),
            max_terms,
        }
    }

    pub fn max_terms(&self) -> u32 {
        self.max_terms
    }

    /// Return the id for `term`, assigning a fresh one if needed.
    ///
    /// Panics when the id ceiling is hit: runaway term growth is a caller bug.
    pub fn get_or_assign_id(&self, term: &str) -> TermId {
        match self.try_get_or_assign_id(term) {
            Ok(id) => id,
            Err(err) => panic!("IntegerMapper: {err}"),
        }
    }

    /// Fallible variant of [`IntegerMapper::get_or_assign_id`].
    pub fn try_get_or_assign_id(&self, term: &str) -> Result<TermId, MapperError> {
        if let Some(id) = self.inner.read().str_to_id.get(term) {
            return Ok(*id);
        }

        let mut inner = self.inner.write();
        // Another writer may have assigned it between the two locks.
        if let Some(id) = inner.str_to_id.get(term) {
            return Ok(*id);
        }
        if inner.next_id >= self.max_terms {
            return Err(MapperError::Overflow {
                limit: self.max_terms,
            });
        }

        let id = TermId(inner.next_id);
        inner.next_id += 1;
        inner.str_to_id.insert(term.to_string(), id);
        inner.id_to_str.insert(id, term.to_string());
        Ok(id)
    }

    pub fn try_get_id(&self, term: &str) -> Option<TermId> {
        self.inner.read().str_to_id.get(term).copied()
    }

    pub fn try_get_string(&self, id: TermId) -> Option<String> {
        self.inner.read().id_to_str.get(&id).cloned()
    }

    /// Rename `old` to `new`, keeping its id.
    pub fn remap_term(&self, old: &str, new: &str) -> Result<TermId, MapperError> {
        let mut inner = self.inner.write();
        if inner.str_to_id.contains_key(new) {
            return Err(MapperError::Conflict(new.to_string()));
        }
        let Some(id) = inner.str_to_id.remove(old) else {
            return Err(MapperError::UnknownTerm(old.to_string()));
        };
        inner.str_to_id.insert(new.to_string(), id);
        inner.id_to_str.insert(id, new.to_string());
        Ok(id)
    }

    /// Forget `term`. Its id is retired, never handed out again.
    pub fn release_term(&self, term: &str) -> Option<TermId> {
        let mut inner = self.inner.write();
        let id = inner.str_to_id.remove(term)?;
        inner.id_to_str.remove(&id);
        Some(id)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.str_to_id.clear();
        inner.id_to_str.clear();
        inner.next_id = 0;
    }

    /// Take over `other`'s terms and id counter, discarding our own.
    pub(crate) fn absorb(&self, other: IntegerMapper) {
        *self.inner.write() = other.inner.into_inner();
    }

    pub fn count(&self) -> usize {
        self.inner.read().str_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Ordered copy of the `id -> term` table.
    pub fn get_snapshot(&self) -> BTreeMap<TermId, String> {
        self.inner
            .read()
            .id_to_str
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect()
    }
}

impl Default for IntegerMapper {
    fn default() -> Self {
        Self::new()
    }
}
