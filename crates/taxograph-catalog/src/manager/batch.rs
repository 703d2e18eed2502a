//! Per-item results for batch operations.

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<K> {
    pub key: K,
    pub result: Result<()>,
}

/// Outcome of every item, in input order. Counts are derived from the items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult<K> {
    outcomes: Vec<BatchOutcome<K>>,
}

impl<K> BatchResult<K> {
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, key: K, result: Result<()>) {
        self.outcomes.push(BatchOutcome { key, result });
    }

    pub fn outcomes(&self) -> &[BatchOutcome<K>] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&K, &CatalogError)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.key, e)))
    }
}

impl<K> Default for BatchResult<K> {
    fn default() -> Self {
        Self::new()
    }
}
