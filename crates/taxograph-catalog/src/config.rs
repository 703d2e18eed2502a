//! Catalog configuration.

use serde::{Deserialize, Serialize};

use crate::mapper::DEFAULT_MAX_TERMS;
use crate::normalize::DEFAULT_MAX_DEPTH;
use crate::regex_cache::DEFAULT_PATTERN_CAPACITY;

/// Construction-time settings for a [`crate::CategoryManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Maximum number of segments in a category path
    pub max_category_depth: usize,
    /// Id ceiling for each of the category and tag mappers
    pub max_term_count: u32,
    /// Count registrations, queries, cache hits, ...
    pub enable_statistics: bool,
    /// Memoize `get_by_tag` results
    pub enable_tag_cache: bool,
    /// Compiled query patterns kept by the regex cache
    pub max_cached_patterns: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_category_depth: DEFAULT_MAX_DEPTH,
            max_term_count: DEFAULT_MAX_TERMS,
            enable_statistics: false,
            enable_tag_cache: true,
            max_cached_patterns: DEFAULT_PATTERN_CAPACITY,
        }
    }
}

impl CatalogConfig {
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.enable_statistics = enabled;
        self
    }

    pub fn with_max_category_depth(mut self, depth: usize) -> Self {
        self.max_category_depth = depth;
        self
    }
}
