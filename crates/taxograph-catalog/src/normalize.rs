//! Category path normalization and validation.
//!
//! The catalog only consumes the [`CategoryNormalizer`] trait; callers with
//! their own path rules can plug in a different implementation.

use crate::config::CatalogConfig;

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Default maximum number of segments in a category path.
pub const DEFAULT_MAX_DEPTH: usize = 5;

pub trait CategoryNormalizer: Send + Sync {
    /// Canonical form of `path`. Must be idempotent.
    fn normalize(&self, path: &str) -> String;

    /// Check an already-normalized path, returning the rejection reason.
    fn is_valid(&self, path: &str) -> Result<(), String>;
}

/// Trims the path and every segment; case is preserved.
#[derive(Debug, Clone)]
pub struct DefaultNormalizer {
    max_depth: usize,
}

impl DefaultNormalizer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.max_category_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for DefaultNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl CategoryNormalizer for DefaultNormalizer {
    fn normalize(&self, path: &str) -> String {
        let trimmed = path.trim();
        if !trimmed.contains(SEPARATOR) {
            return trimmed.to_string();
        }
        trimmed
            .split(SEPARATOR)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(&SEPARATOR.to_string())
    }

    fn is_valid(&self, path: &str) -> Result<(), String> {
        if path.trim().is_empty() {
            return Err("category path is empty".to_string());
        }
        let mut depth = 0usize;
        for segment in path.split(SEPARATOR) {
            if segment.trim().is_empty() {
                return Err(format!("category path `{path}` has an empty segment"));
            }
            depth += 1;
        }
        if depth > self.max_depth {
            return Err(format!(
                "category path `{path}` has {depth} segments (max {})",
                self.max_depth
            ));
        }
        Ok(())
    }
}
