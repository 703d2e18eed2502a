//! Error taxonomy for catalog operations.
//!
//! Every expected failure is carried in a `Result`. Misuse (id overflow in a
//! mapper, broken internal invariants) panics instead.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

/// Fieldless discriminant of [`CatalogError`], handy for batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    DuplicateId,
    InvalidCategory,
    InvalidParameter,
    ConcurrencyConflict,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateId(_) => ErrorKind::DuplicateId,
            Self::InvalidCategory(_) => ErrorKind::InvalidCategory,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
        }
    }

    pub(crate) fn entity_not_found(key: &impl std::fmt::Debug) -> Self {
        Self::NotFound(format!("entity {key:?}"))
    }

    pub(crate) fn category_not_found(path: &str) -> Self {
        Self::NotFound(format!("category `{path}`"))
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
