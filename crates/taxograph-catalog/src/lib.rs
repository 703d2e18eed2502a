//! Taxograph catalog: concurrent categorization and indexing of keyed entities
//!
//! Entities of any type are stored by key, assigned to exactly one category in
//! a dotted-path forest (`Equipment.Weapon.Sword`), optionally tagged and
//! optionally given a metadata blob. Queries go by exact path, subtree,
//! wildcard, regex, tag (single, AND, OR) or category + tag.
//!
//! Key pieces:
//! 1. **Term interning**: category paths and tag names are mapped to dense
//!    [`TermId`]s by two [`IntegerMapper`]s; every index stores ids only
//! 2. **Category arena**: nodes keyed by id, so renaming a subtree touches the
//!    mapper and the arena and nothing else
//! 3. **Bitmap subtrees**: descendant sets are Roaring bitmaps of node ids
//! 4. **Tag cache**: `get_by_tag` results are memoized per tag and dropped
//!    whenever that tag's membership changes
//!
//! ## Concurrency
//!
//! [`CategoryManager`] is `Send + Sync` and meant to be shared behind an
//! `Arc`. See the [`manager`] module for the lock order.
//!
//! ```
//! use taxograph_catalog::CategoryManager;
//!
//! let catalog: CategoryManager<(u32, &'static str), u32> =
//!     CategoryManager::new(|e: &(u32, &'static str)| e.0);
//! catalog
//!     .register_with(1, (1, "sword"), "Equipment.Weapon.Sword")
//!     .with_tag("melee")
//!     .complete()
//!     .unwrap();
//!
//! assert_eq!(catalog.get_by_category("Equipment", true).len(), 1);
//! assert_eq!(catalog.get_by_tag("melee")[0].1, "sword");
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod node;
pub mod normalize;
pub mod regex_cache;
pub mod snapshot;
pub mod stats;

pub use config::CatalogConfig;
pub use error::{CatalogError, ErrorKind, Result};
pub use manager::{
    BatchOutcome, BatchResult, CatalogEntity, CatalogKey, CatalogMetadata, CategoryManager, KeyFn,
    Metadata, Registration,
};
pub use mapper::{IntegerMapper, MapperError, TermId};
pub use node::{CategoryNode, CategoryTree};
pub use normalize::{CategoryNormalizer, DefaultNormalizer, SEPARATOR};
pub use regex_cache::RegexCache;
pub use snapshot::{
    EntityRecord, LoadFailure, LoadReport, MetadataRecord, SerializableState, StateDecoders,
    StateEncoders, TagRecord,
};
pub use stats::{
    CatalogStatistics, CountingStatistics, NoopStatistics, StatCounters, StatEvent,
    StatisticsCollector,
};
