//! Optional instrumentation.
//!
//! The catalog always talks to a [`StatisticsCollector`]; whether anything is
//! counted is decided at construction (`CatalogConfig::enable_statistics`).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatEvent {
    Registered,
    RegistrationFailed,
    Deleted,
    Moved,
    CategoryQuery,
    TagQuery,
    TagCacheHit,
    TagCacheMiss,
    TagAdded,
    TagRemoved,
    CategoryRenamed,
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCounters {
    pub registrations: u64,
    pub failed_registrations: u64,
    pub deletions: u64,
    pub moves: u64,
    pub category_queries: u64,
    pub tag_queries: u64,
    pub tag_cache_hits: u64,
    pub tag_cache_misses: u64,
    pub tags_added: u64,
    pub tags_removed: u64,
    pub categories_renamed: u64,
}

pub trait StatisticsCollector: Send + Sync {
    fn record(&self, event: StatEvent);

    fn snapshot(&self) -> StatCounters;

    fn reset(&self) {}
}

#[derive(Debug, Default)]
pub struct NoopStatistics;

impl StatisticsCollector for NoopStatistics {
    fn record(&self, _event: StatEvent) {}

    fn snapshot(&self) -> StatCounters {
        StatCounters::default()
    }
}

#[derive(Debug, Default)]
pub struct CountingStatistics {
    registrations: AtomicU64,
    failed_registrations: AtomicU64,
    deletions: AtomicU64,
    moves: AtomicU64,
    category_queries: AtomicU64,
    tag_queries: AtomicU64,
    tag_cache_hits: AtomicU64,
    tag_cache_misses: AtomicU64,
    tags_added: AtomicU64,
    tags_removed: AtomicU64,
    categories_renamed: AtomicU64,
}

impl CountingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, event: StatEvent) -> &AtomicU64 {
        match event {
            StatEvent::Registered => &self.registrations,
            StatEvent::RegistrationFailed => &self.failed_registrations,
            StatEvent::Deleted => &self.deletions,
            StatEvent::Moved => &self.moves,
            StatEvent::CategoryQuery => &self.category_queries,
            StatEvent::TagQuery => &self.tag_queries,
            StatEvent::TagCacheHit => &self.tag_cache_hits,
            StatEvent::TagCacheMiss => &self.tag_cache_misses,
            StatEvent::TagAdded => &self.tags_added,
            StatEvent::TagRemoved => &self.tags_removed,
            StatEvent::CategoryRenamed => &self.categories_renamed,
        }
    }
}

impl StatisticsCollector for CountingStatistics {
    fn record(&self, event: StatEvent) {
        self.counter(event).fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatCounters {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatCounters {
            registrations: load(&self.registrations),
            failed_registrations: load(&self.failed_registrations),
            deletions: load(&self.deletions),
            moves: load(&self.moves),
            category_queries: load(&self.category_queries),
            tag_queries: load(&self.tag_queries),
            tag_cache_hits: load(&self.tag_cache_hits),
            tag_cache_misses: load(&self.tag_cache_misses),
            tags_added: load(&self.tags_added),
            tags_removed: load(&self.tags_removed),
            categories_renamed: load(&self.categories_renamed),
        }
    }

    fn reset(&self) {
        for c in [
            &self.registrations,
            &self.failed_registrations,
            &self.deletions,
            &self.moves,
            &self.category_queries,
            &self.tag_queries,
            &self.tag_cache_hits,
            &self.tag_cache_misses,
            &self.tags_added,
            &self.tags_removed,
            &self.categories_renamed,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// Structural sizes plus collector counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub entity_count: usize,
    pub category_count: usize,
    pub tag_count: usize,
    pub cached_tag_count: usize,
    pub metadata_count: usize,
    pub counters: StatCounters,
}
