//! Concurrency stress harness for the catalog.
//!
//! Worker threads run a seeded mix of registrations, tag edits, moves,
//! deletes and queries over a shared key range. The run has a wall-clock
//! budget; overrunning it is reported as a probable deadlock. Afterwards the
//! catalog's indexes are cross-checked.
//!
//! ```bash
//! cargo run -p taxograph-cli --release -- stress --threads 16 --ops 200000 --keys 64
//! ```

use anyhow::{anyhow, ensure, Result};
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use taxograph_catalog::{CatalogConfig, CategoryManager, ErrorKind, Metadata};

const CATEGORIES: [&str; 6] = [
    "World.North",
    "World.North.Cave",
    "World.South",
    "World.South.Ruins.Vault",
    "World.East",
    "World.West.Harbor",
];
const TAGS: [&str; 5] = ["loot", "quest", "rare", "cursed", "hidden"];

#[derive(Args, Debug, Clone)]
pub struct StressArgs {
    /// Worker threads
    #[arg(long, default_value_t = 8)]
    pub threads: usize,

    /// Operations per worker
    #[arg(long, default_value_t = 50_000)]
    pub ops: usize,

    /// Size of the shared key range
    #[arg(long, default_value_t = 32)]
    pub keys: u64,

    /// RNG seed (deterministic per worker)
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Wall-clock budget in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
}

type Catalog = CategoryManager<u64, u64>;

/// splitmix64; every seed, zero included, gives a full-period stream.
#[derive(Debug, Clone)]
pub(crate) struct SplitMix64(u64);

impl SplitMix64 {
    pub(crate) fn seeded(seed: u64) -> Self {
        Self(seed)
    }

    pub(crate) fn draw(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform-ish index in `0..n`; 0 when `n` is 0.
    pub(crate) fn below(&mut self, n: usize) -> usize {
        match n {
            0 => 0,
            n => (self.draw() % n as u64) as usize,
        }
    }
}

/// Outcome counts for one worker, merged afterwards.
#[derive(Debug, Default)]
struct WorkerTally {
    ok: u64,
    by_kind: BTreeMap<String, u64>,
    /// Errors other than the NotFound/DuplicateId races
    unexpected: u64,
}

impl WorkerTally {
    fn record<T>(&mut self, result: taxograph_catalog::Result<T>) {
        match result {
            Ok(_) => self.ok += 1,
            Err(err) => {
                let kind = err.kind();
                if !matches!(kind, ErrorKind::NotFound | ErrorKind::DuplicateId) {
                    self.unexpected += 1;
                }
                *self.by_kind.entry(format!("{kind:?}")).or_default() += 1;
            }
        }
    }

    fn merge(&mut self, other: WorkerTally) {
        self.ok += other.ok;
        self.unexpected += other.unexpected;
        for (kind, n) in other.by_kind {
            *self.by_kind.entry(kind).or_default() += n;
        }
    }
}

fn worker(catalog: &Catalog, mut rng: SplitMix64, ops: usize, keys: u64) -> WorkerTally {
    let mut tally = WorkerTally::default();
    for _ in 0..ops {
        let key = rng.draw() % keys.max(1);
        let category = CATEGORIES[rng.below(CATEGORIES.len())];
        let tag = TAGS[rng.below(TAGS.len())];

        match rng.below(12) {
            0 | 1 => tally.record(catalog.register(key, category)),
            2 => {
                let mut meta = Metadata::new();
                meta.insert("origin".to_string(), "stress".to_string());
                tally.record(
                    catalog
                        .register_with(key, key, category)
                        .with_tags([tag])
                        .with_metadata(meta)
                        .complete(),
                );
            }
            3 | 4 => tally.record(catalog.add_tag(&key, tag)),
            5 => tally.record(catalog.remove_tag(&key, tag)),
            6 | 7 => tally.record(catalog.move_entity_to_category(&key, category)),
            8 => tally.record(catalog.delete_entity(&key)),
            9 => {
                catalog.get_by_tags(&[tag, TAGS[0]], rng.draw() % 2 == 0);
                tally.ok += 1;
            }
            10 => {
                catalog.get_by_category("World.*", true);
                tally.ok += 1;
            }
            _ => {
                catalog.get_by_tag(tag);
                tally.ok += 1;
            }
        }
    }
    tally
}

/// Cross-check the forward and reverse indexes once all writers are done.
fn check_consistency(catalog: &Catalog, keys: u64) -> Result<()> {
    let in_tree = catalog.get_by_category("World", true).len();
    ensure!(
        in_tree == catalog.entity_count(),
        "tree holds {in_tree} entities, store holds {}",
        catalog.entity_count()
    );
    for key in 0..keys {
        let stored = catalog.contains(&key);
        ensure!(
            stored == catalog.get_entity_category(&key).is_some(),
            "key {key}: store and category index disagree"
        );
        if !stored {
            ensure!(
                catalog.get_entity_tags(&key).is_empty(),
                "key {key}: tags survived deletion"
            );
            ensure!(
                catalog.get_metadata(&key).is_none(),
                "key {key}: metadata survived deletion"
            );
        }
    }
    Ok(())
}

pub fn run(args: StressArgs, config: CatalogConfig) -> Result<()> {
    ensure!(args.threads > 0, "--threads must be > 0");
    ensure!(args.keys > 0, "--keys must be > 0");

    println!("stress/catalog");
    println!(
        "  threads={} ops={} keys={} seed={} timeout={}s",
        args.threads, args.ops, args.keys, args.seed, args.timeout_secs
    );

    let catalog: Arc<Catalog> =
        Arc::new(CategoryManager::with_config(config.with_statistics(true), |e: &u64| *e));

    let (tx, rx) = mpsc::channel();
    let start = Instant::now();
    for i in 0..args.threads {
        let catalog = Arc::clone(&catalog);
        let tx = tx.clone();
        let rng = SplitMix64::seeded(args.seed ^ (i as u64).rotate_left(32));
        let (ops, keys) = (args.ops, args.keys);
        thread::spawn(move || {
            let tally = worker(&catalog, rng, ops, keys);
            let _ = tx.send(tally);
        });
    }
    drop(tx);

    let deadline = start + Duration::from_secs(args.timeout_secs);
    let mut total = WorkerTally::default();
    for finished in 0..args.threads {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(tally) => total.merge(tally),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(anyhow!(
                    "{}/{} workers still running after {}s: probable deadlock",
                    args.threads - finished,
                    args.threads,
                    args.timeout_secs
                ));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("a worker panicked"));
            }
        }
    }
    let elapsed = start.elapsed();

    check_consistency(&catalog, args.keys)?;

    let total_ops = args.threads * args.ops;
    println!("  elapsed={:?} ({:.1} ops/sec)", elapsed, rate(total_ops, elapsed));
    println!("  ok={}", total.ok);
    for (kind, n) in &total.by_kind {
        println!("  {kind}={n}");
    }
    let stats = catalog.statistics();
    println!(
        "  final: entities={} categories={} tags={} cache_hits={} cache_misses={}",
        stats.entity_count,
        stats.category_count,
        stats.tag_count,
        stats.counters.tag_cache_hits,
        stats.counters.tag_cache_misses
    );

    ensure!(
        total.unexpected == 0,
        "{} unexpected errors",
        total.unexpected
    );
    println!("{} indexes consistent", "ok".green().bold());
    Ok(())
}

fn rate(items: usize, dt: Duration) -> f64 {
    let secs = dt.as_secs_f64();
    if secs == 0.0 {
        0.0
    } else {
        items as f64 / secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_streams_are_reproducible_and_bounded() {
        let mut a = SplitMix64::seeded(42);
        let mut b = SplitMix64::seeded(42);
        for _ in 0..100 {
            let n = a.below(7);
            assert_eq!(n, b.below(7));
            assert!(n < 7);
        }
        assert_ne!(SplitMix64::seeded(1).draw(), SplitMix64::seeded(2).draw());
        assert_eq!(SplitMix64::seeded(0).below(0), 0);
    }

    #[test]
    fn small_run_is_consistent() {
        let args = StressArgs {
            threads: 4,
            ops: 2_000,
            keys: 8,
            seed: 7,
            timeout_secs: 60,
        };
        run(args, CatalogConfig::default()).unwrap();
    }
}
