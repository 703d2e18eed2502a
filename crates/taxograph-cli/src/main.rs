//! Taxograph CLI
//!
//! Command-line access to a catalog built from an inventory file or a
//! snapshot:
//! - Category, wildcard, regex and tag queries
//! - Category renames (written back out as a snapshot)
//! - Statistics and snapshot tooling
//! - A concurrency stress harness for the catalog engine

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use taxograph_catalog::CatalogConfig;
use taxograph_json::{CatalogItem, InventoryCatalog};

mod source;
mod stress;

#[derive(Parser)]
#[command(name = "taxograph")]
#[command(author, version, about = "Taxograph: categorize, tag and query keyed entities")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Catalog configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a catalog by category pattern, regex or tags.
    ///
    /// `--category` accepts an exact path or a `*` wildcard. Several `--tag`
    /// flags are combined with AND unless `--any` is given. A category and
    /// tags together return the intersection.
    Query {
        /// Inventory or snapshot file
        input: PathBuf,
        /// Category path or wildcard pattern
        #[arg(long, conflicts_with = "regex")]
        category: Option<String>,
        /// Regex over full category paths
        #[arg(long)]
        regex: Option<String>,
        /// Tag filter (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Match any tag instead of all of them
        #[arg(long)]
        any: bool,
        /// Include members of descendant categories
        #[arg(short = 'r', long)]
        children: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tags with member counts, or the tags of a single key.
    Tags {
        /// Inventory or snapshot file
        input: PathBuf,
        #[arg(long)]
        key: Option<String>,
    },

    /// Rename a category (and its subtree) and write the result as a snapshot.
    Rename {
        /// Inventory or snapshot file
        input: PathBuf,
        from: String,
        to: String,
        /// Output snapshot
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print catalog statistics.
    Stats {
        /// Inventory or snapshot file
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Snapshot tooling.
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Hammer an in-memory catalog from many threads and check its indexes.
    Stress(stress::StressArgs),
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// Write a snapshot of an inventory or snapshot file.
    Write {
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// Keep categories, keys and tag links only
        #[arg(long)]
        structure_only: bool,
    },

    /// Load a snapshot and summarize it.
    Inspect {
        snapshot: PathBuf,
        /// Inventory used to rehydrate a structure-only snapshot
        #[arg(long)]
        inventory: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Query {
            input,
            category,
            regex,
            tags,
            any,
            children,
            json,
        } => cmd_query(
            &input,
            config,
            category.as_deref(),
            regex.as_deref(),
            &tags,
            !any,
            children,
            json,
        ),
        Commands::Tags { input, key } => cmd_tags(&input, config, key.as_deref()),
        Commands::Rename {
            input,
            from,
            to,
            out,
        } => cmd_rename(&input, config, &from, &to, &out),
        Commands::Stats { input, json } => cmd_stats(&input, config, json),
        Commands::Snapshot { command } => match command {
            SnapshotCommands::Write {
                input,
                out,
                structure_only,
            } => cmd_snapshot_write(&input, config, &out, structure_only),
            SnapshotCommands::Inspect {
                snapshot,
                inventory,
            } => cmd_snapshot_inspect(&snapshot, config, inventory.as_deref()),
        },
        Commands::Stress(args) => stress::run(args, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<CatalogConfig> {
    let Some(path) = path else {
        return Ok(CatalogConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
fn cmd_query(
    input: &Path,
    config: CatalogConfig,
    category: Option<&str>,
    regex: Option<&str>,
    tags: &[String],
    match_all: bool,
    children: bool,
    json: bool,
) -> Result<()> {
    let catalog = source::open(input, config)?;

    let mut hits: Vec<Arc<CatalogItem>> = if let (Some(pattern), [tag]) = (category, tags) {
        catalog.get_by_category_and_tag(pattern, tag, children)
    } else {
        let by_category = match (category, regex) {
            (Some(pattern), _) => Some(catalog.get_by_category(pattern, children)),
            (None, Some(pattern)) => Some(catalog.get_by_category_regex(pattern, children)?),
            (None, None) => None,
        };
        let by_tags = (!tags.is_empty()).then(|| catalog.get_by_tags(tags, match_all));

        match (by_category, by_tags) {
            (Some(in_category), Some(tagged)) => {
                let tagged_keys: HashSet<&str> = tagged.iter().map(|i| i.key.as_str()).collect();
                in_category
                    .into_iter()
                    .filter(|i| tagged_keys.contains(i.key.as_str()))
                    .collect()
            }
            (Some(found), None) | (None, Some(found)) => found,
            (None, None) => anyhow::bail!("give --category, --regex or at least one --tag"),
        }
    };
    hits.sort_by(|a, b| a.key.cmp(&b.key));

    if json {
        let rows: Vec<serde_json::Value> = hits
            .iter()
            .map(|item| {
                serde_json::json!({
                    "key": item.key,
                    "name": item.name,
                    "category": catalog.get_entity_category(&item.key),
                    "tags": catalog.get_entity_tags(&item.key),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for item in &hits {
        print_item(&catalog, item);
    }
    eprintln!("{} {} match(es)", "ok".green().bold(), hits.len());
    Ok(())
}

fn print_item(catalog: &InventoryCatalog, item: &CatalogItem) {
    let category = catalog.get_entity_category(&item.key).unwrap_or_default();
    let tags = catalog.get_entity_tags(&item.key);
    println!(
        "{}  {}  {}  {}",
        item.key.bold(),
        item.name,
        category.cyan(),
        tags.iter()
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(" ")
            .yellow()
    );
}

fn cmd_tags(input: &Path, config: CatalogConfig, key: Option<&str>) -> Result<()> {
    let catalog = source::open(input, config)?;
    if let Some(key) = key {
        let key = key.to_string();
        anyhow::ensure!(catalog.contains(&key), "no entity with key `{key}`");
        for tag in catalog.get_entity_tags(&key) {
            println!("{tag}");
        }
        return Ok(());
    }
    for tag in catalog.get_all_tags() {
        println!("{:>6}  {}", catalog.get_by_tag(&tag).len(), tag.yellow());
    }
    Ok(())
}

fn cmd_rename(
    input: &Path,
    config: CatalogConfig,
    from: &str,
    to: &str,
    out: &Path,
) -> Result<()> {
    let catalog = source::open(input, config)?;
    catalog
        .rename_category(from, to)
        .with_context(|| format!("renaming `{from}` to `{to}`"))?;
    let moved = catalog.get_by_category(to, true).len();
    taxograph_json::write_snapshot(out, &taxograph_json::snapshot_inventory(&catalog, true))?;
    eprintln!(
        "{} {} → {} ({} entities)",
        "renamed".green().bold(),
        from,
        to.bold(),
        moved
    );
    eprintln!("  {} {}", "→".cyan(), out.display());
    Ok(())
}

fn cmd_stats(input: &Path, config: CatalogConfig, json: bool) -> Result<()> {
    let catalog = source::open(input, config)?;
    let stats = catalog.statistics();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("{}", "catalog".bold());
    println!("  entities={}", stats.entity_count);
    println!("  categories={}", stats.category_count);
    println!("  tags={}", stats.tag_count);
    println!("  metadata={}", stats.metadata_count);
    for root in catalog
        .get_all_categories()
        .iter()
        .filter(|c| !c.contains(taxograph_catalog::SEPARATOR))
    {
        println!(
            "  {} {}",
            root.cyan(),
            catalog.get_by_category(root, true).len()
        );
    }
    Ok(())
}

fn cmd_snapshot_write(
    input: &Path,
    config: CatalogConfig,
    out: &Path,
    structure_only: bool,
) -> Result<()> {
    let catalog = source::open(input, config)?;
    let doc = taxograph_json::snapshot_inventory(&catalog, !structure_only);
    taxograph_json::write_snapshot(out, &doc)
        .with_context(|| format!("failed to write {}", out.display()))?;
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(())
}

fn cmd_snapshot_inspect(
    snapshot: &Path,
    config: CatalogConfig,
    inventory: Option<&Path>,
) -> Result<()> {
    let doc = taxograph_json::read_snapshot(snapshot)
        .with_context(|| format!("failed to read {}", snapshot.display()))?;
    let source = inventory
        .map(|path| taxograph_json::read_inventory(path))
        .transpose()
        .context("failed to read inventory")?;

    let catalog = taxograph_json::inventory_catalog(config);
    let report = taxograph_json::restore_inventory(&catalog, &doc, source.as_ref());

    println!("{}", "snapshot".bold());
    println!("  format_version={}", doc.format_version);
    println!("  structure_only={}", doc.state.is_structure_only());
    println!("  categories={}", doc.state.categories.len());
    println!("  entities_loaded={}", report.entities_loaded);
    println!("  tag_links_loaded={}", report.tag_links_loaded);
    println!("  metadata_loaded={}", report.metadata_loaded);
    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            "skipped".yellow().bold(),
            failure.record,
            failure.error
        );
    }
    Ok(())
}
