//! CategoryManager end-to-end tests

use std::collections::BTreeSet;
use std::sync::Arc;

use taxograph_catalog::*;

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: u64,
    name: String,
}

fn item(id: u64, name: &str) -> Item {
    Item {
        id,
        name: name.to_string(),
    }
}

fn catalog() -> CategoryManager<Item, u64> {
    CategoryManager::new(|i: &Item| i.id)
}

fn names(items: Vec<Arc<Item>>) -> BTreeSet<String> {
    items.iter().map(|i| i.name.clone()).collect()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Sword, bow and club under `Equipment.Weapon`, a helmet under `Equipment.Armor`.
fn armory() -> CategoryManager<Item, u64> {
    let m = catalog();
    m.register(item(1, "sword"), "Equipment.Weapon.Sword").unwrap();
    m.register(item(2, "bow"), "Equipment.Weapon.Bow").unwrap();
    m.register(item(3, "helmet"), "Equipment.Armor.Helmet")
        .unwrap();
    m.register(item(4, "club"), "Equipment.Weapon").unwrap();
    m
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_duplicate_registration_keeps_first() {
    let m = catalog();
    m.register(item(1, "first"), "A").unwrap();

    let err = m.register(item(1, "second"), "B").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateId);
    assert_eq!(m.get_entity(&1).unwrap().name, "first");
    assert_eq!(m.get_entity_category(&1).as_deref(), Some("A"));
}

#[test]
fn test_depth_limit() {
    let m = catalog();
    m.register(item(1, "deep"), "A.B.C.D.E").unwrap();
    let err = m.register(item(2, "too deep"), "A.B.C.D.E.F").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCategory);
    assert!(!m.contains(&2));
    assert!(!m.category_exists("A.B.C.D.E.F"));
}

#[test]
fn test_invalid_paths() {
    let m = catalog();
    for bad in ["", "   ", "A..B", ".A", "A."] {
        let err = m.register(item(1, "x"), bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCategory, "path {bad:?}");
    }
    assert_eq!(m.entity_count(), 0);
}

#[test]
fn test_configured_depth() {
    let m: CategoryManager<Item, u64> = CategoryManager::with_config(
        CatalogConfig::default().with_max_category_depth(2),
        |i: &Item| i.id,
    );
    m.register(item(1, "ok"), "A.B").unwrap();
    assert_eq!(
        m.register(item(2, "no"), "A.B.C").unwrap_err().kind(),
        ErrorKind::InvalidCategory
    );
}

#[test]
fn test_ancestors_are_created() {
    let m = catalog();
    m.register(item(1, "sword"), "Equipment.Weapon.Sword").unwrap();
    assert!(m.category_exists("Equipment"));
    assert!(m.category_exists("Equipment.Weapon"));
    assert_eq!(m.category_count(), 3);
    assert_eq!(m.get_child_categories("Equipment"), vec!["Equipment.Weapon"]);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_direct_members_and_subtree() {
    let m = armory();
    assert_eq!(names(m.get_by_category("Equipment.Weapon", false)), set(&["club"]));
    assert_eq!(
        names(m.get_by_category("Equipment.Weapon", true)),
        set(&["club", "sword", "bow"])
    );
    assert_eq!(
        names(m.get_by_category("Equipment", true)),
        set(&["club", "sword", "bow", "helmet"])
    );
    assert!(m.get_by_category("Equipment", false).is_empty());
}

#[test]
fn test_wildcard_query() {
    let m = armory();
    assert_eq!(
        names(m.get_by_category("Equipment.Weapon.*", false)),
        set(&["sword", "bow"])
    );
    assert_eq!(
        names(m.get_by_category("*.Armor", true)),
        set(&["helmet"])
    );
    // Regex metacharacters other than `*` are literal.
    assert!(m.get_by_category("Equipment.Weapon.(Sword)*", false).is_empty());
}

#[test]
fn test_regex_query() {
    let m = armory();
    assert_eq!(
        names(m.get_by_category_regex(r"\.(Sword|Bow)$", false).unwrap()),
        set(&["sword", "bow"])
    );
    assert_eq!(
        m.get_by_category_regex("[", false).unwrap_err().kind(),
        ErrorKind::InvalidParameter
    );
}

#[test]
fn test_tag_and_or() {
    let m = armory();
    m.add_tags(&1, &["t1", "t2"]).unwrap();
    m.add_tag(&2, "t1").unwrap();
    m.add_tag(&3, "t2").unwrap();

    assert_eq!(names(m.get_by_tags(&["t1", "t2"], true)), set(&["sword"]));
    assert_eq!(
        names(m.get_by_tags(&["t1", "t2"], false)),
        set(&["sword", "bow", "helmet"])
    );
    // Tagged only `t1`: in the union, not the intersection.
    assert!(!names(m.get_by_tags(&["t1", "t2"], true)).contains("bow"));
}

#[test]
fn test_category_and_tag() {
    let m = armory();
    m.add_tag(&1, "sharp").unwrap();
    m.add_tag(&3, "sharp").unwrap();
    assert_eq!(
        names(m.get_by_category_and_tag("Equipment.Weapon", "sharp", true)),
        set(&["sword"])
    );
    assert!(m
        .get_by_category_and_tag("Equipment.Weapon", "sharp", false)
        .is_empty());
}

// ============================================================================
// Tags, metadata, cache
// ============================================================================

#[test]
fn test_tag_idempotence_and_cache_reset() {
    let m = armory();
    m.add_tag(&1, "melee").unwrap();
    m.add_tag(&1, "melee").unwrap();
    assert_eq!(m.get_entity_tags(&1).len(), 1);
    assert_eq!(m.get_by_tag("melee").len(), 1);

    assert_eq!(m.get_by_tag("melee").len(), 1);
    assert!(m.cache_size() > 0);
    m.clear_cache();
    assert_eq!(m.cache_size(), 0);
}

#[test]
fn test_cache_never_serves_stale_results() {
    let m = armory();
    m.add_tag(&1, "loot").unwrap();
    assert_eq!(m.get_by_tag("loot").len(), 1);

    m.add_tag(&2, "loot").unwrap();
    assert_eq!(m.get_by_tag("loot").len(), 2);

    m.remove_tag(&1, "loot").unwrap();
    assert_eq!(names(m.get_by_tag("loot")), set(&["bow"]));

    m.delete_entity(&2).unwrap();
    assert!(m.get_by_tag("loot").is_empty());
}

#[test]
fn test_cache_can_be_disabled() {
    let config = CatalogConfig {
        enable_tag_cache: false,
        ..CatalogConfig::default()
    };
    let m: CategoryManager<Item, u64> = CategoryManager::with_config(config, |i: &Item| i.id);
    m.register(item(1, "a"), "A").unwrap();
    m.add_tag(&1, "t").unwrap();
    assert_eq!(m.get_by_tag("t").len(), 1);
    assert_eq!(m.cache_size(), 0);
}

#[test]
fn test_metadata_replace_only() {
    let m = armory();
    let mut meta = Metadata::new();
    meta.insert("rarity".into(), "rare".into());
    meta.insert("weight".into(), "3".into());
    m.update_metadata(&1, meta).unwrap();

    let mut next = m.get_metadata(&1).unwrap();
    next.remove("weight");
    m.update_metadata(&1, next.clone()).unwrap();
    assert_eq!(m.get_metadata(&1), Some(next));
}

// ============================================================================
// Deletion and re-registration
// ============================================================================

#[test]
fn test_delete_then_reregister_starts_clean() {
    let m = armory();
    m.add_tags(&1, &["melee", "sharp"]).unwrap();
    m.update_metadata(&1, [("k".to_string(), "v".to_string())].into())
        .unwrap();

    m.delete_entity(&1).unwrap();
    assert!(m.get_by_category("Equipment", true).iter().all(|i| i.id != 1));
    assert!(m.get_by_tag("melee").is_empty());
    assert_eq!(m.get_metadata(&1), None);

    m.register(item(1, "sword again"), "Equipment.Weapon.Sword")
        .unwrap();
    assert!(m.get_entity_tags(&1).is_empty());
    assert_eq!(m.get_metadata(&1), None);
}

#[test]
fn test_batch_delete() {
    let m = armory();
    let result = m.delete_batch(&[1, 2, 99]);
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.failures().next().map(|(k, _)| *k), Some(99));
    assert_eq!(m.entity_count(), 2);
}

#[test]
fn test_recursive_category_delete_frees_path() {
    let m = armory();
    assert_eq!(m.delete_category_recursive("Equipment.Weapon").unwrap(), 3);
    assert!(!m.category_exists("Equipment.Weapon.Sword"));

    // The released path can be a rename target.
    m.rename_category("Equipment.Armor", "Equipment.Weapon")
        .unwrap();
    assert_eq!(
        names(m.get_by_category("Equipment.Weapon.Helmet", false)),
        set(&["helmet"])
    );
}

// ============================================================================
// Rename
// ============================================================================

#[test]
fn test_rename_preserves_memberships() {
    let m = armory();
    m.add_tag(&1, "melee").unwrap();
    m.rename_category("Equipment", "Gear").unwrap();

    assert!(!m.category_exists("Equipment"));
    assert!(m.category_exists("Gear.Weapon"));
    assert!(m.category_exists("Gear.Weapon.Sword"));
    assert_eq!(m.get_entity_category(&1).as_deref(), Some("Gear.Weapon.Sword"));
    assert_eq!(
        names(m.get_by_category("Gear", true)),
        set(&["sword", "bow", "helmet", "club"])
    );
    assert_eq!(names(m.get_by_tag("melee")), set(&["sword"]));
}

#[test]
fn test_rename_errors() {
    let m = armory();
    m.create_category("Gear").unwrap();
    assert_eq!(
        m.rename_category("Equipment", "Gear").unwrap_err().kind(),
        ErrorKind::DuplicateId
    );
    assert_eq!(
        m.rename_category("Missing", "Other").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        m.rename_category("Equipment", "Equipment.Inner")
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidParameter
    );
    // `Equipment.Weapon.Sword` would land at depth 6.
    assert_eq!(
        m.rename_category("Equipment", "A.B.C.D").unwrap_err().kind(),
        ErrorKind::InvalidCategory
    );
    assert!(m.category_exists("Equipment.Weapon.Sword"));
}

#[test]
fn test_rename_and_register_share_the_normalizer_depth() {
    // The injected normalizer is stricter than the configured default depth.
    let m: CategoryManager<Item, u64> = CategoryManager::from_parts(
        CatalogConfig::default(),
        Arc::new(|i: &Item| i.id),
        Arc::new(DefaultNormalizer::new(3)),
        Arc::new(NoopStatistics),
    );
    m.register(item(1, "sword"), "A.B.C").unwrap();
    assert_eq!(
        m.register(item(2, "axe"), "A.B.C.D").unwrap_err().kind(),
        ErrorKind::InvalidCategory
    );

    // `A.B.C` would become `X.Y.B.C`, four segments.
    assert_eq!(
        m.rename_category("A.B", "X.Y.B").unwrap_err().kind(),
        ErrorKind::InvalidCategory
    );
    assert!(m.category_exists("A.B.C"));
    assert!(!m.category_exists("X.Y"));

    m.rename_category("A.B", "X.B").unwrap();
    assert_eq!(m.get_entity_category(&1).as_deref(), Some("X.B.C"));
}

#[test]
fn test_rename_reparents() {
    let m = armory();
    m.rename_category("Equipment.Armor", "Wardrobe.Armor").unwrap();
    assert!(m.category_exists("Wardrobe"));
    assert_eq!(m.get_child_categories("Equipment"), vec!["Equipment.Weapon"]);
    assert_eq!(
        names(m.get_by_category("Wardrobe", true)),
        set(&["helmet"])
    );
}

// ============================================================================
// Statistics and reset
// ============================================================================

#[test]
fn test_statistics_when_enabled() {
    let m: CategoryManager<Item, u64> = CategoryManager::with_config(
        CatalogConfig::default().with_statistics(true),
        |i: &Item| i.id,
    );
    m.register(item(1, "a"), "A").unwrap();
    m.register(item(1, "a"), "A").unwrap_err();
    m.add_tag(&1, "t").unwrap();
    m.get_by_tag("t");
    m.get_by_tag("t");

    let stats = m.statistics();
    assert_eq!(stats.entity_count, 1);
    assert_eq!(stats.tag_count, 1);
    assert_eq!(stats.counters.registrations, 1);
    assert_eq!(stats.counters.failed_registrations, 1);
    assert_eq!(stats.counters.tag_cache_misses, 1);
    assert_eq!(stats.counters.tag_cache_hits, 1);

    m.reset_statistics();
    assert_eq!(m.statistics().counters, StatCounters::default());
}

#[test]
fn test_statistics_disabled_by_default() {
    let m = armory();
    m.get_by_category("Equipment", true);
    let stats = m.statistics();
    assert_eq!(stats.entity_count, 4);
    assert_eq!(stats.counters, StatCounters::default());
}

#[test]
fn test_clear() {
    let m = armory();
    m.add_tag(&1, "t").unwrap();
    m.clear();
    assert_eq!(m.entity_count(), 0);
    assert_eq!(m.category_count(), 0);
    assert!(m.get_all_tags().is_empty());
    m.register(item(1, "fresh"), "A").unwrap();
    assert!(m.get_entity_tags(&1).is_empty());
}
