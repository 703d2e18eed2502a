use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use taxograph_catalog::{CategoryManager, ErrorKind};

const MAX_KEY: u32 = 40;
const SEGMENTS: [&str; 4] = ["A", "B", "C", "D"];
const TAGS: [&str; 5] = ["t0", "t1", "t2", "t3", "t4"];

#[derive(Debug, Clone)]
enum Op {
    Register { key: u32, path: String },
    Move { key: u32, path: String },
    Delete { key: u32 },
    AddTag { key: u32, tag: usize },
    RemoveTag { key: u32, tag: usize },
    DeleteCategory { path: String },
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(0..SEGMENTS.len(), 1..=4).prop_map(|segs| {
        segs.into_iter()
            .map(|i| SEGMENTS[i])
            .collect::<Vec<_>>()
            .join(".")
    })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = 0..MAX_KEY;
    let tag = 0..TAGS.len();
    prop_oneof![
        4 => (key.clone(), path_strategy()).prop_map(|(key, path)| Op::Register { key, path }),
        2 => (key.clone(), path_strategy()).prop_map(|(key, path)| Op::Move { key, path }),
        2 => key.clone().prop_map(|key| Op::Delete { key }),
        4 => (key.clone(), tag.clone()).prop_map(|(key, tag)| Op::AddTag { key, tag }),
        2 => (key, tag).prop_map(|(key, tag)| Op::RemoveTag { key, tag }),
        1 => path_strategy().prop_map(|path| Op::DeleteCategory { path }),
    ]
}

/// Plain model of what the catalog should contain.
#[derive(Default)]
struct Model {
    category_of: BTreeMap<u32, String>,
    tags_of: BTreeMap<u32, BTreeSet<&'static str>>,
}

impl Model {
    fn apply(&mut self, m: &CategoryManager<u32, u32>, op: &Op) {
        match op {
            Op::Register { key, path } => {
                let result = m.register(*key, path);
                if self.category_of.contains_key(key) {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::DuplicateId);
                } else {
                    result.unwrap();
                    self.category_of.insert(*key, path.clone());
                }
            }
            Op::Move { key, path } => {
                let result = m.move_entity_to_category(key, path);
                match self.category_of.get_mut(key) {
                    Some(current) => {
                        result.unwrap();
                        *current = path.clone();
                    }
                    None => assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound),
                }
            }
            Op::Delete { key } => {
                let result = m.delete_entity(key);
                if self.category_of.remove(key).is_some() {
                    result.unwrap();
                    self.tags_of.remove(key);
                } else {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
                }
            }
            Op::AddTag { key, tag } => {
                let result = m.add_tag(key, TAGS[*tag]);
                if self.category_of.contains_key(key) {
                    result.unwrap();
                    self.tags_of.entry(*key).or_default().insert(TAGS[*tag]);
                } else {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
                }
            }
            Op::RemoveTag { key, tag } => {
                let result = m.remove_tag(key, TAGS[*tag]);
                if self.category_of.contains_key(key) {
                    let had = self
                        .tags_of
                        .get_mut(key)
                        .map_or(false, |tags| tags.remove(TAGS[*tag]));
                    assert_eq!(result.unwrap(), had);
                } else {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
                }
            }
            Op::DeleteCategory { path } => {
                let result = m.delete_category(path);
                if !m.category_exists(path) {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
                    return;
                }
                let doomed: Vec<u32> = self
                    .category_of
                    .iter()
                    .filter(|(_, p)| *p == path)
                    .map(|(k, _)| *k)
                    .collect();
                assert_eq!(result.unwrap(), doomed.len());
                for key in doomed {
                    self.category_of.remove(&key);
                    self.tags_of.remove(&key);
                }
            }
        }
    }

    fn members_under(&self, prefix: &str, include_children: bool) -> BTreeSet<u32> {
        self.category_of
            .iter()
            .filter(|(_, p)| {
                *p == prefix
                    || (include_children
                        && p.starts_with(prefix)
                        && p[prefix.len()..].starts_with('.'))
            })
            .map(|(k, _)| *k)
            .collect()
    }
}

fn keys(found: Vec<std::sync::Arc<u32>>) -> BTreeSet<u32> {
    found.into_iter().map(|e| *e).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn reverse_indexes_match_model(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let m: CategoryManager<u32, u32> = CategoryManager::new(|e: &u32| *e);
        let mut model = Model::default();
        for op in &ops {
            model.apply(&m, op);
        }

        prop_assert_eq!(m.entity_count(), model.category_of.len());
        for (key, path) in &model.category_of {
            let actual_category = m.get_entity_category(key);
            prop_assert_eq!(actual_category.as_deref(), Some(path.as_str()));
            let expected: Vec<String> = model
                .tags_of
                .get(key)
                .map(|t| t.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();
            prop_assert_eq!(m.get_entity_tags(key), expected);
        }

        for tag in TAGS {
            let expected: BTreeSet<u32> = model
                .tags_of
                .iter()
                .filter(|(_, tags)| tags.contains(tag))
                .map(|(k, _)| *k)
                .collect();
            prop_assert_eq!(keys(m.get_by_tag(tag)), expected);
        }
    }

    #[test]
    fn subtree_queries_are_supersets(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let m: CategoryManager<u32, u32> = CategoryManager::new(|e: &u32| *e);
        let mut model = Model::default();
        for op in &ops {
            model.apply(&m, op);
        }

        for path in m.get_all_categories() {
            let direct = keys(m.get_by_category(&path, false));
            let subtree = keys(m.get_by_category(&path, true));
            prop_assert_eq!(&direct, &model.members_under(&path, false));
            prop_assert_eq!(&subtree, &model.members_under(&path, true));
            prop_assert!(direct.is_subset(&subtree));
        }
    }

    #[test]
    fn and_is_subset_of_or(ops in prop::collection::vec(op_strategy(), 1..80), a in 0..TAGS.len(), b in 0..TAGS.len()) {
        let m: CategoryManager<u32, u32> = CategoryManager::new(|e: &u32| *e);
        let mut model = Model::default();
        for op in &ops {
            model.apply(&m, op);
        }

        let both = keys(m.get_by_tags(&[TAGS[a], TAGS[b]], true));
        let either = keys(m.get_by_tags(&[TAGS[a], TAGS[b]], false));
        let only_a = keys(m.get_by_tag(TAGS[a]));
        let only_b = keys(m.get_by_tag(TAGS[b]));
        prop_assert_eq!(&both, &only_a.intersection(&only_b).copied().collect::<BTreeSet<u32>>());
        prop_assert_eq!(&either, &only_a.union(&only_b).copied().collect::<BTreeSet<u32>>());
    }
}
