//! Category tree: an arena of nodes addressed by [`TermId`].
//!
//! A node's id is the category mapper's id for its full dot-path, so the arena
//! needs no separate index type. Parents are stored as ids, never as
//! references, which keeps the tree free of ownership cycles.
//!
//! The tree holds three views of the same node set (`name -> id`,
//! `id -> name`, `id -> node`). They are only mutated together, through the
//! methods below, while the caller holds the catalog's tree lock.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use std::collections::BTreeSet;

use crate::error::{CatalogError, Result};
use crate::mapper::{IntegerMapper, TermId};
use crate::normalize::SEPARATOR;

/// One category in the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    term_id: TermId,
    parent: Option<TermId>,
    children: BTreeSet<TermId>,
}

impl CategoryNode {
    pub fn new(term_id: TermId, parent: Option<TermId>) -> Self {
        Self {
            term_id,
            parent,
            children: BTreeSet::new(),
        }
    }

    pub fn term_id(&self) -> TermId {
        self.term_id
    }

    pub fn parent(&self) -> Option<TermId> {
        self.parent
    }

    /// Idempotent: linking an existing child is a no-op.
    pub fn get_or_create_child(&mut self, child_id: TermId) -> TermId {
        self.children.insert(child_id);
        child_id
    }

    pub fn try_get_child(&self, child_id: TermId) -> Option<TermId> {
        self.children.get(&child_id).copied()
    }

    pub fn has_child(&self, child_id: TermId) -> bool {
        self.children.contains(&child_id)
    }

    pub fn children(&self) -> impl Iterator<Item = TermId> + '_ {
        self.children.iter().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    fn unlink_child(&mut self, child_id: TermId) {
        self.children.remove(&child_id);
    }
}

/// Arena + name indexes for every known category.
#[derive(Debug, Default)]
pub struct CategoryTree {
    nodes: AHashMap<TermId, CategoryNode>,
    name_to_id: AHashMap<String, TermId>,
    id_to_name: AHashMap<TermId, String>,
    roots: BTreeSet<TermId>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: TermId) -> Option<&CategoryNode> {
        self.nodes.get(&id)
    }

    pub fn lookup(&self, path: &str) -> Option<TermId> {
        self.name_to_id.get(path).copied()
    }

    pub fn name_of(&self, id: TermId) -> Option<&str> {
        self.id_to_name.get(&id).map(String::as_str)
    }

    pub fn roots(&self) -> impl Iterator<Item = TermId> + '_ {
        self.roots.iter().copied()
    }

    /// `(id, full path)` for every node, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = (TermId, &str)> + '_ {
        self.id_to_name.iter().map(|(id, s)| (*id, s.as_str()))
    }

    /// Resolve `path` (already normalized), creating any missing node along it.
    pub fn ensure_path(&mut self, mapper: &IntegerMapper, path: &str) -> TermId {
        let prefixes = path
            .match_indices(SEPARATOR)
            .map(|(end, _)| &path[..end])
            .chain(std::iter::once(path));

        let mut parent: Option<TermId> = None;
        for prefix in prefixes {
            let id = match self.name_to_id.get(prefix) {
                Some(&id) => id,
                None => {
                    let id = mapper.get_or_assign_id(prefix);
                    self.insert_node(id, prefix, parent);
                    tracing::debug!(category = prefix, id = id.raw(), "created category node");
                    id
                }
            };
            parent = Some(id);
        }

        match parent {
            Some(id) => id,
            None => unreachable!("prefix chain always ends with the full path"),
        }
    }

    fn insert_node(&mut self, id: TermId, name: &str, parent: Option<TermId>) {
        self.nodes.insert(id, CategoryNode::new(id, parent));
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.insert(id, name.to_string());
        self.attach(id, parent);
    }

    fn attach(&mut self, id: TermId, parent: Option<TermId>) {
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(p) => {
                p.get_or_create_child(id);
            }
            None => {
                self.roots.insert(id);
            }
        }
    }

    fn detach(&mut self, id: TermId) {
        let parent = self.nodes.get(&id).and_then(CategoryNode::parent);
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(p) => p.unlink_child(id),
            None => {
                self.roots.remove(&id);
            }
        }
    }

    /// Node ids from the root down to `id` (leaf last).
    pub fn path_as_ids(&self, id: TermId) -> Vec<TermId> {
        let mut out = Vec::new();
        let mut cursor = self.nodes.get(&id);
        while let Some(node) = cursor {
            out.push(node.term_id);
            cursor = node.parent.and_then(|p| self.nodes.get(&p));
        }
        out.reverse();
        out
    }

    /// Number of segments in the node's path (roots have depth 1).
    pub fn depth(&self, id: TermId) -> usize {
        self.path_as_ids(id).len()
    }

    /// `id` followed by all its descendants, pre-order.
    pub fn subtree_preorder(&self, id: TermId) -> Vec<TermId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.nodes.get(&next) else {
                continue;
            };
            out.push(next);
            // Reverse so the smallest child is visited first.
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    pub fn subtree_bitmap(&self, id: TermId) -> RoaringBitmap {
        self.subtree_preorder(id)
            .into_iter()
            .map(TermId::raw)
            .collect()
    }

    /// Drop `ids` from all three views and release their terms in `mapper`.
    pub fn remove_nodes(&mut self, mapper: &IntegerMapper, ids: &[TermId]) {
        for &id in ids {
            if !self.nodes.contains_key(&id) {
                continue;
            }
            self.detach(id);
            self.nodes.remove(&id);
            self.roots.remove(&id);
            if let Some(name) = self.id_to_name.remove(&id) {
                self.name_to_id.remove(&name);
                mapper.release_term(&name);
            }
        }
    }

    /// Rename `old` (and its whole subtree) to `new`, keeping every id.
    ///
    /// `new` must already be normalized. When its parent path differs from
    /// the old one, the subtree is moved under the new parent, which is
    /// created if missing. Every rewritten path must pass `validate`; the
    /// first rejection fails the rename with `InvalidCategory`.
    pub fn rename(
        &mut self,
        mapper: &IntegerMapper,
        old: &str,
        new: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<Vec<TermId>> {
        let Some(old_id) = self.lookup(old) else {
            return Err(CatalogError::category_not_found(old));
        };
        if self.name_to_id.contains_key(new) {
            return Err(CatalogError::DuplicateId(format!("category `{new}`")));
        }
        if is_descendant_path(new, old) {
            return Err(CatalogError::InvalidParameter(format!(
                "cannot rename `{old}` into its own subtree `{new}`"
            )));
        }

        let subtree = self.subtree_preorder(old_id);
        let renames: Vec<(TermId, String, String)> = subtree
            .iter()
            .filter_map(|&id| {
                let old_name = self.name_of(id)?;
                let new_name = format!("{new}{}", &old_name[old.len()..]);
                Some((id, old_name.to_string(), new_name))
            })
            .collect();
        for (_, _, new_name) in &renames {
            validate(new_name).map_err(|reason| {
                CatalogError::InvalidCategory(format!("renaming `{old}` to `{new}`: {reason}"))
            })?;
        }
        if let Some((_, _, taken)) = renames
            .iter()
            .find(|(_, _, new_name)| mapper.try_get_id(new_name).is_some())
        {
            return Err(CatalogError::ConcurrencyConflict(format!(
                "category term `{taken}` is mapped but has no node"
            )));
        }

        let new_parent = parent_path(new).map(|p| self.ensure_path(mapper, p));

        for (id, old_name, new_name) in &renames {
            if let Err(err) = mapper.remap_term(old_name, new_name) {
                return Err(CatalogError::ConcurrencyConflict(err.to_string()));
            }
            self.name_to_id.remove(old_name);
            self.name_to_id.insert(new_name.clone(), *id);
            self.id_to_name.insert(*id, new_name.clone());
        }

        self.detach(old_id);
        if let Some(node) = self.nodes.get_mut(&old_id) {
            node.parent = new_parent;
        }
        self.attach(old_id, new_parent);

        Ok(subtree)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.name_to_id.clear();
        self.id_to_name.clear();
        self.roots.clear();
    }
}

fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// True when `path` lies strictly below `ancestor`.
pub(crate) fn is_descendant_path(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}
