//! Backdrop tree.
//!
//! Backdrops are grouping containers addressed by dot-separated paths
//! (`LAYER.lgt_key.SHUFFLE`). The tree is an arena: every backdrop lives in a
//! flat table and refers to its parent and children by [`BackdropId`]. A path
//! index maps full paths to ids. Backdrops are created on first reference and
//! never removed.

use std::collections::BTreeMap;

use crate::host::NodeId;
use crate::types::{BackdropOption, BackdropOptions, Rect};

/// Index of a backdrop in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackdropId(usize);

impl BackdropId {
    /// Id of the root backdrop.
    pub const ROOT: BackdropId = BackdropId(0);

    /// Position in the arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One grouping container.
#[derive(Debug, Clone)]
pub struct Backdrop {
    /// Full dot-separated path. Empty for the root.
    pub path: String,
    /// Last path segment, used as label.
    pub name: String,
    /// Parent backdrop. `None` only for the root.
    pub parent: Option<BackdropId>,
    /// Children in first-reference order.
    pub children: Vec<BackdropId>,
    /// Member nodes, deduplicated, in insertion order.
    pub nodes: Vec<NodeId>,
    /// Display options.
    pub options: BackdropOptions,
    /// Computed box. `None` until computed, or when the box is degenerate.
    pub rect: Option<Rect>,
    /// Nesting depth: root 0, top-level groups 1.
    pub depth: u32,
}

impl Backdrop {
    fn new(path: String, name: String, parent: Option<BackdropId>, depth: u32) -> Self {
        Self {
            path,
            name,
            parent,
            children: Vec::new(),
            nodes: Vec::new(),
            options: BackdropOptions::default(),
            rect: None,
            depth,
        }
    }

    /// No member nodes and no children.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.children.is_empty()
    }
}

/// Arena of backdrops with a path index.
#[derive(Debug, Clone)]
pub struct BackdropTree {
    arena: Vec<Backdrop>,
    index: BTreeMap<String, BackdropId>,
}

impl Default for BackdropTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BackdropTree {
    /// Create a tree holding only the root.
    pub fn new() -> Self {
        let mut index = BTreeMap::new();
        index.insert(String::new(), BackdropId::ROOT);
        Self {
            arena: vec![Backdrop::new(String::new(), String::new(), None, 0)],
            index,
        }
    }

    /// Get the backdrop at `path`, creating it and any missing ancestors.
    pub fn ensure(&mut self, path: &str) -> BackdropId {
        if let Some(id) = self.index.get(path) {
            return *id;
        }
        let mut current = BackdropId::ROOT;
        let mut prefix = String::new();
        for segment in path.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            current = match self.index.get(&prefix) {
                Some(id) => *id,
                None => self.insert_child(current, &prefix, segment),
            };
        }
        current
    }

    fn insert_child(&mut self, parent: BackdropId, path: &str, name: &str) -> BackdropId {
        let id = BackdropId(self.arena.len());
        let depth = self.arena[parent.0].depth + 1;
        self.arena.push(Backdrop::new(path.to_string(), name.to_string(), Some(parent), depth));
        self.arena[parent.0].children.push(id);
        self.index.insert(path.to_string(), id);
        id
    }

    /// Look up a backdrop by path without creating it.
    pub fn find(&self, path: &str) -> Option<BackdropId> {
        self.index.get(path).copied()
    }

    /// Get a backdrop.
    pub fn get(&self, id: BackdropId) -> &Backdrop {
        &self.arena[id.0]
    }

    /// Get a backdrop mutably.
    pub fn get_mut(&mut self, id: BackdropId) -> &mut Backdrop {
        &mut self.arena[id.0]
    }

    /// Backdrop at `path`, if it exists.
    pub fn by_path(&self, path: &str) -> Option<&Backdrop> {
        self.find(path).map(|id| self.get(id))
    }

    /// Add member nodes, skipping ones already present.
    pub fn add_nodes(&mut self, path: &str, nodes: impl IntoIterator<Item = NodeId>) {
        let id = self.ensure(path);
        let members = &mut self.arena[id.0].nodes;
        for node in nodes {
            if !members.contains(&node) {
                members.push(node);
            }
        }
    }

    /// Set one display option, overwriting any previous value.
    pub fn set_option(&mut self, path: &str, option: BackdropOption) {
        let id = self.ensure(path);
        self.arena[id.0].options.apply(option);
    }

    /// Top-level backdrops in first-reference order.
    pub fn top_level(&self) -> &[BackdropId] {
        &self.arena[0].children
    }

    /// Number of backdrops, root included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether only the root exists.
    pub fn is_empty(&self) -> bool {
        self.arena.len() == 1
    }

    /// All backdrops in creation order, root first.
    pub fn iter(&self) -> impl Iterator<Item = (BackdropId, &Backdrop)> {
        self.arena.iter().enumerate().map(|(i, b)| (BackdropId(i), b))
    }

    /// Depth-first ids below `id`, children before their parent.
    pub fn post_order(&self, id: BackdropId) -> Vec<BackdropId> {
        let mut out = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                out.push(current);
                continue;
            }
            stack.push((current, true));
            for child in self.arena[current.0].children.iter().rev() {
                stack.push((*child, false));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rgb;

    #[test]
    fn test_ensure_creates_ancestors_once() {
        let mut tree = BackdropTree::new();
        let shuffle = tree.ensure("LAYER.lgt_key.SHUFFLE");
        let read = tree.ensure("LAYER.lgt_key.READ");

        assert_eq!(tree.len(), 5);
        let layer = tree.find("LAYER").unwrap();
        let key = tree.find("LAYER.lgt_key").unwrap();
        assert_eq!(tree.top_level(), &[layer]);
        assert_eq!(tree.get(key).children, vec![shuffle, read]);
        assert_eq!(tree.get(shuffle).name, "SHUFFLE");
        assert_eq!(tree.get(shuffle).depth, 3);
        assert_eq!(tree.get(shuffle).parent, Some(key));
        assert_eq!(tree.ensure("LAYER.lgt_key.SHUFFLE"), shuffle);
    }

    #[test]
    fn test_add_nodes_dedups() {
        let mut tree = BackdropTree::new();
        let a = NodeId::new(1);
        let b = NodeId::new(2);
        tree.add_nodes("MERGE", [a, b]);
        tree.add_nodes("MERGE", [b, a]);
        assert_eq!(tree.by_path("MERGE").unwrap().nodes, vec![a, b]);
    }

    #[test]
    fn test_options_overwrite() {
        let mut tree = BackdropTree::new();
        tree.set_option("INPUTS", BackdropOption::Color(Rgb(1, 1, 1)));
        tree.set_option("INPUTS", BackdropOption::Color(Rgb(2, 2, 2)));
        assert_eq!(tree.by_path("INPUTS").unwrap().options.color, Some(Rgb(2, 2, 2)));
    }

    #[test]
    fn test_post_order_children_first() {
        let mut tree = BackdropTree::new();
        let ab = tree.ensure("A.B");
        let ac = tree.ensure("A.C");
        let d = tree.ensure("D");
        let a = tree.find("A").unwrap();
        assert_eq!(tree.post_order(BackdropId::ROOT), vec![ab, ac, a, d, BackdropId::ROOT]);
    }
}
