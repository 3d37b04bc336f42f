//! Copy-on-write path trie (SPEC_FULL.md §4.2), used to hold commit
//! manifests. Maps `/`-separated paths to values of type `V` while
//! guaranteeing that no mutation of one `PathMap` is ever observable
//! through another `PathMap` that shares structure with it.
//!
//! The source tracks sharing with an explicit per-node `shared` bit set by
//! `snapshot()`. In safe Rust, `Rc`'s strong count already answers "is
//! anyone else looking at this node" for us, so `Node`s are held behind
//! `Rc` and every mutating path goes through `Rc::make_mut`, which clones
//! a node the first time it is mutated while shared and mutates in place
//! afterward. This is the same copy-on-first-write contract as `snapshot()`
//! tracked explicitly, without a redundant flag (see DESIGN.md).

use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Clone)]
struct Node<V: Clone> {
    children: BTreeMap<String, Rc<Node<V>>>,
    values: BTreeMap<String, V>,
}

impl<V: Clone> Node<V> {
    fn empty() -> Self {
        Node {
            children: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }
}

/// A copy-on-write trie from path to `V`. Cheap to clone (`Rc` bump);
/// cheap to snapshot; mutation unshares only the path it touches.
#[derive(Clone)]
pub struct PathMap<V: Clone> {
    root: Rc<Node<V>>,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

impl<V: Clone> PathMap<V> {
    pub fn new() -> Self {
        PathMap {
            root: Rc::new(Node::empty()),
        }
    }

    /// Returns a new `PathMap` sharing all current structure. Any later
    /// mutation of either map unshares only the nodes it touches.
    pub fn snapshot(&self) -> Self {
        PathMap {
            root: Rc::clone(&self.root),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty() && self.root.values.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&V> {
        let components = split_path(path);
        let (dirs, leaf) = components.split_at(components.len().saturating_sub(1));
        let leaf = leaf.first()?;
        let mut node = &self.root;
        for dir in dirs {
            node = node.children.get(*dir)?;
        }
        node.values.get(*leaf)
    }

    /// Sets the value at `path`, unsharing nodes along the way.
    pub fn set(&mut self, path: &str, value: V) {
        let components = split_path(path);
        if components.is_empty() {
            return;
        }
        let (dirs, leaf) = components.split_at(components.len() - 1);
        let leaf = leaf[0];
        let mut node = Rc::make_mut(&mut self.root);
        for dir in dirs {
            node = Rc::make_mut(
                node.children
                    .entry((*dir).to_string())
                    .or_insert_with(|| Rc::new(Node::empty())),
            );
        }
        node.values.insert(leaf.to_string(), value);
    }

    /// Removes the value at `path`, pruning any interior directory nodes
    /// left empty by the removal.
    pub fn remove(&mut self, path: &str) {
        let components = split_path(path);
        if components.is_empty() {
            return;
        }
        remove_recursive(&mut self.root, &components);
    }

    /// Grafts from `other` into `self` at `dest`, per the source's
    /// `copyFrom(targetPath, otherMap, sourcePath)`:
    /// - if `src` names a leaf value in `other`, copies that value to
    ///   `dest`;
    /// - if `src` names a subtree, grafts a shared view of that subtree at
    ///   `dest`;
    /// - if `src` is empty, replaces `self` wholesale with a shared view
    ///   of `other`'s root.
    pub fn copy_from(&mut self, dest: &str, other: &PathMap<V>, src: &str) {
        let src_components = split_path(src);
        if src_components.is_empty() {
            self.root = Rc::clone(&other.root);
            return;
        }
        let (dirs, leaf) = src_components.split_at(src_components.len() - 1);
        let leaf = leaf[0];
        let mut node = &other.root;
        for dir in dirs {
            match node.children.get(*dir) {
                Some(child) => node = child,
                None => return,
            }
        }
        if let Some(value) = node.values.get(leaf).cloned() {
            self.set(dest, value);
            return;
        }
        if let Some(subtree) = node.children.get(leaf) {
            graft_subtree(&mut self.root, &split_path(dest), Rc::clone(subtree));
        }
    }

    /// Sorted `(path, value)` pairs, lexicographic by full path
    /// (SPEC_FULL.md §4.2 determinism requirement).
    pub fn items(&self) -> Vec<(String, V)> {
        let mut out = Vec::new();
        collect_items(&self.root, &mut String::new(), &mut out);
        out
    }

    pub fn pathnames(&self) -> Vec<String> {
        self.items().into_iter().map(|(p, _)| p).collect()
    }
}

impl<V: Clone> Default for PathMap<V> {
    fn default() -> Self {
        PathMap::new()
    }
}

fn remove_recursive<V: Clone>(node: &mut Rc<Node<V>>, components: &[&str]) {
    let mutable = Rc::make_mut(node);
    if components.len() == 1 {
        mutable.values.remove(components[0]);
        return;
    }
    let (head, rest) = (components[0], &components[1..]);
    let Some(child) = mutable.children.get_mut(head) else {
        return;
    };
    remove_recursive(child, rest);
    if child.children.is_empty() && child.values.is_empty() {
        mutable.children.remove(head);
    }
}

fn graft_subtree<V: Clone>(node: &mut Rc<Node<V>>, dest: &[&str], subtree: Rc<Node<V>>) {
    if dest.is_empty() {
        *node = subtree;
        return;
    }
    let mutable = Rc::make_mut(node);
    let head = dest[0];
    let entry = mutable
        .children
        .entry(head.to_string())
        .or_insert_with(|| Rc::new(Node::empty()));
    graft_subtree(entry, &dest[1..], subtree);
}

fn collect_items<V: Clone>(node: &Node<V>, prefix: &mut String, out: &mut Vec<(String, V)>) {
    // Merge leaf names and child directory names into one namespace so the
    // traversal yields paths in full lexicographic order.
    let mut names: Vec<&str> = node
        .values
        .keys()
        .map(|s| s.as_str())
        .chain(node.children.keys().map(|s| s.as_str()))
        .collect();
    names.sort_unstable();
    names.dedup();

    let base_len = prefix.len();
    for name in names {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(name);

        if let Some(value) = node.values.get(name) {
            out.push((prefix.clone(), value.clone()));
        }
        if let Some(child) = node.children.get(name) {
            collect_items(child, prefix, out);
        }
        prefix.truncate(base_len);
    }
}
