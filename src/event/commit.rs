//! Commit events (SPEC_FULL.md §3, §4.1): the richest event kind, owning a
//! fileop list, a parent/child wiring, and a lazily cached manifest.

use crate::attribution::Attribution;
use crate::fileop::{BlobRef, FileMode, FileOp};
use crate::mark::Mark;
use crate::pathmap::PathMap;

use super::CommitRef;

/// A single resolved manifest slot: the mode and content reference visible
/// at a path for a given commit (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub mode: FileMode,
    pub content: BlobRef,
}

/// Insertion-ordered string properties, e.g. a commit's `property`
/// key/value pairs (SPEC_FULL.md §3). A plain `Vec` is enough at this
/// scale and keeps insertion order without an extra dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap(Vec<(String, String)>);

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap(Vec::new())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value.into();
        } else {
            self.0.push((key, value.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub mark: Mark,
    pub branch: String,
    pub committer: Attribution,
    pub authors: Vec<Attribution>,
    pub comment: String,
    pub fileops: Vec<FileOp>,
    pub properties: PropertyMap,
    /// Indices of Tag/Reset events whose committish resolves to this commit.
    pub attachments: Vec<usize>,
    pub parents: Vec<CommitRef>,
    /// Derived, kept consistent by `dag::set_parents` (invariant 2).
    pub children: Vec<usize>,
    pub manifest_cache: Option<PathMap<ManifestEntry>>,
    pub delete: bool,
    /// Branch color assigned by the coloring algorithm for VCSes without
    /// native per-commit branch labels (SPEC_FULL.md §4.11).
    pub color: Option<String>,
    pub legacy_id: Option<String>,
}

impl Commit {
    pub fn new(mark: Mark, branch: String, committer: Attribution) -> Self {
        Commit {
            mark,
            branch,
            committer,
            authors: Vec::new(),
            comment: String::new(),
            fileops: Vec::new(),
            properties: PropertyMap::new(),
            attachments: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            manifest_cache: None,
            delete: false,
            color: None,
            legacy_id: None,
        }
    }

    pub fn first_parent(&self) -> Option<&CommitRef> {
        self.parents.first()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn invalidate_manifest(&mut self) {
        self.manifest_cache = None;
    }
}
