//! The Repository container (SPEC_FULL.md §3, §4.3): an ordered event
//! arena plus the lazily rebuilt indexes and tables surrounding it.

pub mod authormap;
pub mod legacymap;
pub mod namecache;

pub use authormap::AuthorMap;
pub use legacymap::LegacyMap;
pub use namecache::NameCache;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::event::{CommitRef, Event};
use crate::fileop::{BlobRef, FileOp};
use crate::mark::{Mark, MarkAllocator};

/// Ordered event list plus the lazily rebuilt mark index and name cache
/// described in SPEC_FULL.md §4.3. Parent/child and committish links are
/// arena indices (SPEC_FULL.md §9), so only fast-import `mark`
/// identities (never structural links) need rewriting on renumber.
pub struct Repository {
    pub events: Vec<Event>,
    pub legacy_map: LegacyMap,
    pub author_map: AuthorMap,
    /// Paths restored on rebuild (SPEC_FULL.md §3).
    pub preserve: HashSet<String>,
    pub sourcedir: Option<PathBuf>,
    pub vcs: Option<String>,
    /// Named selection-set assignments, owned here so the squash/DAG
    /// engines can remap or invalidate them on structural change; the
    /// selection-set DSL itself is an external collaborator (SPEC_FULL.md
    /// §9 "Selection-set DSL").
    pub assignments: HashMap<String, Vec<usize>>,

    mark_index: Option<HashMap<Mark, usize>>,
    name_cache: Option<NameCache>,
    mark_allocator: MarkAllocator,
    next_blob_seq: u64,
}

impl Repository {
    pub fn new() -> Self {
        Repository {
            events: Vec::new(),
            legacy_map: LegacyMap::new(),
            author_map: AuthorMap::new(),
            preserve: HashSet::new(),
            sourcedir: None,
            vcs: None,
            assignments: HashMap::new(),
            mark_index: None,
            name_cache: None,
            mark_allocator: MarkAllocator::starting_at(1),
            next_blob_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every operation that changes the event sequence must call this (or
    /// `notify_permuted`) before returning, per SPEC_FULL.md §4.3's
    /// mutation protocol: it clears the mark index and name cache and logs
    /// the single choke-point trace event.
    pub fn notify_mutation(&mut self, reason: &str) {
        self.mark_index = None;
        self.name_cache = None;
        if !self.assignments.is_empty() {
            tracing::warn!(
                reason,
                "{}",
                crate::errors::colorize_warning("invalidating selection assignments after unstructured mutation")
            );
            self.assignments.clear();
        }
        tracing::debug!(reason, event_count = self.events.len(), "sequence mutated");
    }

    /// Like `notify_mutation`, but for mutations whose effect on existing
    /// indices is a known permutation (deletion, topological resort): old
    /// indices in `remap` missing from the map are dropped from every
    /// assignment rather than clearing it outright.
    pub fn notify_permuted(&mut self, reason: &str, remap: &HashMap<usize, usize>) {
        self.mark_index = None;
        self.name_cache = None;
        for (name, indices) in self.assignments.iter_mut() {
            let before = indices.len();
            let mut mapped: Vec<usize> = indices.iter().filter_map(|i| remap.get(i).copied()).collect();
            mapped.sort_unstable();
            mapped.dedup();
            if mapped.is_empty() && before > 0 {
                tracing::warn!(
                    reason,
                    name,
                    "{}",
                    crate::errors::colorize_warning("selection assignment became empty after permutation")
                );
            }
            *indices = mapped;
        }
        tracing::debug!(reason, event_count = self.events.len(), "sequence permuted");
    }

    pub fn push(&mut self, event: Event) -> usize {
        self.events.push(event);
        let index = self.events.len() - 1;
        self.notify_mutation("append event");
        index
    }

    fn ensure_mark_index(&mut self) {
        if self.mark_index.is_none() {
            let mut map = HashMap::new();
            for (index, event) in self.events.iter().enumerate() {
                if let Some(mark) = event.mark() {
                    if !mark.is_none() {
                        map.insert(mark, index);
                    }
                }
            }
            self.mark_index = Some(map);
        }
    }

    pub fn index_of_mark(&mut self, mark: Mark) -> Option<usize> {
        self.ensure_mark_index();
        self.mark_index.as_ref().unwrap().get(&mark).copied()
    }

    fn ensure_name_cache(&mut self) {
        if self.name_cache.is_none() {
            self.name_cache = Some(NameCache::build(&self.events));
        }
    }

    /// Resolves a user-facing identifier to event indices (SPEC_FULL.md
    /// §4.3); also consults live user assignments, which the name cache
    /// itself doesn't track.
    pub fn resolve_name(&mut self, query: &str) -> Option<Vec<usize>> {
        if let Some(indices) = self.assignments.get(query) {
            return Some(indices.clone());
        }
        let total_len = self.len();
        self.ensure_name_cache();
        self.name_cache.as_ref().unwrap().resolve(query, total_len)
    }

    pub fn allocate_mark(&mut self) -> Mark {
        self.mark_allocator.next()
    }

    pub fn observe_mark(&mut self, mark: Mark) {
        self.mark_allocator.observe(mark);
    }

    pub fn next_blob_sequence(&mut self) -> u64 {
        let seq = self.next_blob_seq;
        self.next_blob_seq += 1;
        seq
    }

    /// Reassigns marks for every blob/commit event starting at `origin`,
    /// rewriting every `M` fileop's blob-mark reference to match
    /// (SPEC_FULL.md §4.3 "Renumbering"). Parent/committish links are
    /// arena indices and need no rewriting.
    pub fn renumber(&mut self, origin: u64) {
        let mut allocator = MarkAllocator::starting_at(origin);
        let mut remap: HashMap<Mark, Mark> = HashMap::new();

        for event in self.events.iter_mut() {
            let mark_slot = match event {
                Event::Blob(b) if !b.mark.is_none() => Some(&mut b.mark),
                Event::Commit(c) if !c.mark.is_none() => Some(&mut c.mark),
                _ => None,
            };
            if let Some(mark) = mark_slot {
                let new_mark = allocator.next();
                remap.insert(*mark, new_mark);
                *mark = new_mark;
            }
        }

        for event in self.events.iter_mut() {
            if let Event::Commit(commit) = event {
                for op in commit.fileops.iter_mut() {
                    if let FileOp::Modify {
                        content: BlobRef::Mark(mark),
                        ..
                    } = op
                    {
                        if let Some(&new_mark) = remap.get(mark) {
                            *mark = new_mark;
                        }
                    }
                }
            }
        }

        self.mark_allocator = allocator;
        self.mark_index = None;
    }

    /// Resolves a `CommitRef` to an event index, for callers that need to
    /// treat callouts and real links uniformly by returning `None` for a
    /// callout.
    pub fn resolve_ref(&self, reference: &CommitRef) -> Option<usize> {
        reference.as_index()
    }
}

impl Default for Repository {
    fn default() -> Self {
        Repository::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::Attribution;
    use crate::event::{Blob, BlobContent, Commit};
    use chrono::{FixedOffset, TimeZone};

    fn attribution() -> Attribution {
        Attribution::new(
            "A U Thor",
            "author@example.com",
            FixedOffset::east_opt(0).unwrap().timestamp_opt(0, 0).unwrap(),
        )
    }

    #[test]
    fn mark_index_resolves_after_rebuild() {
        let mut repo = Repository::new();
        repo.push(Event::Blob(Blob::new(Mark(1), BlobContent::Inline(b"x".to_vec()))));
        assert_eq!(repo.index_of_mark(Mark(1)), Some(0));
    }

    #[test]
    fn renumber_rewrites_marks_and_fileop_refs() {
        let mut repo = Repository::new();
        repo.push(Event::Blob(Blob::new(Mark(5), BlobContent::Inline(b"x".to_vec()))));
        let mut commit = Commit::new(Mark(6), "refs/heads/master".to_string(), attribution());
        commit.fileops.push(FileOp::Modify {
            mode: crate::fileop::FileMode::Regular,
            content: BlobRef::Mark(Mark(5)),
            path: "f".to_string(),
        });
        repo.push(Event::Commit(commit));

        repo.renumber(1);

        let Event::Blob(blob) = &repo.events[0] else { panic!() };
        assert_eq!(blob.mark, Mark(1));
        let Event::Commit(commit) = &repo.events[1] else { panic!() };
        assert_eq!(commit.mark, Mark(2));
        let FileOp::Modify { content: BlobRef::Mark(m), .. } = &commit.fileops[0] else {
            panic!()
        };
        assert_eq!(*m, Mark(1));
    }

    #[test]
    fn sequence_number_resolves_one_origin() {
        let mut repo = Repository::new();
        repo.push(Event::Blob(Blob::new(Mark(1), BlobContent::Inline(b"x".to_vec()))));
        repo.push(Event::Blob(Blob::new(Mark(2), BlobContent::Inline(b"y".to_vec()))));
        assert_eq!(repo.resolve_name("#2"), Some(vec![1]));
    }

    #[test]
    fn permuted_notification_drops_missing_assignment_members() {
        let mut repo = Repository::new();
        repo.assignments.insert("sel".to_string(), vec![0, 1, 2]);
        let mut remap = HashMap::new();
        remap.insert(0usize, 0usize);
        remap.insert(2usize, 1usize);
        repo.notify_permuted("test permutation", &remap);
        assert_eq!(repo.assignments.get("sel"), Some(&vec![0, 1]));
    }
}
