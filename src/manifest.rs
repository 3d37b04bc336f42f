//! Manifest engine (SPEC_FULL.md §4.7): lazily builds a commit's
//! path→entry tree from its first-parent chain and fileops, caching the
//! result and invalidating it (and every descendant's) on structural
//! change.

use std::collections::VecDeque;

use crate::errors::{Result, SurgeryError};
use crate::event::{Event, ManifestEntry};
use crate::fileop::FileOp;
use crate::pathmap::PathMap;
use crate::repository::Repository;

/// Applies one fileop to `target`, which holds the manifest as of the
/// start of the owning commit's fileop list, mutated in place as ops are
/// applied in stored order (matching fast-import's within-commit
/// sequential-apply semantics for `C`/`R`).
fn apply_fileop(target: &mut PathMap<ManifestEntry>, op: &FileOp) {
    match op {
        FileOp::Modify { mode, content, path } => {
            target.set(
                path,
                ManifestEntry {
                    mode: *mode,
                    content: content.clone(),
                },
            );
        }
        FileOp::Delete { path } => target.remove(path),
        FileOp::Copy { src, tgt } => {
            let snapshot = target.snapshot();
            target.copy_from(tgt, &snapshot, src);
        }
        FileOp::Rename { src, tgt } => {
            let snapshot = target.snapshot();
            target.copy_from(tgt, &snapshot, src);
            target.remove(src);
        }
        FileOp::DeleteAll => *target = PathMap::new(),
    }
}

/// Returns the manifest for the commit at `index`, building (and caching)
/// any ancestors on its first-parent chain that aren't already cached
/// (SPEC_FULL.md §4.7, steps 1-3).
pub fn commit_manifest(repo: &mut Repository, index: usize) -> Result<PathMap<ManifestEntry>> {
    if !matches!(repo.events[index], Event::Commit(_)) {
        return Err(SurgeryError::invariant("commit_manifest called on a non-commit event"));
    }

    let mut stack = Vec::new();
    let mut cursor = Some(index);
    let mut base: PathMap<ManifestEntry> = PathMap::new();

    while let Some(i) = cursor {
        match &repo.events[i] {
            Event::Commit(c) => {
                if let Some(cached) = &c.manifest_cache {
                    base = cached.snapshot();
                    break;
                }
                stack.push(i);
                cursor = c.first_parent().and_then(|p| p.as_index());
            }
            _ => return Err(SurgeryError::invariant("manifest walk hit a non-commit ancestor")),
        }
    }

    let mut manifest = base;
    for i in stack.into_iter().rev() {
        let fileops = match &repo.events[i] {
            Event::Commit(c) => c.fileops.clone(),
            _ => unreachable!("manifest stack only ever holds commit indices"),
        };
        let mut next = manifest.snapshot();
        for op in &fileops {
            apply_fileop(&mut next, op);
        }
        manifest = next;
        if let Event::Commit(c) = &mut repo.events[i] {
            c.manifest_cache = Some(manifest.snapshot());
        }
    }

    Ok(manifest)
}

/// Walks the descendant graph from `index`, nulling every cached manifest
/// reached; a descendant with an already-null cache stops that branch of
/// the walk (SPEC_FULL.md §4.7's invalidation rule, invariant 5).
pub fn invalidate_descendants(repo: &mut Repository, index: usize) {
    let Some(children) = (match &mut repo.events[index] {
        Event::Commit(c) => {
            c.manifest_cache = None;
            Some(c.children.clone())
        }
        _ => None,
    }) else {
        return;
    };

    let mut queue: VecDeque<usize> = children.into_iter().collect();
    while let Some(i) = queue.pop_front() {
        let (had_cache, children) = match &mut repo.events[i] {
            Event::Commit(c) => {
                let had = c.manifest_cache.is_some();
                c.manifest_cache = None;
                (had, c.children.clone())
            }
            _ => (false, Vec::new()),
        };
        if had_cache {
            queue.extend(children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::Attribution;
    use crate::event::{Blob, BlobContent, Commit, CommitRef};
    use crate::fileop::{BlobRef, FileMode};
    use crate::mark::Mark;
    use chrono::{FixedOffset, TimeZone};

    fn attribution() -> Attribution {
        Attribution::new(
            "A U Thor",
            "author@example.com",
            FixedOffset::east_opt(0).unwrap().timestamp_opt(0, 0).unwrap(),
        )
    }

    fn push_blob(repo: &mut Repository, mark: u64, content: &[u8]) {
        let mut blob = Blob::new(Mark(mark), BlobContent::Inline(Vec::new()));
        blob.set_inline_content(content.to_vec());
        repo.push(Event::Blob(blob));
    }

    #[test]
    fn manifest_reflects_first_parent_chain() {
        let mut repo = Repository::new();
        push_blob(&mut repo, 1, b"one");
        let mut root = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        root.fileops.push(FileOp::Modify {
            mode: FileMode::Regular,
            content: BlobRef::Mark(Mark(1)),
            path: "f".to_string(),
        });
        let root_index = repo.push(Event::Commit(root));

        push_blob(&mut repo, 3, b"two");
        let mut child = Commit::new(Mark(4), "refs/heads/master".to_string(), attribution());
        child.parents.push(CommitRef::Index(root_index));
        child.fileops.push(FileOp::Modify {
            mode: FileMode::Regular,
            content: BlobRef::Mark(Mark(3)),
            path: "g".to_string(),
        });
        let child_index = repo.push(Event::Commit(child));

        let manifest = commit_manifest(&mut repo, child_index).unwrap();
        assert!(manifest.get("f").is_some());
        assert!(manifest.get("g").is_some());
    }

    #[test]
    fn rename_within_a_commit_moves_the_entry() {
        let mut repo = Repository::new();
        push_blob(&mut repo, 1, b"one");
        let mut commit = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        commit.fileops.push(FileOp::Modify {
            mode: FileMode::Regular,
            content: BlobRef::Mark(Mark(1)),
            path: "a".to_string(),
        });
        commit.fileops.push(FileOp::Rename {
            src: "a".to_string(),
            tgt: "b".to_string(),
        });
        let index = repo.push(Event::Commit(commit));

        let manifest = commit_manifest(&mut repo, index).unwrap();
        assert!(manifest.get("a").is_none());
        assert!(manifest.get("b").is_some());
    }

    #[test]
    fn invalidation_stops_at_an_already_null_descendant() {
        let mut repo = Repository::new();
        let root_index = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        let mut child = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        child.parents.push(CommitRef::Index(root_index));
        let child_index = repo.push(Event::Commit(child));
        if let Event::Commit(c) = &mut repo.events[root_index] {
            c.children.push(child_index);
            c.manifest_cache = Some(PathMap::new());
        }
        // child cache already null; invalidation should clear root and stop.
        invalidate_descendants(&mut repo, root_index);
        let Event::Commit(c) = &repo.events[root_index] else { panic!() };
        assert!(c.manifest_cache.is_none());
    }
}
