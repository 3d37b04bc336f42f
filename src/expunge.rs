//! Expunge engine (SPEC_FULL.md §4.9): splits a repository by path,
//! producing a derived repository holding the matching content while the
//! original loses it.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::errors::{Result, SurgeryError};
use crate::event::{Commit, CommitRef, Event};
use crate::fileop::{BlobRef, FileOp};
use crate::repository::Repository;

/// Skips empty-commit tagification in both repositories afterwards
/// (SPEC_FULL.md §4.9 step 1).
#[derive(Debug, Clone, Default)]
pub struct ExpungePolicy {
    pub notagify: bool,
}

/// One path matcher: a literal path (matched exactly, by way of an
/// escaped regex) or a `/regex/` pattern.
#[derive(Debug, Clone)]
pub enum MatchPattern {
    Literal(String),
    Regex(String),
}

/// Compiles every matcher into a single alternation (SPEC_FULL.md §4.9
/// step 1).
pub fn compile_matchers(patterns: &[MatchPattern]) -> Result<Regex> {
    let parts: Vec<String> = patterns
        .iter()
        .map(|p| match p {
            MatchPattern::Literal(s) => regex::escape(s),
            MatchPattern::Regex(s) => format!("(?:{s})"),
        })
        .collect();
    let combined = parts.join("|");
    Regex::new(&combined).map_err(|e| SurgeryError::command(format!("bad path matcher: {e}")))
}

/// Splits `repo` by `patterns`, returning the derived repository. `repo`
/// is mutated in place to lose the matching content. An empty `selection`
/// means "every commit".
pub fn expunge(
    repo: &mut Repository,
    selection: &[usize],
    patterns: &[MatchPattern],
    policy: &ExpungePolicy,
) -> Result<Repository> {
    let matcher = compile_matchers(patterns)?;

    let candidates: Vec<usize> = if selection.is_empty() {
        (0..repo.len()).filter(|&i| matches!(repo.events[i], Event::Commit(_))).collect()
    } else {
        selection.to_vec()
    };
    let mut ordered = candidates;
    ordered.sort_unstable();
    ordered.dedup();

    // Pass 1: decide, per selected commit and in chronological order, which
    // fileops move to the derived side and how the original's copy is
    // rewritten. `matched_paths` grows as renames carry a matched path
    // forward, so a later commit's plain `M`/`D` on that path is still
    // recognized even though it no longer matches the literal pattern
    // (SPEC_FULL.md §4.9 step 2).
    let mut matched_paths: HashSet<String> = HashSet::new();
    let mut plans: Vec<(usize, Vec<FileOp>, Vec<FileOp>)> = Vec::new();

    for &idx in &ordered {
        let fileops = match &repo.events[idx] {
            Event::Commit(c) => c.fileops.clone(),
            _ => {
                return Err(SurgeryError::command_at("expunge selection must name commits", idx));
            }
        };
        let mut derived_ops = Vec::new();
        let mut original_ops = Vec::new();

        for op in fileops {
            match &op {
                FileOp::Modify { path, .. } | FileOp::Delete { path } => {
                    if matcher.is_match(path) || matched_paths.contains(path) {
                        derived_ops.push(op);
                    } else {
                        original_ops.push(op);
                    }
                }
                FileOp::Rename { src, tgt } => {
                    let src_hit = matcher.is_match(src) || matched_paths.contains(src);
                    let tgt_hit = matcher.is_match(tgt) || matched_paths.contains(tgt);
                    if src_hit {
                        // Follows the rename: the moved content stays
                        // inside the matched domain under its new name.
                        matched_paths.insert(tgt.clone());
                        derived_ops.push(op);
                    } else if tgt_hit {
                        // The rename lands on a matched path from an
                        // unmatched source: the original repository keeps
                        // neither name, so its view of this op is a plain
                        // delete of the source (the content leaves the
                        // original's tree here, same as real history).
                        matched_paths.insert(tgt.clone());
                        original_ops.push(FileOp::Delete { path: src.clone() });
                    } else {
                        original_ops.push(op);
                    }
                }
                FileOp::Copy { src, tgt } => {
                    let src_hit = matcher.is_match(src) || matched_paths.contains(src);
                    let tgt_hit = matcher.is_match(tgt) || matched_paths.contains(tgt);
                    if src_hit || tgt_hit {
                        matched_paths.insert(tgt.clone());
                        derived_ops.push(op.clone());
                        if !src_hit {
                            // The source path is unmatched and a copy
                            // never removes it, so the original keeps it.
                            original_ops.push(op);
                        }
                    } else {
                        original_ops.push(op);
                    }
                }
                FileOp::DeleteAll => {
                    derived_ops.push(FileOp::DeleteAll);
                    original_ops.push(FileOp::DeleteAll);
                }
            }
        }

        plans.push((idx, derived_ops, original_ops));
    }

    // Rewrite the original's fileops in place.
    for (idx, _, original_ops) in &plans {
        if let Event::Commit(c) = &mut repo.events[*idx] {
            c.fileops = original_ops.clone();
            c.invalidate_manifest();
        }
    }

    // Carry frontmatter passthroughs to the derived repository
    // (SPEC_FULL.md §4.9 step 4).
    let mut derived = Repository::new();
    for event in &repo.events {
        match event {
            Event::Passthrough(p) => {
                derived.push(Event::Passthrough(p.clone()));
            }
            _ => break,
        }
    }

    // Pass 2: clone each affected commit into the derived repository with
    // only its matching fileops, clone referenced blobs, and reconstruct
    // parent links by walking the original parent chain until an ancestor
    // was also cloned (SPEC_FULL.md §4.9 steps 3, 5).
    let mut old_to_new: HashMap<usize, usize> = HashMap::new();

    for (idx, derived_ops, _) in &plans {
        if derived_ops.is_empty() {
            continue;
        }
        let (mark, branch, committer, authors, comment, properties, parents, legacy_id) = match &repo.events[*idx] {
            Event::Commit(c) => (
                c.mark,
                c.branch.clone(),
                c.committer.clone(),
                c.authors.clone(),
                c.comment.clone(),
                c.properties.clone(),
                c.parents.clone(),
                c.legacy_id.clone(),
            ),
            _ => continue,
        };

        let mut clone = Commit::new(mark, branch, committer);
        clone.authors = authors;
        clone.comment = comment;
        clone.properties = properties;
        clone.legacy_id = legacy_id;
        clone.fileops = derived_ops.clone();

        for op in &clone.fileops {
            if let FileOp::Modify { content: BlobRef::Mark(m), .. } = op {
                if derived.index_of_mark(*m).is_none() {
                    if let Some(src_idx) = repo.index_of_mark(*m) {
                        if let Event::Blob(b) = &repo.events[src_idx] {
                            derived.push(Event::Blob(b.clone()));
                        }
                    }
                }
            }
        }

        let mut cursor = parents.first().and_then(CommitRef::as_index);
        let mut ancestor_link = None;
        while let Some(p) = cursor {
            if let Some(&new_p) = old_to_new.get(&p) {
                ancestor_link = Some(new_p);
                break;
            }
            cursor = match &repo.events[p] {
                Event::Commit(c) => c.first_parent().and_then(CommitRef::as_index),
                _ => None,
            };
        }
        if let Some(new_p) = ancestor_link {
            clone.parents.push(CommitRef::Index(new_p));
        }

        let new_index = derived.push(Event::Commit(clone));
        if let Some(new_p) = ancestor_link {
            if let Event::Commit(pc) = &mut derived.events[new_p] {
                pc.children.push(new_index);
            }
        }
        old_to_new.insert(*idx, new_index);
    }

    // Remove (by tagification) commits left with zero fileops in both
    // repositories, unless they are roots or `--notagify` was given
    // (SPEC_FULL.md §4.9 step 6).
    if !policy.notagify {
        let mut warnings = Vec::new();
        crate::squash::tagify_empty_commits(repo, &mut warnings)?;
        crate::squash::tagify_empty_commits(&mut derived, &mut warnings)?;
        for w in warnings {
            tracing::warn!(w, "{}", crate::errors::colorize_warning("expunge: empty-commit tagification"));
        }
    }

    // GC orphaned blobs in the original (SPEC_FULL.md §4.9 step 7).
    crate::squash::gc_orphaned_blobs(repo);

    Ok(derived)
}
