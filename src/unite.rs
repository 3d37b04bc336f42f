//! Unite and graft (SPEC_FULL.md §4.10): cross-repository merge
//! operations built on uniquification (collision-proofing names and
//! marks) and absorption (splicing one repository's events into another).

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::errors::{Result, SurgeryError};
use crate::event::{CommitRef, Event};
use crate::fileop::FileOp;
use crate::mark::Mark;
use crate::repository::Repository;

/// Rewrites every branch/ref name and mark in `repo` to a `color`-tagged
/// variant, so that absorbing several repositories into one can never
/// collide two distinct histories' names or marks (SPEC_FULL.md §4.10).
///
/// The source renders a colored mark as `:N-color`, a string fast-import
/// has no trouble with. `Mark` here is a plain `u64`, so instead of a
/// textual suffix this bands each repository's marks into a range that
/// is, with overwhelming probability, disjoint from every other color's
/// range: `offset = stable_hash(color) * 1e12`. This is a deliberate
/// adaptation documented in DESIGN.md, not a source behavior.
///
/// `persistence`, if given, records which color first claimed a branch
/// name; a later call for that same color skips renaming it again, so
/// repeated uniquify passes over the same repository/color pair are
/// idempotent.
pub fn uniquify(repo: &mut Repository, color: &str, persistence: Option<&mut HashMap<String, String>>) {
    let mut owned = HashMap::new();
    let persistence = persistence.unwrap_or(&mut owned);

    let mut branch_rename: HashMap<String, String> = HashMap::new();
    for event in &repo.events {
        if let Event::Commit(c) = event {
            branch_rename.entry(c.branch.clone()).or_insert_with(|| {
                let already_ours = persistence.get(&c.branch).map(|owner| owner == color).unwrap_or(false);
                if already_ours {
                    c.branch.clone()
                } else {
                    persistence.insert(c.branch.clone(), color.to_string());
                    format!("{}-{color}", c.branch)
                }
            });
        }
    }

    for event in repo.events.iter_mut() {
        match event {
            Event::Commit(c) => {
                if let Some(renamed) = branch_rename.get(&c.branch) {
                    c.branch = renamed.clone();
                }
            }
            Event::Reset(r) => {
                if let Some(renamed) = branch_rename.get(&r.refname) {
                    r.refname = renamed.clone();
                }
            }
            _ => {}
        }
    }

    let offset = color_band(color);
    for event in repo.events.iter_mut() {
        match event {
            Event::Blob(b) if !b.mark.is_none() => b.mark = Mark(b.mark.0 + offset),
            Event::Commit(c) if !c.mark.is_none() => c.mark = Mark(c.mark.0 + offset),
            _ => {}
        }
    }
    for event in repo.events.iter_mut() {
        if let Event::Commit(c) = event {
            for op in c.fileops.iter_mut() {
                if let FileOp::Modify {
                    content: crate::fileop::BlobRef::Mark(m),
                    ..
                } = op
                {
                    if !m.is_none() {
                        m.0 += offset;
                    }
                }
            }
        }
    }
    repo.notify_mutation("uniquify");
}

fn color_band(color: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in color.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % 1_000_000 + 1) * 1_000_000_000_000
}

/// Splices `other`'s events onto the end of `repo`: `repo`'s own leading
/// passthrough frontmatter is left in place, `other`'s leading
/// passthrough frontmatter is inserted right after it, and both
/// repositories' remaining events follow in order (SPEC_FULL.md §4.10).
/// Returns the old→new index mapping for `other`'s events, so a caller
/// that tracked a position in `other` (e.g. its root commit) before the
/// call can find it afterward.
pub fn absorb(repo: &mut Repository, other: Repository) -> Vec<usize> {
    let front_len = repo.events.iter().take_while(|e| matches!(e, Event::Passthrough(_))).count();
    let other_events = other.events;
    let split_at = other_events.iter().take_while(|e| matches!(e, Event::Passthrough(_))).count();

    let repo_len = repo.events.len();
    let other_len = other_events.len();
    let repo_rest_len = repo_len - front_len;

    let repo_remap: Vec<usize> = (0..repo_len).map(|i| if i < front_len { i } else { i + split_at }).collect();
    let other_remap: Vec<usize> = (0..other_len)
        .map(|j| {
            if j < split_at {
                front_len + j
            } else {
                front_len + split_at + repo_rest_len + (j - split_at)
            }
        })
        .collect();

    let mut repo_events: Vec<Option<Event>> = repo.events.drain(..).map(Some).collect();
    for e in repo_events.iter_mut().flatten() {
        crate::dag::remap_event_indices(e, &repo_remap);
    }
    let mut other_events: Vec<Option<Event>> = other_events.into_iter().map(Some).collect();
    for e in other_events.iter_mut().flatten() {
        crate::dag::remap_event_indices(e, &other_remap);
    }

    let total = repo_len + other_len;
    let mut merged: Vec<Option<Event>> = (0..total).map(|_| None).collect();
    for (old_i, slot) in repo_events.into_iter().enumerate() {
        merged[repo_remap[old_i]] = slot;
    }
    for (old_j, slot) in other_events.into_iter().enumerate() {
        merged[other_remap[old_j]] = slot;
    }
    repo.events = merged.into_iter().map(|e| e.expect("every slot filled exactly once")).collect();
    repo.notify_mutation("absorb");

    other_remap
}

fn find_root_commit(repo: &Repository) -> Option<usize> {
    repo.events.iter().position(|e| matches!(e, Event::Commit(c) if c.is_root()))
}

fn first_commit_timestamp(repo: &Repository) -> Option<DateTime<FixedOffset>> {
    repo.events.iter().find_map(|e| match e {
        Event::Commit(c) => Some(c.committer.date),
        _ => None,
    })
}

fn most_recent_before(repo: &Repository, ts: DateTime<FixedOffset>, exclude: usize) -> Option<usize> {
    repo.events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            Event::Commit(c) if i != exclude && c.committer.date < ts => Some((i, c.committer.date)),
            _ => None,
        })
        .max_by_key(|(_, date)| *date)
        .map(|(i, _)| i)
}

/// Merges several repositories, earliest-first by first-commit
/// timestamp, each uniquified under its own color before being absorbed
/// into a fresh union. Every non-first root is reparented onto the most
/// recent union commit strictly earlier than it; `prune` additionally
/// prepends a delete for every path visible in that ancestor's manifest
/// (SPEC_FULL.md §4.10).
pub fn unite(repos: Vec<Repository>, prune: bool) -> Result<Repository> {
    let mut repos = repos;
    repos.sort_by(|a, b| first_commit_timestamp(a).cmp(&first_commit_timestamp(b)));

    let mut persistence = HashMap::new();
    let mut union = Repository::new();
    for (i, mut r) in repos.into_iter().enumerate() {
        let root_local = find_root_commit(&r);
        let color = format!("u{i}");
        uniquify(&mut r, &color, Some(&mut persistence));
        let remap = absorb(&mut union, r);

        if i == 0 {
            continue;
        }
        let Some(local_root) = root_local else { continue };
        let new_root = remap[local_root];
        let root_ts = match &union.events[new_root] {
            Event::Commit(c) => c.committer.date,
            _ => continue,
        };
        let Some(ancestor) = most_recent_before(&union, root_ts, new_root) else {
            continue;
        };

        if prune {
            let manifest = crate::manifest::commit_manifest(&mut union, ancestor)?;
            let mut ops: Vec<FileOp> = manifest.pathnames().into_iter().map(|p| FileOp::Delete { path: p }).collect();
            if let Event::Commit(c) = &mut union.events[new_root] {
                ops.append(&mut c.fileops);
                let (simplified, _) = crate::fileop::simplify(ops)?;
                c.fileops = simplified;
            }
        }
        crate::dag::set_parents(&mut union, new_root, vec![CommitRef::Index(ancestor)])?;
    }
    Ok(union)
}

/// Attaches `other` onto `repo` at `graft_point` (SPEC_FULL.md §4.10):
/// uniquify, absorb, then make the absorbed root a child of the graft
/// point. `prune` prepends a `deleteall` to the grafted root. Any
/// callout left unresolved after absorption is a fatal error.
pub fn graft(repo: &mut Repository, mut other: Repository, graft_point: Option<usize>, color: &str, prune: bool) -> Result<()> {
    let other_root = find_root_commit(&other);
    uniquify(&mut other, color, None);
    let remap = absorb(repo, other);

    if let Some(point) = graft_point {
        if let Some(local_root) = other_root {
            let new_root = remap[local_root];
            if prune {
                if let Event::Commit(c) = &mut repo.events[new_root] {
                    c.fileops.insert(0, FileOp::DeleteAll);
                }
            }
            crate::dag::set_parents(repo, new_root, vec![CommitRef::Index(point)])?;
        }
    }

    resolve_callouts(repo)
}

/// Resolves every `CommitRef::Callout` left in the repository by name
/// lookup; an unresolved one is fatal (SPEC_FULL.md §4.10).
fn resolve_callouts(repo: &mut Repository) -> Result<()> {
    let n = repo.len();
    for i in 0..n {
        let parent_callouts: Vec<(usize, String)> = match &repo.events[i] {
            Event::Commit(c) => c
                .parents
                .iter()
                .enumerate()
                .filter_map(|(pi, p)| match p {
                    CommitRef::Callout(name) => Some((pi, name.clone())),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        for (pi, name) in parent_callouts {
            let target = repo
                .resolve_name(&name)
                .and_then(|indices| indices.first().copied())
                .ok_or_else(|| SurgeryError::command(format!("unresolved callout `{name}` after graft")))?;
            if let Event::Commit(c) = &mut repo.events[i] {
                c.parents[pi] = CommitRef::Index(target);
            }
        }

        let tag_callout = match &repo.events[i] {
            Event::Tag(t) => match &t.target {
                CommitRef::Callout(name) => Some(name.clone()),
                _ => None,
            },
            _ => None,
        };
        if let Some(name) = tag_callout {
            let target = repo
                .resolve_name(&name)
                .and_then(|indices| indices.first().copied())
                .ok_or_else(|| SurgeryError::command(format!("unresolved callout `{name}` after graft")))?;
            if let Event::Tag(t) = &mut repo.events[i] {
                t.target = CommitRef::Index(target);
            }
        }

        let reset_callout = match &repo.events[i] {
            Event::Reset(r) => match &r.target {
                Some(CommitRef::Callout(name)) => Some(name.clone()),
                _ => None,
            },
            _ => None,
        };
        if let Some(name) = reset_callout {
            let target = repo
                .resolve_name(&name)
                .and_then(|indices| indices.first().copied())
                .ok_or_else(|| SurgeryError::command(format!("unresolved callout `{name}` after graft")))?;
            if let Event::Reset(r) = &mut repo.events[i] {
                r.target = Some(CommitRef::Index(target));
            }
        }
    }
    Ok(())
}
