//! Delete/squash engine (SPEC_FULL.md §4.8): removes selected commits from
//! the DAG, optionally carrying their fileops forward to a child or back
//! to a parent, migrating any tag/reset attachments, and garbage
//! collecting blobs the deletion orphans.

use std::collections::{HashMap, HashSet};

use crate::errors::{Result, SurgeryError};
use crate::event::{CommitRef, Event, Tag};
use crate::fileop::{BlobRef, FileOp};
use crate::mark::Mark;
use crate::repository::Repository;

/// The policy flags a caller selects for one squash run (SPEC_FULL.md
/// §4.8). `delete` forces `pushforward`/`pushback` off regardless of what
/// else is set, matching `--delete`'s "just remove it" contract.
#[derive(Debug, Clone)]
pub struct SquashPolicy {
    pub delete: bool,
    pub pushforward: bool,
    pub pushback: bool,
    pub tagback: bool,
    pub tagforward: bool,
    pub tagify: bool,
    pub empty_only: bool,
    pub coalesce: bool,
    pub complain: bool,
    pub quiet: bool,
}

impl Default for SquashPolicy {
    fn default() -> Self {
        SquashPolicy {
            delete: false,
            pushforward: true,
            pushback: false,
            tagback: false,
            tagforward: true,
            tagify: false,
            empty_only: false,
            coalesce: false,
            complain: false,
            quiet: false,
        }
    }
}

/// Runs a squash/delete pass over `selection` under `policy`, returning
/// any non-fatal warnings raised along the way. Steps 1-6 of SPEC_FULL.md
/// §4.8, in ascending-index order; deletions and fileop canonicalization
/// happen in one pass after every selected commit has been processed.
pub fn squash(repo: &mut Repository, selection: &[usize], policy: &SquashPolicy) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let mut ordered: Vec<usize> = selection.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    let do_pushforward = policy.pushforward && !policy.delete;
    let do_pushback = policy.pushback && !policy.delete;

    for &c_idx in &ordered {
        if !matches!(repo.events.get(c_idx), Some(Event::Commit(_))) {
            return Err(SurgeryError::command_at("squash selection must name commits", c_idx));
        }

        if policy.empty_only {
            let fileops_empty = match &repo.events[c_idx] {
                Event::Commit(c) => c.fileops.is_empty(),
                _ => false,
            };
            if !fileops_empty && !do_pushforward && !do_pushback {
                return Err(SurgeryError::command_at(
                    "--empty-only: commit has fileops and neither --pushforward nor --pushback is set",
                    c_idx,
                ));
            }
        }

        let (parents, children, attachments, fileops, comment) = match &repo.events[c_idx] {
            Event::Commit(c) => (
                c.parents.clone(),
                c.children.clone(),
                c.attachments.clone(),
                c.fileops.clone(),
                c.comment.clone(),
            ),
            _ => unreachable!("checked above"),
        };

        let redirect = if policy.tagback {
            parents.iter().find_map(CommitRef::as_index)
        } else if policy.tagforward {
            children.first().copied()
        } else {
            None
        };

        // Step 2: splice the deleted commit out of every child's parent
        // list, substituting its own parents at that slot.
        for &child_idx in &children {
            let child_parents = match &repo.events[child_idx] {
                Event::Commit(c) => c.parents.clone(),
                _ => continue,
            };
            let Some(pos) = child_parents.iter().position(|p| p.as_index() == Some(c_idx)) else {
                continue;
            };
            let was_first = pos == 0;

            let mut new_parents = child_parents.clone();
            new_parents.splice(pos..pos + 1, parents.clone());
            crate::dag::set_parents(repo, child_idx, new_parents)?;

            if was_first && do_pushforward {
                if let Event::Commit(child) = &mut repo.events[child_idx] {
                    let mut combined = fileops.clone();
                    combined.append(&mut child.fileops);
                    child.fileops = combined;
                    child.comment = compose_comments(&comment, &child.comment);
                }
            }
            if was_first && parents.is_empty() {
                // The deleted commit was a root; its former child now has
                // no ancestry to inherit a tree from, so it must start
                // from an empty one (SPEC_FULL.md §4.8, boundary case).
                if let Event::Commit(child) = &mut repo.events[child_idx] {
                    child.fileops.insert(0, FileOp::DeleteAll);
                }
            }
        }

        // Step 4: carry fileops and comment back to the primary parent.
        if do_pushback {
            if let Some(primary) = parents.first().and_then(CommitRef::as_index) {
                let mut blob_marks = Vec::new();
                for op in &fileops {
                    if let FileOp::Modify { content: BlobRef::Mark(m), .. } = op {
                        blob_marks.push(*m);
                    }
                }
                if let Event::Commit(parent_commit) = &mut repo.events[primary] {
                    parent_commit.fileops.extend(fileops.clone());
                    parent_commit.comment = compose_comments(&parent_commit.comment, &comment);
                    parent_commit.invalidate_manifest();
                }
                relocate_blobs_before(repo, &blob_marks, primary);
                verify_pushback_blob_order(repo)?;
            } else if policy.complain && !policy.quiet {
                warnings.push(format!(
                    "--pushback skipped commit at #{}: no real parent to push to",
                    c_idx + 1
                ));
            }
        }

        // Step 5: migrate this commit's own tag/reset attachments (or, with
        // no redirect target, drop them in tagify mode and hard-error
        // otherwise, per SPEC_FULL.md §4.8's "mark them for deletion in
        // tagify mode with an empty target" clause).
        for &att_idx in &attachments {
            match redirect {
                Some(target) => {
                    match &mut repo.events[att_idx] {
                        Event::Tag(t) => t.target = CommitRef::Index(target),
                        Event::Reset(r) => r.target = Some(CommitRef::Index(target)),
                        _ => {}
                    }
                    if let Event::Commit(tc) = &mut repo.events[target] {
                        if !tc.attachments.contains(&att_idx) {
                            tc.attachments.push(att_idx);
                        }
                    }
                }
                None if policy.tagify => {
                    repo.events[att_idx].set_delete_flag(true);
                    if !policy.quiet {
                        warnings.push(format!(
                            "attachment at #{} dropped: deleted commit at #{} had no redirect target",
                            att_idx + 1,
                            c_idx + 1
                        ));
                    }
                }
                None => {
                    return Err(SurgeryError::command_at(
                        format!(
                            "attachment at #{} cannot be migrated: deleted commit at #{} has no redirect target",
                            att_idx + 1,
                            c_idx + 1
                        ),
                        c_idx,
                    ));
                }
            }
        }

        // Step 6: mark for removal.
        if let Event::Commit(c) = &mut repo.events[c_idx] {
            c.delete = true;
        }
    }

    let remap = sweep_deleted(repo);
    repo.notify_permuted("squash deletion sweep", &remap);

    for event in repo.events.iter_mut() {
        if let Event::Commit(c) = event {
            if policy.coalesce {
                coalesce_duplicate_modifies(&mut c.fileops);
            }
            let (simplified, warns) = crate::fileop::simplify(std::mem::take(&mut c.fileops))?;
            c.fileops = simplified;
            c.invalidate_manifest();
            warnings.extend(warns);
        }
    }

    if policy.tagify {
        tagify_empty_commits(repo, &mut warnings)?;
    }

    gc_orphaned_blobs(repo);

    Ok(warnings)
}

/// Composes two comments end to end; an empty side contributes nothing
/// (SPEC_FULL.md §4.8's "compose the comments" step).
fn compose_comments(first: &str, second: &str) -> String {
    match (first.trim().is_empty(), second.trim().is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first}\n{second}"),
    }
}

/// Removes every `delete`-flagged event, remapping all index-valued
/// references (parents, children, attachments, committish targets) to
/// match. `squash` never leaves a deleted commit's attachments dangling:
/// every attachment is either migrated to a redirect target before this
/// runs, or marked deleted itself (tagify mode) so it is swept alongside
/// its commit. Any index that still fails to remap here is a genuine
/// leftover structural reference, not an expected case.
pub(crate) fn sweep_deleted(repo: &mut Repository) -> HashMap<usize, usize> {
    let n = repo.events.len();
    let mut remap = HashMap::new();
    let mut survivors = Vec::with_capacity(n);
    for (i, event) in repo.events.iter().enumerate() {
        if event.delete_flag() == Some(true) {
            continue;
        }
        remap.insert(i, survivors.len());
        survivors.push(i);
    }

    let mut drained: Vec<Option<Event>> = repo.events.drain(..).map(Some).collect();
    let mut reordered = Vec::with_capacity(survivors.len());
    for &old in &survivors {
        reordered.push(drained[old].take().expect("each survivor index visited once"));
    }
    for event in reordered.iter_mut() {
        remap_event_indices_lenient(event, &remap);
    }
    repo.events = reordered;
    remap
}

fn remap_event_indices_lenient(event: &mut Event, remap: &HashMap<usize, usize>) {
    let get = |i: usize| remap.get(&i).copied().unwrap_or(i);
    match event {
        Event::Commit(c) => {
            for parent in c.parents.iter_mut() {
                if let CommitRef::Index(p) = parent {
                    *p = get(*p);
                }
            }
            for child in c.children.iter_mut() {
                *child = get(*child);
            }
            for attachment in c.attachments.iter_mut() {
                *attachment = get(*attachment);
            }
        }
        Event::Tag(t) => {
            if let CommitRef::Index(p) = &mut t.target {
                *p = get(*p);
            }
        }
        Event::Reset(r) => {
            if let Some(CommitRef::Index(p)) = &mut r.target {
                *p = get(*p);
            }
        }
        _ => {}
    }
}

/// Moves the blobs named by `marks` to sit immediately before `target` in
/// the event sequence, preserving their relative order, then remaps every
/// index-valued reference in the repository to match the new positions.
/// Safe because no structural link (parent/child/committish) ever
/// references a blob by arena index; blobs are addressed only by mark.
fn relocate_blobs_before(repo: &mut Repository, marks: &[Mark], target: usize) {
    let blob_indices: Vec<usize> = marks.iter().filter_map(|&m| repo.index_of_mark(m)).collect();
    if blob_indices.is_empty() {
        return;
    }
    let blob_set: HashSet<usize> = blob_indices.iter().copied().collect();

    let n = repo.events.len();
    let mut new_order = Vec::with_capacity(n);
    for i in 0..n {
        if blob_set.contains(&i) {
            continue;
        }
        if i == target {
            new_order.extend(blob_indices.iter().copied());
        }
        new_order.push(i);
    }

    let mut remap = vec![0usize; n];
    for (new_index, &old_index) in new_order.iter().enumerate() {
        remap[old_index] = new_index;
    }

    let mut drained: Vec<Option<Event>> = repo.events.drain(..).map(Some).collect();
    let mut reordered = Vec::with_capacity(n);
    for &old in &new_order {
        reordered.push(drained[old].take().expect("each index visited once"));
    }
    for event in reordered.iter_mut() {
        crate::dag::remap_event_indices(event, &remap);
    }
    repo.events = reordered;
    repo.notify_mutation("pushback: relocate blobs before parent");
}

/// Pushback is only correct if, walking the event list from the end
/// backward, blob marks strictly decrease (SPEC_FULL.md §9 open
/// question, decided here: relocation must never reverse the allocation
/// order marks were handed out in).
fn verify_pushback_blob_order(repo: &Repository) -> Result<()> {
    let mut last_mark: Option<Mark> = None;
    for event in repo.events.iter().rev() {
        if let Event::Blob(b) = event {
            if let Some(last) = last_mark {
                if b.mark >= last {
                    return Err(SurgeryError::invariant(
                        "pushback relocation left blob marks out of order",
                    ));
                }
            }
            last_mark = Some(b.mark);
        }
    }
    Ok(())
}

/// `--coalesce`: keeps only the last `M` for each path in a commit's
/// fileop list, overriding `fileop::simplify`'s normal "ordering of
/// duplicate modifies is significant" rule (SPEC_FULL.md §4.8).
fn coalesce_duplicate_modifies(ops: &mut Vec<FileOp>) {
    let mut last_for_path: HashMap<String, usize> = HashMap::new();
    for (i, op) in ops.iter().enumerate() {
        if let FileOp::Modify { path, .. } = op {
            last_for_path.insert(path.clone(), i);
        }
    }
    let drained: Vec<FileOp> = ops.drain(..).collect();
    let mut kept = Vec::with_capacity(drained.len());
    for (i, op) in drained.into_iter().enumerate() {
        match &op {
            FileOp::Modify { path, .. } if last_for_path.get(path) != Some(&i) => {}
            _ => kept.push(op),
        }
    }
    *ops = kept;
}

/// `--tagify`: replaces a surviving commit left with no fileops by a tag
/// pointing at its first parent, splicing its children onto that parent
/// directly (SPEC_FULL.md §4.8). A commit with no children becomes a
/// `tipdelete-<branch>` tag instead of an `emptycommit-*` one.
pub(crate) fn tagify_empty_commits(repo: &mut Repository, warnings: &mut Vec<String>) -> Result<()> {
    let candidates: Vec<usize> = repo
        .events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            Event::Commit(c) if c.fileops.is_empty() && !c.delete => Some(i),
            _ => None,
        })
        .collect();

    for idx in candidates {
        let (parents, children, attachments, committer, comment, legacy_id, mark, branch) =
            match &repo.events[idx] {
                Event::Commit(c) => (
                    c.parents.clone(),
                    c.children.clone(),
                    c.attachments.clone(),
                    c.committer.clone(),
                    c.comment.clone(),
                    c.legacy_id.clone(),
                    c.mark,
                    c.branch.clone(),
                ),
                _ => continue,
            };

        let name = if children.is_empty() {
            format!("tipdelete-{}", branch.rsplit('/').next().unwrap_or(&branch))
        } else if let Some(legacy) = &legacy_id {
            format!("emptycommit-{legacy}")
        } else if !mark.is_none() {
            format!("emptycommit-mark{}", mark.0)
        } else {
            format!("emptycommit-index{}", idx + 1)
        };

        for &child_idx in &children {
            let child_parents = match &repo.events[child_idx] {
                Event::Commit(c) => c.parents.clone(),
                _ => continue,
            };
            let Some(pos) = child_parents.iter().position(|p| p.as_index() == Some(idx)) else {
                continue;
            };
            let mut new_parents = child_parents.clone();
            new_parents.splice(pos..pos + 1, parents.clone());
            crate::dag::set_parents(repo, child_idx, new_parents)?;
        }

        match parents.first().and_then(CommitRef::as_index) {
            Some(parent_idx) => {
                let tag = Tag::new(name, CommitRef::Index(parent_idx), committer, comment);
                repo.events[idx] = Event::Tag(tag);
                if let Event::Commit(pc) = &mut repo.events[parent_idx] {
                    if !pc.attachments.contains(&idx) {
                        pc.attachments.push(idx);
                    }
                }
                for &att in &attachments {
                    match &mut repo.events[att] {
                        Event::Tag(t) => t.target = CommitRef::Index(parent_idx),
                        Event::Reset(r) => r.target = Some(CommitRef::Index(parent_idx)),
                        _ => {}
                    }
                }
            }
            None => {
                warnings.push(format!(
                    "cannot tagify root commit at #{}: no parent to attach the tag to",
                    idx + 1
                ));
            }
        }
    }
    Ok(())
}

/// Soft-deletes every blob no surviving commit's `M` fileop references,
/// then sweeps them out.
pub(crate) fn gc_orphaned_blobs(repo: &mut Repository) {
    let mut referenced: HashSet<Mark> = HashSet::new();
    for event in &repo.events {
        if let Event::Commit(c) = event {
            for op in &c.fileops {
                if let FileOp::Modify { content: BlobRef::Mark(m), .. } = op {
                    referenced.insert(*m);
                }
            }
        }
    }
    let mut any = false;
    for event in repo.events.iter_mut() {
        if let Event::Blob(b) = event {
            if !referenced.contains(&b.mark) {
                b.delete = true;
                any = true;
            }
        }
    }
    if any {
        let remap = sweep_deleted(repo);
        repo.notify_permuted("blob garbage collection", &remap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::Attribution;
    use crate::event::{Blob, BlobContent, Commit, Reset};
    use crate::fileop::FileMode;
    use chrono::{FixedOffset, TimeZone};

    fn attribution() -> Attribution {
        Attribution::new(
            "A U Thor",
            "author@example.com",
            FixedOffset::east_opt(0).unwrap().timestamp_opt(0, 0).unwrap(),
        )
    }

    fn push_blob(repo: &mut Repository, mark: u64, content: &[u8]) -> usize {
        let mut blob = Blob::new(Mark(mark), BlobContent::Inline(Vec::new()));
        blob.set_inline_content(content.to_vec());
        repo.push(Event::Blob(blob))
    }

    fn modify(mark: u64, path: &str) -> FileOp {
        FileOp::Modify {
            mode: FileMode::Regular,
            content: BlobRef::Mark(Mark(mark)),
            path: path.to_string(),
        }
    }

    #[test]
    fn pushforward_default_carries_fileops_to_child() {
        let mut repo = Repository::new();
        push_blob(&mut repo, 1, b"one");
        let mut root = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        root.comment = "root comment".to_string();
        root.fileops.push(modify(1, "f"));
        let root_index = repo.push(Event::Commit(root));

        push_blob(&mut repo, 3, b"two");
        let mut child = Commit::new(Mark(4), "refs/heads/master".to_string(), attribution());
        child.comment = "child comment".to_string();
        child.parents.push(CommitRef::Index(root_index));
        child.fileops.push(modify(3, "g"));
        let child_index = repo.push(Event::Commit(child));
        if let Event::Commit(c) = &mut repo.events[root_index] {
            c.children.push(child_index);
        }

        let policy = SquashPolicy::default();
        let warnings = squash(&mut repo, &[root_index], &policy).unwrap();
        assert!(warnings.is_empty());

        assert_eq!(repo.len(), 3); // two blobs survive, one commit survives
        let remaining_commit = repo
            .events
            .iter()
            .find_map(|e| match e {
                Event::Commit(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert!(remaining_commit.is_root());
        assert!(remaining_commit.comment.contains("root comment"));
        assert!(remaining_commit.comment.contains("child comment"));
        assert_eq!(remaining_commit.fileops.len(), 2);
    }

    #[test]
    fn squashing_root_with_no_parent_prepends_deleteall_to_child() {
        let mut repo = Repository::new();
        let root = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        let mut child = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        child.parents.push(CommitRef::Index(root));
        let child_index = repo.push(Event::Commit(child));
        if let Event::Commit(c) = &mut repo.events[root] {
            c.children.push(child_index);
        }

        let policy = SquashPolicy::default();
        squash(&mut repo, &[root], &policy).unwrap();

        let Event::Commit(surviving) = &repo.events[0] else { panic!() };
        assert!(surviving.is_root());
        assert_eq!(surviving.fileops.first(), Some(&FileOp::DeleteAll));
    }

    #[test]
    fn delete_policy_drops_fileops_but_reconnects_graph() {
        let mut repo = Repository::new();
        let root_index = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        push_blob(&mut repo, 2, b"one");
        let mut middle = Commit::new(Mark(3), "refs/heads/master".to_string(), attribution());
        middle.parents.push(CommitRef::Index(root_index));
        middle.fileops.push(modify(2, "f"));
        let middle_index = repo.push(Event::Commit(middle));
        if let Event::Commit(c) = &mut repo.events[root_index] {
            c.children.push(middle_index);
        }

        let mut child = Commit::new(Mark(4), "refs/heads/master".to_string(), attribution());
        child.parents.push(CommitRef::Index(middle_index));
        let child_index = repo.push(Event::Commit(child));
        if let Event::Commit(c) = &mut repo.events[middle_index] {
            c.children.push(child_index);
        }

        let policy = SquashPolicy {
            delete: true,
            ..SquashPolicy::default()
        };
        squash(&mut repo, &[middle_index], &policy).unwrap();

        // middle's fileop went nowhere, so no surviving commit carries it.
        for event in &repo.events {
            if let Event::Commit(c) = event {
                assert!(c.fileops.is_empty());
            }
        }
        // the graph reconnected: child's parent is now root.
        let root_survivor = repo
            .events
            .iter()
            .find_map(|e| match e {
                Event::Commit(c) if c.is_root() => Some(c),
                _ => None,
            })
            .expect("root commit survives");
        assert_eq!(root_survivor.children.len(), 1);
    }

    #[test]
    fn tag_and_reset_attachments_migrate_on_delete() {
        let mut repo = Repository::new();
        let root = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        let mut victim = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        victim.parents.push(CommitRef::Index(root));
        let victim_index = repo.push(Event::Commit(victim));
        if let Event::Commit(c) = &mut repo.events[root] {
            c.children.push(victim_index);
        }

        let tag_index = repo.push(Event::Tag(Tag::new(
            "v1".to_string(),
            CommitRef::Index(victim_index),
            attribution(),
            String::new(),
        )));
        let reset_index = repo.push(Event::Reset(Reset::new(
            "refs/heads/master".to_string(),
            Some(CommitRef::Index(victim_index)),
        )));
        if let Event::Commit(c) = &mut repo.events[victim_index] {
            c.attachments.push(tag_index);
            c.attachments.push(reset_index);
        }

        let policy = SquashPolicy {
            tagback: true,
            tagforward: false,
            ..SquashPolicy::default()
        };
        squash(&mut repo, &[victim_index], &policy).unwrap();

        let Event::Tag(t) = repo.events.iter().find(|e| matches!(e, Event::Tag(_))).unwrap() else {
            panic!()
        };
        assert_eq!(t.target.as_index(), Some(0));
        let Event::Reset(r) = repo.events.iter().find(|e| matches!(e, Event::Reset(_))).unwrap() else {
            panic!()
        };
        assert_eq!(r.target.as_ref().and_then(CommitRef::as_index), Some(0));
    }

    #[test]
    fn orphaned_attachment_with_no_redirect_is_a_command_error_by_default() {
        let mut repo = Repository::new();
        let victim = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        let tag_index = repo.push(Event::Tag(Tag::new(
            "v1".to_string(),
            CommitRef::Index(victim),
            attribution(),
            String::new(),
        )));
        if let Event::Commit(c) = &mut repo.events[victim] {
            c.attachments.push(tag_index);
        }

        // default policy: tagforward on, but victim has no children, so
        // there is no redirect target and tagify is off.
        let err = squash(&mut repo, &[victim], &SquashPolicy::default()).unwrap_err();
        assert!(matches!(err, SurgeryError::Command { .. }));
        // nothing was mutated: the tag still points at the (undeleted) victim.
        assert!(matches!(repo.events[victim], Event::Commit(_)));
        assert!(matches!(repo.events[tag_index], Event::Tag(_)));
    }

    #[test]
    fn orphaned_attachment_is_dropped_under_tagify() {
        let mut repo = Repository::new();
        let victim = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        let tag_index = repo.push(Event::Tag(Tag::new(
            "v1".to_string(),
            CommitRef::Index(victim),
            attribution(),
            String::new(),
        )));
        if let Event::Commit(c) = &mut repo.events[victim] {
            c.attachments.push(tag_index);
        }

        let policy = SquashPolicy {
            tagify: true,
            ..SquashPolicy::default()
        };
        let warnings = squash(&mut repo, &[victim], &policy).unwrap();
        assert!(!warnings.is_empty());
        assert!(repo.events.iter().all(|e| !matches!(e, Event::Tag(_))));
        assert!(repo.events.iter().all(|e| !matches!(e, Event::Commit(_))));
    }

    #[test]
    fn empty_only_squashes_a_fileop_empty_commit_regardless_of_comment() {
        let mut repo = Repository::new();
        let root = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        let mut commit = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        commit.comment = "keep me".to_string();
        commit.parents.push(CommitRef::Index(root));
        let index = repo.push(Event::Commit(commit));
        if let Event::Commit(c) = &mut repo.events[root] {
            c.children.push(index);
        }

        let policy = SquashPolicy {
            empty_only: true,
            ..SquashPolicy::default()
        };
        squash(&mut repo, &[index], &policy).unwrap();

        assert!(!matches!(repo.events.get(index), Some(Event::Commit(c)) if c.comment == "keep me"));
    }

    #[test]
    fn empty_only_rejects_a_commit_with_fileops_and_no_push_flag() {
        let mut repo = Repository::new();
        push_blob(&mut repo, 1, b"one");
        let mut commit = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution());
        commit.fileops.push(modify(1, "f"));
        let index = repo.push(Event::Commit(commit));

        let policy = SquashPolicy {
            empty_only: true,
            pushforward: false,
            pushback: false,
            ..SquashPolicy::default()
        };
        let err = squash(&mut repo, &[index], &policy).unwrap_err();
        assert!(matches!(err, SurgeryError::Command { .. }));
    }

    #[test]
    fn tagify_converts_empty_survivor_to_a_tag() {
        let mut repo = Repository::new();
        let root = repo.push(Event::Commit(Commit::new(
            Mark(1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        push_blob(&mut repo, 2, b"x");
        let mut victim = Commit::new(Mark(3), "refs/heads/master".to_string(), attribution());
        victim.parents.push(CommitRef::Index(root));
        victim.fileops.push(modify(2, "f"));
        let victim_index = repo.push(Event::Commit(victim));
        if let Event::Commit(c) = &mut repo.events[root] {
            c.children.push(victim_index);
        }

        // plain delete with pushforward/tagforward off: victim's fileop
        // moves nowhere, so after canonicalization it is empty and
        // tagify should convert it.
        let policy = SquashPolicy {
            delete: true,
            tagforward: false,
            tagify: true,
            ..SquashPolicy::default()
        };
        // select a no-op commit distinct from victim so victim keeps its
        // own fileop through the squash loop, then becomes empty only
        // because gc won't run until after tagify; instead directly
        // clear its fileops here to exercise the tagify pass in
        // isolation.
        if let Event::Commit(c) = &mut repo.events[victim_index] {
            c.fileops.clear();
        }
        squash(&mut repo, &[], &policy).unwrap();

        assert!(repo.events.iter().any(|e| matches!(e, Event::Tag(_))));
    }
}
