//! Property tests over the event-sequence invariants named in
//! SPEC_FULL.md §8: parent/child reciprocity and topological-resort
//! conservation of the event set.

use chrono::{FixedOffset, TimeZone};
use quickcheck::quickcheck;
use reposurgeon_core::attribution::Attribution;
use reposurgeon_core::dag::{set_parents, topological_resort};
use reposurgeon_core::event::{Commit, CommitRef, Event};
use reposurgeon_core::mark::Mark;
use reposurgeon_core::repository::Repository;

fn attribution() -> Attribution {
    Attribution::new(
        "A U Thor",
        "author@example.com",
        FixedOffset::east_opt(0).unwrap().timestamp_opt(0, 0).unwrap(),
    )
}

/// Builds a linear chain of `count` commits (capped to keep each run
/// fast), wiring each to the previous via `set_parents`, and returns the
/// arena indices in chain order.
fn build_linear_chain(repo: &mut Repository, count: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity(count);
    for i in 0..count {
        let index = repo.push(Event::Commit(Commit::new(
            Mark(i as u64 + 1),
            "refs/heads/master".to_string(),
            attribution(),
        )));
        indices.push(index);
        if i > 0 {
            set_parents(repo, index, vec![CommitRef::Index(indices[i - 1])]).unwrap();
        }
    }
    indices
}

quickcheck! {
    fn parent_child_links_are_always_reciprocal(raw_len: u8) -> bool {
        let count = (raw_len % 12) as usize;
        let mut repo = Repository::new();
        let indices = build_linear_chain(&mut repo, count);

        indices.windows(2).all(|pair| {
            let (parent, child) = (pair[0], pair[1]);
            let Event::Commit(parent_commit) = &repo.events[parent] else { return false };
            let Event::Commit(child_commit) = &repo.events[child] else { return false };
            parent_commit.children.contains(&child)
                && child_commit.parents == vec![CommitRef::Index(parent)]
        })
    }

    fn topological_resort_preserves_the_event_count(raw_len: u8) -> bool {
        let count = (raw_len % 12) as usize;
        let mut repo = Repository::new();
        build_linear_chain(&mut repo, count);
        let before = repo.len();
        topological_resort(&mut repo).is_ok() && repo.len() == before
    }

    fn topological_resort_keeps_every_mark_present(raw_len: u8) -> bool {
        let count = (raw_len % 12) as usize;
        let mut repo = Repository::new();
        build_linear_chain(&mut repo, count);
        let marks_before: std::collections::HashSet<Mark> =
            repo.events.iter().filter_map(|e| e.mark()).collect();

        topological_resort(&mut repo).unwrap();
        let marks_after: std::collections::HashSet<Mark> =
            repo.events.iter().filter_map(|e| e.mark()).collect();
        marks_before == marks_after
    }
}
