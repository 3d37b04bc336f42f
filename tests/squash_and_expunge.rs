//! Exercises the delete/squash and expunge engines against a repository
//! built straight from a fast-import stream, rather than hand-assembled
//! events, so the test also covers the parser's wiring of parent/child
//! links that these engines depend on.

use reposurgeon_core::event::Event;
use reposurgeon_core::expunge::{expunge, ExpungePolicy, MatchPattern};
use reposurgeon_core::squash::{squash, SquashPolicy};
use reposurgeon_core::stream::parse_stream;

const THREE_COMMITS: &str = "\
blob
mark :1
data 3
one
commit refs/heads/master
mark :2
committer A U Thor <author@example.com> 1257894000 +0000
data 4
root
M 100644 :1 a.txt
blob
mark :3
data 3
two
commit refs/heads/master
mark :4
committer A U Thor <author@example.com> 1257894100 +0000
from :2
data 6
middle
M 100644 :3 b.txt
blob
mark :5
data 5
three
commit refs/heads/master
mark :6
committer A U Thor <author@example.com> 1257894200 +0000
from :4
data 4
leaf
M 100644 :5 c.txt
";

#[test]
fn squashing_the_middle_commit_pushes_its_fileop_forward() {
    let mut repo = parse_stream(THREE_COMMITS.as_bytes()).unwrap();
    let middle = repo
        .events
        .iter()
        .position(|e| matches!(e, Event::Commit(c) if c.comment.trim() == "middle"))
        .unwrap();

    let warnings = squash(&mut repo, &[middle], &SquashPolicy::default()).unwrap();
    assert!(warnings.is_empty());

    let remaining: Vec<&reposurgeon_core::event::Commit> = repo
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Commit(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(remaining.len(), 2);
    let leaf = remaining.iter().find(|c| c.comment.contains("leaf")).unwrap();
    assert!(leaf.comment.contains("middle"));
    assert_eq!(leaf.fileops.len(), 2);
}

#[test]
fn expunging_a_path_splits_it_into_a_derived_repository() {
    let mut repo = parse_stream(THREE_COMMITS.as_bytes()).unwrap();
    let derived = expunge(
        &mut repo,
        &[],
        &[MatchPattern::Literal("b.txt".to_string())],
        &ExpungePolicy::default(),
    )
    .unwrap();

    let original_has_b = repo.events.iter().any(|e| match e {
        Event::Commit(c) => c.fileops.iter().any(|op| matches!(op, reposurgeon_core::fileop::FileOp::Modify { path, .. } if path == "b.txt")),
        _ => false,
    });
    assert!(!original_has_b);

    let derived_has_b = derived.events.iter().any(|e| match e {
        Event::Commit(c) => c.fileops.iter().any(|op| matches!(op, reposurgeon_core::fileop::FileOp::Modify { path, .. } if path == "b.txt")),
        _ => false,
    });
    assert!(derived_has_b);
}
