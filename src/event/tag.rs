//! Tag events (SPEC_FULL.md §3): a name, a committish, a tagger, a comment.

use crate::attribution::Attribution;

use super::CommitRef;

#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub target: CommitRef,
    pub tagger: Attribution,
    pub comment: String,
    pub legacy_id: Option<String>,
    /// Soft-delete marker, set when an orphaned attachment is dropped
    /// during a `--tagify` squash (SPEC_FULL.md §4.8).
    pub delete: bool,
}

impl Tag {
    pub fn new(name: String, target: CommitRef, tagger: Attribution, comment: String) -> Self {
        Tag {
            name,
            target,
            tagger,
            comment,
            legacy_id: None,
            delete: false,
        }
    }
}
