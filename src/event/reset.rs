//! Reset events (SPEC_FULL.md §3): a ref name and an optional committish.
//! A reset with no target clears a branch (e.g. a deleted ref).

use super::CommitRef;

#[derive(Debug, Clone)]
pub struct Reset {
    pub refname: String,
    pub target: Option<CommitRef>,
    /// Soft-delete marker, set when an orphaned attachment is dropped
    /// during a `--tagify` squash (SPEC_FULL.md §4.8).
    pub delete: bool,
}

impl Reset {
    pub fn new(refname: String, target: Option<CommitRef>) -> Self {
        Reset {
            refname,
            target,
            delete: false,
        }
    }

    pub fn is_tag_ref(&self) -> bool {
        self.refname.starts_with("refs/tags/")
    }

    pub fn is_branch_ref(&self) -> bool {
        self.refname.starts_with("refs/heads/")
    }
}
