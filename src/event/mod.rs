//! The event model (SPEC_FULL.md §3, §4.1): a tagged variant over the five
//! kinds of line a fast-import stream can produce. Events live in a
//! `Repository`'s arena and reference each other by index, never by owning
//! pointer (SPEC_FULL.md §9 "Cyclic parent-child references").

pub mod blob;
pub mod commit;
pub mod passthrough;
pub mod reset;
pub mod tag;

pub use blob::{Blob, BlobContent, Cookie};
pub use commit::{Commit, ManifestEntry};
pub use passthrough::Passthrough;
pub use reset::Reset;
pub use tag::Tag;

use crate::mark::Mark;

/// A reference to a commit that may or may not live in the same
/// repository: either a resolved arena index, or a callout (an
/// action-stamp string naming a commit outside the current fragment,
/// SPEC_FULL.md GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRef {
    Index(usize),
    Callout(String),
}

impl CommitRef {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            CommitRef::Index(i) => Some(*i),
            CommitRef::Callout(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Blob(Blob),
    Commit(Commit),
    Tag(Tag),
    Reset(Reset),
    Passthrough(Passthrough),
}

impl Event {
    pub fn is_commit(&self) -> bool {
        matches!(self, Event::Commit(_))
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, Event::Blob(_))
    }

    pub fn mark(&self) -> Option<Mark> {
        match self {
            Event::Blob(b) => Some(b.mark),
            Event::Commit(c) => Some(c.mark),
            _ => None,
        }
    }

    pub fn comment(&self) -> Option<&str> {
        match self {
            Event::Commit(c) => Some(&c.comment),
            Event::Tag(t) => Some(&t.comment),
            _ => None,
        }
    }

    pub fn set_comment(&mut self, text: String) {
        match self {
            Event::Commit(c) => c.comment = text,
            Event::Tag(t) => t.comment = text,
            _ => {}
        }
    }

    /// `#N` for events with no more specific identity, mark-prefixed
    /// otherwise, matching the name cache's sequence-number convention
    /// (SPEC_FULL.md §4.3). `index` is 0-origin; rendered 1-origin.
    pub fn id_string(&self, index: usize) -> String {
        match self.mark() {
            Some(m) if !m.is_none() => m.to_string(),
            _ => format!("#{}", index + 1),
        }
    }

    /// Soft-delete marker. `Reset` and `Passthrough` have no children to
    /// rewire and carry none; `Tag` and `Reset` otherwise carry one so an
    /// orphaned attachment can be dropped during a `--tagify` squash
    /// instead of left dangling (SPEC_FULL.md §4.8, documented in
    /// DESIGN.md).
    pub fn delete_flag(&self) -> Option<bool> {
        match self {
            Event::Blob(b) => Some(b.delete),
            Event::Commit(c) => Some(c.delete),
            Event::Tag(t) => Some(t.delete),
            Event::Reset(r) => Some(r.delete),
            Event::Passthrough(_) => None,
        }
    }

    pub fn set_delete_flag(&mut self, value: bool) {
        match self {
            Event::Blob(b) => b.delete = value,
            Event::Commit(c) => c.delete = value,
            Event::Tag(t) => t.delete = value,
            Event::Reset(r) => r.delete = value,
            Event::Passthrough(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::Attribution;
    use chrono::{FixedOffset, TimeZone};

    fn attribution() -> Attribution {
        Attribution::new(
            "A U Thor",
            "author@example.com",
            FixedOffset::east_opt(0).unwrap().timestamp_opt(0, 0).unwrap(),
        )
    }

    #[test]
    fn id_string_prefers_mark_over_index() {
        let commit = Commit::new(Mark(5), "refs/heads/master".to_string(), attribution());
        let event = Event::Commit(commit);
        assert_eq!(event.id_string(9), ":5");
    }

    #[test]
    fn id_string_falls_back_to_one_origin_index() {
        let event = Event::Passthrough(Passthrough::new("# comment".to_string()));
        assert_eq!(event.id_string(0), "#1");
    }

    #[test]
    fn delete_flag_defaults_false_for_tags_and_is_settable() {
        let tag = Tag::new(
            "v1.0".to_string(),
            CommitRef::Index(0),
            attribution(),
            String::new(),
        );
        let mut event = Event::Tag(tag);
        assert_eq!(event.delete_flag(), Some(false));
        event.set_delete_flag(true);
        assert_eq!(event.delete_flag(), Some(true));
    }

    #[test]
    fn delete_flag_is_none_for_passthrough() {
        let event = Event::Passthrough(Passthrough::new("# comment".to_string()));
        assert_eq!(event.delete_flag(), None);
    }
}
