//! Name cache (SPEC_FULL.md §4.3): resolves user-facing identifiers
//! (sequence numbers, branch/tag names, reset names, legacy IDs, action
//! stamps, date prefixes) to event-index sets. Rebuilt in a single pass
//! over all events whenever the Repository's sequence changes.

use std::collections::HashMap;

use crate::event::Event;

#[derive(Debug, Default)]
pub struct NameCache {
    by_name: HashMap<String, Vec<usize>>,
    by_legacy_id: HashMap<String, usize>,
    by_action_stamp: HashMap<String, usize>,
    by_date: HashMap<String, Vec<usize>>,
}

fn basename(refname: &str) -> &str {
    refname
        .strip_prefix("refs/heads/")
        .or_else(|| refname.strip_prefix("refs/tags/"))
        .unwrap_or(refname)
}

/// `ISO8601!email`, disambiguated with a trailing `#ordinal` on collision
/// (SPEC_FULL.md GLOSSARY "Action stamp").
fn action_stamp(date: &chrono::DateTime<chrono::FixedOffset>, email: &str) -> String {
    format!("{}!{}", date.format("%Y-%m-%dT%H:%M:%S%z"), email)
}

impl NameCache {
    pub fn build(events: &[Event]) -> Self {
        let mut cache = NameCache::default();
        let mut stamp_counts: HashMap<String, usize> = HashMap::new();

        for (index, event) in events.iter().enumerate() {
            match event {
                Event::Commit(commit) => {
                    cache
                        .by_name
                        .entry(basename(&commit.branch).to_string())
                        .or_default()
                        .push(index);

                    if let Some(legacy) = &commit.legacy_id {
                        cache.by_legacy_id.insert(legacy.clone(), index);
                    }

                    let date_key = commit.committer.date.format("%Y-%m-%d").to_string();
                    cache.by_date.entry(date_key).or_default().push(index);

                    let base_stamp = action_stamp(&commit.committer.date, &commit.committer.email);
                    let count = stamp_counts.entry(base_stamp.clone()).or_insert(0);
                    *count += 1;
                    let stamp = if *count == 1 {
                        base_stamp
                    } else {
                        format!("{base_stamp}#{count}")
                    };
                    cache.by_action_stamp.insert(stamp, index);
                }
                Event::Tag(tag) => {
                    cache.by_name.entry(tag.name.clone()).or_default().push(index);
                    if let Some(legacy) = &tag.legacy_id {
                        cache.by_legacy_id.insert(legacy.clone(), index);
                    }
                    let date_key = tag.tagger.date.format("%Y-%m-%d").to_string();
                    cache.by_date.entry(date_key).or_default().push(index);
                }
                Event::Reset(reset) => {
                    cache
                        .by_name
                        .entry(format!("reset@{}", basename(&reset.refname)))
                        .or_default()
                        .push(index);
                }
                _ => {}
            }
        }
        cache
    }

    /// Resolves a query string against the cache, or against the `#N`
    /// 1-origin sequence-number form directly (no rebuild needed for that
    /// case since it only depends on `total_len`).
    pub fn resolve(&self, query: &str, total_len: usize) -> Option<Vec<usize>> {
        if let Some(rest) = query.strip_prefix('#') {
            let n: usize = rest.parse().ok()?;
            return if n >= 1 && n <= total_len {
                Some(vec![n - 1])
            } else {
                None
            };
        }
        if let Some(&index) = self.by_legacy_id.get(query) {
            return Some(vec![index]);
        }
        if let Some(&index) = self.by_action_stamp.get(query) {
            return Some(vec![index]);
        }
        if let Some(indices) = self.by_date.get(query) {
            return Some(indices.clone());
        }
        self.by_name.get(query).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::Attribution;
    use crate::event::Commit;
    use crate::mark::Mark;
    use chrono::{FixedOffset, TimeZone};

    fn attribution(email: &str) -> Attribution {
        Attribution::new(
            "A U Thor",
            email,
            FixedOffset::east_opt(0).unwrap().timestamp_opt(1000, 0).unwrap(),
        )
    }

    #[test]
    fn resolves_sequence_number() {
        let cache = NameCache::build(&[]);
        assert_eq!(cache.resolve("#1", 3), Some(vec![0]));
        assert_eq!(cache.resolve("#4", 3), None);
    }

    #[test]
    fn resolves_branch_basename() {
        let commit = Commit::new(Mark(1), "refs/heads/master".to_string(), attribution("a@x"));
        let events = vec![Event::Commit(commit)];
        let cache = NameCache::build(&events);
        assert_eq!(cache.resolve("master", 1), Some(vec![0]));
    }

    #[test]
    fn disambiguates_colliding_action_stamps() {
        let a = Commit::new(Mark(1), "refs/heads/master".to_string(), attribution("a@x"));
        let b = Commit::new(Mark(2), "refs/heads/master".to_string(), attribution("a@x"));
        let events = vec![Event::Commit(a), Event::Commit(b)];
        let cache = NameCache::build(&events);
        let stamp = action_stamp(&attribution("a@x").date, "a@x");
        assert_eq!(cache.resolve(&stamp, 2), Some(vec![0]));
        assert_eq!(cache.resolve(&format!("{stamp}#2"), 2), Some(vec![1]));
    }
}
