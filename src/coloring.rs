//! Branch coloring (SPEC_FULL.md §4.11): reconstructs per-commit branch
//! labels for version-control systems whose native history carries none,
//! the way `git fast-export` colors commits as it walks a repository with
//! no first-class branch concept at the commit level.
//!
//! This operates on plain commit-id strings and caller-supplied maps
//! rather than a `Repository`, since it runs ahead of `Event` construction
//! during generic-extractor import (there is no arena yet to index into).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, FixedOffset};

/// The inputs the source describes: a parent map, a ref→commit map
/// (`refs/heads/*` branch tips and `refs/tags/*` tag targets), and commit
/// timestamps. The topological order itself isn't consulted by the
/// algorithm below (only per-ref timestamp order is), but callers
/// typically have one on hand from the same extraction pass.
pub struct ColoringInput<'a> {
    pub parents: &'a HashMap<String, Vec<String>>,
    pub refs: &'a HashMap<String, String>,
    pub timestamps: &'a HashMap<String, DateTime<FixedOffset>>,
}

fn far_future() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("9999-12-31T23:59:59+00:00").expect("valid sentinel literal")
}

fn is_branch_color(color: &str) -> bool {
    color.starts_with("refs/heads/")
}

/// Colors every commit reachable from a ref, processing refs earliest
/// target-timestamp first, and returns the commit→branch-label map
/// (SPEC_FULL.md §4.11).
///
/// Parents are walked with a work queue rather than true call recursion:
/// the source recurses per parent except on a single eligible parent,
/// where it iterates to keep a long linear branch from growing the call
/// stack. A queue gets the same unbounded-depth safety without the
/// special case, since queuing one item or several is the same operation.
pub fn color_branches(input: &ColoringInput) -> HashMap<String, String> {
    let mut branch: HashMap<String, String> = HashMap::new();
    let mut child_ts: HashMap<String, DateTime<FixedOffset>> = HashMap::new();

    let mut ordered_refs: Vec<(&String, &String)> = input.refs.iter().collect();
    ordered_refs.sort_by_key(|(_, commit)| input.timestamps.get(*commit).copied().unwrap_or_else(far_future));

    for (refname, commit) in ordered_refs {
        let mut queue: VecDeque<(String, String)> = VecDeque::new();
        queue.push_back((commit.clone(), refname.clone()));

        while let Some((c, color)) = queue.pop_front() {
            if is_branch_color(&color) && branch.contains_key(&c) {
                continue;
            }
            child_ts.insert(c.clone(), far_future());
            branch.insert(c.clone(), color.clone());

            let commit_ts = input.timestamps.get(&c).copied().unwrap_or_else(far_future);
            let parents = input.parents.get(&c).cloned().unwrap_or_default();

            for p in parents {
                let uncolored = !branch.contains_key(&p);
                let parent_on_tag = branch.get(&p).map(|pc| !is_branch_color(pc)).unwrap_or(false);
                let tag_exempt = is_branch_color(&color) && parent_on_tag;
                let stale = child_ts.get(&p).map(|ts| *ts < commit_ts).unwrap_or(false);

                if uncolored || (!tag_exempt && stale) {
                    child_ts.insert(p.clone(), commit_ts);
                    queue.push_back((p, color.clone()));
                }
            }
        }
    }

    branch
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(epoch: i64) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0).unwrap().timestamp_opt(epoch, 0).unwrap()
    }

    #[test]
    fn linear_chain_inherits_the_tip_branchs_color() {
        let mut parents = HashMap::new();
        parents.insert("c3".to_string(), vec!["c2".to_string()]);
        parents.insert("c2".to_string(), vec!["c1".to_string()]);
        let mut refs = HashMap::new();
        refs.insert("refs/heads/master".to_string(), "c3".to_string());
        let mut timestamps = HashMap::new();
        timestamps.insert("c1".to_string(), ts(0));
        timestamps.insert("c2".to_string(), ts(1));
        timestamps.insert("c3".to_string(), ts(2));

        let input = ColoringInput {
            parents: &parents,
            refs: &refs,
            timestamps: &timestamps,
        };
        let colors = color_branches(&input);
        assert_eq!(colors.get("c1"), Some(&"refs/heads/master".to_string()));
        assert_eq!(colors.get("c2"), Some(&"refs/heads/master".to_string()));
        assert_eq!(colors.get("c3"), Some(&"refs/heads/master".to_string()));
    }

    #[test]
    fn a_later_branch_reclaims_shared_history_from_an_earlier_one() {
        let mut parents = HashMap::new();
        parents.insert("feature".to_string(), vec!["base".to_string()]);
        parents.insert("master".to_string(), vec!["base".to_string()]);
        let mut refs = HashMap::new();
        refs.insert("refs/heads/master".to_string(), "master".to_string());
        refs.insert("refs/heads/feature".to_string(), "feature".to_string());
        let mut timestamps = HashMap::new();
        timestamps.insert("base".to_string(), ts(0));
        timestamps.insert("master".to_string(), ts(1));
        timestamps.insert("feature".to_string(), ts(2));

        let input = ColoringInput {
            parents: &parents,
            refs: &refs,
            timestamps: &timestamps,
        };
        let colors = color_branches(&input);
        // master's ref is processed first (earlier timestamp) and colors
        // the shared root, but feature's later walk finds the root's
        // child-timestamp (master's visit) stale against its own and
        // reclaims it, since neither ref is a tag.
        assert_eq!(colors.get("base"), Some(&"refs/heads/feature".to_string()));
        assert_eq!(colors.get("feature"), Some(&"refs/heads/feature".to_string()));
        assert_eq!(colors.get("master"), Some(&"refs/heads/master".to_string()));
    }

    #[test]
    fn a_branch_does_not_walk_past_an_earlier_tagged_ancestor() {
        let mut parents = HashMap::new();
        parents.insert("child".to_string(), vec!["base".to_string()]);
        let mut refs = HashMap::new();
        refs.insert("refs/tags/v1".to_string(), "base".to_string());
        refs.insert("refs/heads/master".to_string(), "child".to_string());
        let mut timestamps = HashMap::new();
        timestamps.insert("base".to_string(), ts(0));
        timestamps.insert("child".to_string(), ts(1));

        let input = ColoringInput {
            parents: &parents,
            refs: &refs,
            timestamps: &timestamps,
        };
        let colors = color_branches(&input);
        assert_eq!(colors.get("base"), Some(&"refs/tags/v1".to_string()));
        assert_eq!(colors.get("child"), Some(&"refs/heads/master".to_string()));
    }
}
