//! FileOp: a single filesystem-level change attached to a commit
//! (SPEC_FULL.md §3), and the pairwise simplification engine the
//! delete/squash engine runs to a fixed point after every structural edit
//! (SPEC_FULL.md §4.8).

use crate::errors::{Result, SurgeryError};
use crate::mark::Mark;

/// One of the four fast-import blob modes (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Submodule,
}

impl FileMode {
    pub fn from_octal(text: &str) -> Option<Self> {
        match text {
            "100644" => Some(FileMode::Regular),
            "100755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "160000" => Some(FileMode::Submodule),
            _ => None,
        }
    }

    pub fn as_octal(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Submodule => "160000",
        }
    }
}

/// An `M` op's content reference: either a blob mark, or an inline body
/// embedded directly in the fileop line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobRef {
    Mark(Mark),
    Inline(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOp {
    Modify {
        mode: FileMode,
        content: BlobRef,
        path: String,
    },
    Delete {
        path: String,
    },
    Rename {
        src: String,
        tgt: String,
    },
    Copy {
        src: String,
        tgt: String,
    },
    DeleteAll,
}

impl FileOp {
    /// The paths this op reads from or writes to, for the purpose of
    /// deciding whether two ops are related and must be considered
    /// together during simplification.
    fn touches(&self) -> Vec<&str> {
        match self {
            FileOp::Modify { path, .. } | FileOp::Delete { path } => vec![path.as_str()],
            FileOp::Rename { src, tgt } | FileOp::Copy { src, tgt } => {
                vec![src.as_str(), tgt.as_str()]
            }
            FileOp::DeleteAll => vec![],
        }
    }
}

fn related(a: &FileOp, b: &FileOp) -> bool {
    if matches!(a, FileOp::DeleteAll) || matches!(b, FileOp::DeleteAll) {
        return true;
    }
    let at = a.touches();
    let bt = b.touches();
    at.iter().any(|p| bt.contains(p))
}

enum Outcome {
    Unrelated,
    Keep,
    Warn(String),
    Replace(Vec<FileOp>),
    WarnAndReplace(String, Vec<FileOp>),
    /// A pair that touches overlapping paths but matches no row in the
    /// composition table: SPEC_FULL.md §4.8 calls this a programming
    /// error, not a silent no-op.
    Invariant(String),
}

/// Implements the composition table in SPEC_FULL.md §4.8 for one adjacent
/// pair, `a` immediately preceding `b` in a commit's fileop list.
fn combine(a: &FileOp, b: &FileOp) -> Outcome {
    use FileOp::*;

    if !related(a, b) {
        return Outcome::Unrelated;
    }

    match (a, b) {
        // M a, M a -- keep both, ordering is significant (invariant 7).
        (Modify { path: pa, .. }, Modify { path: pb, .. }) if pa == pb => Outcome::Keep,

        // M a, D a -- the modify is moot, the delete wins.
        (Modify { path: pa, .. }, Delete { path: pb }) if pa == pb => {
            Outcome::Replace(vec![Delete { path: pb.clone() }])
        }

        // M a, R a b -- retarget the modify to b, drop the now-redundant rename source.
        (Modify { mode, content, path: pa }, Rename { src, tgt }) if pa == src => {
            Outcome::Replace(vec![Modify {
                mode: *mode,
                content: content.clone(),
                path: tgt.clone(),
            }])
        }

        // M a, R c a -- the rename's target collides with an existing modify.
        (Modify { path: pa, .. }, Rename { tgt, .. }) if pa == tgt => Outcome::Warn(format!(
            "rename target `{tgt}` collides with an already-modified path"
        )),

        // M a, C a b -- leave; duplicating content at b would require copying bytes.
        (Modify { path: pa, .. }, Copy { src, .. }) if pa == src => Outcome::Keep,

        // D a, M a -- the modify overrides the delete.
        (Delete { path: pa }, Modify { mode, content, path: pb }) if pa == pb => {
            Outcome::Replace(vec![Modify {
                mode: *mode,
                content: content.clone(),
                path: pb.clone(),
            }])
        }

        // deleteall, M a -- normal: the commit wipes the tree, then seeds it.
        (DeleteAll, Modify { .. }) => Outcome::Keep,

        // deleteall, <anything else> -- suspicious; flag it but leave both.
        (DeleteAll, _) => {
            Outcome::Warn("deleteall is immediately followed by a non-modify fileop".to_string())
        }

        // D a, D a -- merge the duplicate.
        (Delete { path: pa }, Delete { path: pb }) if pa == pb => {
            Outcome::Replace(vec![Delete { path: pa.clone() }])
        }

        // D a, R a _ / C a _ -- the rename/copy source already vanished.
        (Delete { path: pa }, Rename { src, .. }) if pa == src => Outcome::Warn(format!(
            "rename source `{src}` was deleted earlier in the same commit"
        )),
        (Delete { path: pa }, Copy { src, .. }) if pa == src => Outcome::Warn(format!(
            "copy source `{src}` was deleted earlier in the same commit"
        )),

        // R a b, D b -- rename then delete the target: net effect is deleting the source.
        (Rename { src, tgt }, Delete { path }) if tgt == path => {
            Outcome::Replace(vec![Delete { path: src.clone() }])
        }

        // R a b, D a -- a was already vacated by the rename; the delete is stray.
        (Rename { src, tgt }, Delete { path }) if src == path => Outcome::WarnAndReplace(
            format!("delete of `{path}` after it was already renamed to `{tgt}`"),
            vec![Rename {
                src: src.clone(),
                tgt: tgt.clone(),
            }],
        ),

        // R a b, deleteall -- unusual ordering; flag it, leave both as written.
        (Rename { .. }, DeleteAll) => {
            Outcome::Warn("deleteall follows a rename in the same commit".to_string())
        }

        // R a b, R b c -- transitive rename collapses to a single hop.
        (Rename { src, tgt }, Rename { src: src2, tgt: tgt2 }) if tgt == src2 => {
            Outcome::Replace(vec![Rename {
                src: src.clone(),
                tgt: tgt2.clone(),
            }])
        }

        // R a b, R a c -- two renames claim the same source: inconsistent input.
        (Rename { src, .. }, Rename { src: src2, .. }) if src == src2 => {
            Outcome::Warn(format!("two renames in the same commit share source `{src}`"))
        }

        // R a b, R c d -- any other rename/rename overlap (same target,
        // or one's target is the other's source in the wrong direction):
        // inconsistent input, left as written but flagged.
        (Rename { src: s1, tgt: t1 }, Rename { src: s2, tgt: t2 }) => Outcome::Warn(format!(
            "renames `{s1}` -> `{t1}` and `{s2}` -> `{t2}` overlap ambiguously in the same commit"
        )),

        // C a b, D a -- copy then delete the source is equivalent to a move.
        (Copy { src, tgt }, Delete { path }) if src == path => {
            Outcome::Replace(vec![Rename {
                src: src.clone(),
                tgt: tgt.clone(),
            }])
        }

        // C a b, D b -- the copy's target is immediately deleted: net no-op.
        (Copy { tgt, .. }, Delete { path }) if tgt == path => Outcome::Replace(vec![]),

        // C a b, R b c -- the copy's target is renamed away: collapse to a direct copy.
        (Copy { src, tgt }, Rename { src: src2, tgt: tgt2 }) if tgt == src2 => {
            Outcome::Replace(vec![Copy {
                src: src.clone(),
                tgt: tgt2.clone(),
            }])
        }

        // Any other path overlap the table does not name (chained copies, a
        // modify colliding with a copy's target, and similar combinations):
        // SPEC_FULL.md §4.8 calls reaching this a programming error.
        _ => Outcome::Invariant(format!(
            "no simplification rule for {a:?} followed by {b:?} despite them touching overlapping paths"
        )),
    }
}

/// Runs pairwise composition over adjacent fileops to a fixed point,
/// returning the simplified list and any warnings raised along the way
/// (SPEC_FULL.md §4.8). Warnings are non-fatal, matching the source's
/// "commit/fileop-level warnings are logged but not fatal" policy. A pair
/// that touches overlapping paths but matches no table row is a hard
/// error rather than a silently dropped case.
pub fn simplify(mut ops: Vec<FileOp>) -> Result<(Vec<FileOp>, Vec<String>)> {
    let mut warnings = Vec::new();
    loop {
        let mut changed = false;
        let mut i = 0;
        while i + 1 < ops.len() {
            match combine(&ops[i], &ops[i + 1]) {
                Outcome::Unrelated | Outcome::Keep => {
                    i += 1;
                }
                Outcome::Warn(message) => {
                    warnings.push(message);
                    i += 1;
                }
                Outcome::Replace(replacement) => {
                    ops.splice(i..i + 2, replacement);
                    changed = true;
                    break;
                }
                Outcome::WarnAndReplace(message, replacement) => {
                    warnings.push(message);
                    ops.splice(i..i + 2, replacement);
                    changed = true;
                    break;
                }
                Outcome::Invariant(message) => return Err(SurgeryError::invariant(message)),
            }
        }
        if !changed {
            break;
        }
    }
    Ok((ops, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modify(path: &str) -> FileOp {
        FileOp::Modify {
            mode: FileMode::Regular,
            content: BlobRef::Mark(Mark(1)),
            path: path.to_string(),
        }
    }

    fn delete(path: &str) -> FileOp {
        FileOp::Delete {
            path: path.to_string(),
        }
    }

    fn rename(src: &str, tgt: &str) -> FileOp {
        FileOp::Rename {
            src: src.to_string(),
            tgt: tgt.to_string(),
        }
    }

    fn copy(src: &str, tgt: &str) -> FileOp {
        FileOp::Copy {
            src: src.to_string(),
            tgt: tgt.to_string(),
        }
    }

    #[test]
    fn modify_then_delete_drops_the_modify() {
        let (ops, warnings) = simplify(vec![modify("a"), delete("a")]).unwrap();
        assert_eq!(ops, vec![delete("a")]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn modify_then_rename_retargets() {
        let (ops, _) = simplify(vec![modify("a"), rename("a", "b")]).unwrap();
        assert_eq!(ops, vec![modify("b")]);
    }

    #[test]
    fn delete_then_modify_drops_the_delete() {
        let (ops, _) = simplify(vec![delete("a"), modify("a")]).unwrap();
        assert_eq!(ops, vec![modify("a")]);
    }

    #[test]
    fn duplicate_deletes_merge() {
        let (ops, _) = simplify(vec![delete("a"), delete("a")]).unwrap();
        assert_eq!(ops, vec![delete("a")]);
    }

    #[test]
    fn rename_then_delete_target_becomes_delete_source() {
        let (ops, _) = simplify(vec![rename("a", "b"), delete("b")]).unwrap();
        assert_eq!(ops, vec![delete("a")]);
    }

    #[test]
    fn rename_then_stray_delete_of_source_warns_and_drops() {
        let (ops, warnings) = simplify(vec![rename("a", "b"), delete("a")]).unwrap();
        assert_eq!(ops, vec![rename("a", "b")]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn transitive_renames_collapse() {
        let (ops, _) = simplify(vec![rename("a", "b"), rename("b", "c")]).unwrap();
        assert_eq!(ops, vec![rename("a", "c")]);
    }

    #[test]
    fn renames_sharing_a_target_are_kept_and_warned() {
        let (ops, warnings) = simplify(vec![rename("x", "b"), rename("y", "b")]).unwrap();
        assert_eq!(ops, vec![rename("x", "b"), rename("y", "b")]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn copy_then_delete_source_becomes_rename() {
        let (ops, _) = simplify(vec![copy("a", "b"), delete("a")]).unwrap();
        assert_eq!(ops, vec![rename("a", "b")]);
    }

    #[test]
    fn copy_then_delete_target_drops_both() {
        let (ops, _) = simplify(vec![copy("a", "b"), delete("b")]).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn copy_then_rename_target_collapses() {
        let (ops, _) = simplify(vec![copy("a", "b"), rename("b", "c")]).unwrap();
        assert_eq!(ops, vec![copy("a", "c")]);
    }

    #[test]
    fn unrelated_ops_are_left_alone() {
        let (ops, warnings) = simplify(vec![modify("a"), modify("b")]).unwrap();
        assert_eq!(ops, vec![modify("a"), modify("b")]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn chained_simplifications_reach_a_fixed_point() {
        // R a b, R b c, D c -> R a c, D c -> D a
        let (ops, _) = simplify(vec![rename("a", "b"), rename("b", "c"), delete("c")]).unwrap();
        assert_eq!(ops, vec![delete("a")]);
    }

    #[test]
    fn an_untabulated_overlapping_pair_is_an_invariant_error() {
        // Modify "b" then Copy something onto "b": both touch "b", but no
        // table row covers a modify colliding with a copy's target.
        let err = simplify(vec![modify("b"), copy("a", "b")]).unwrap_err();
        assert!(matches!(err, SurgeryError::Invariant(_)));
    }
}
