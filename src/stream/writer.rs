//! Fast-import stream writer (SPEC_FULL.md §4.5): the reverse of the
//! parser, rendering a `Repository` back to a fast-import stream.

use std::collections::HashSet;
use std::io::Write;

use crate::errors::{Result, SurgeryError};
use crate::event::{CommitRef, Event};
use crate::fileop::{BlobRef, FileOp};
use crate::repository::Repository;
use crate::utils::quote_path_if_needed;

/// Writer-side knobs named in SPEC_FULL.md §4.5/§4.14.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Append `Legacy-ID: <id>` to commit/tag comments (the source's `--legacy`).
    pub emit_legacy_ids: bool,
    /// When a parent/committish is a callout (points outside this
    /// fragment), emit it in action-stamp form rather than dropping it.
    pub emit_callouts: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            emit_legacy_ids: false,
            emit_callouts: true,
        }
    }
}

fn write_data(out: &mut impl Write, bytes: &[u8]) -> Result<()> {
    writeln!(out, "data {}", bytes.len())?;
    out.write_all(bytes)?;
    writeln!(out)?;
    Ok(())
}

/// The value a `from`/`merge` line writes for a resolved commit reference.
/// A mark is used when the target has one (true of anything this crate
/// parsed or renumbered); otherwise falls back to `<branch>^0`, valid only
/// when the target is in fact that branch's current tip. Fuller support
/// would need a second index pass to find a safer identifier; this is
/// acceptable given this writer's round-trip use (documented in DESIGN.md).
fn committish_for(repo: &Repository, index: usize) -> String {
    match repo.events.get(index) {
        Some(Event::Commit(c)) if !c.mark.is_none() => c.mark.to_string(),
        Some(Event::Commit(c)) => format!("{}^0", c.branch),
        _ => format!("#{}", index + 1),
    }
}

fn committish_line(repo: &Repository, reference: &CommitRef, options: &WriterOptions) -> Option<String> {
    match reference {
        CommitRef::Index(i) => Some(committish_for(repo, *i)),
        CommitRef::Callout(name) => {
            if options.emit_callouts {
                Some(name.clone())
            } else {
                None
            }
        }
    }
}

fn write_path_pair(out: &mut impl Write, keyword: &str, a: &str, b: &str) -> Result<()> {
    writeln!(out, "{keyword} {} {}", quote_path_if_needed(a), quote_path_if_needed(b))?;
    Ok(())
}

fn write_fileop(out: &mut impl Write, op: &FileOp) -> Result<()> {
    match op {
        FileOp::Modify { mode, content, path } => match content {
            BlobRef::Mark(mark) => {
                writeln!(out, "M {} {} {}", mode.as_octal(), mark, quote_path_if_needed(path))?;
            }
            BlobRef::Inline(bytes) => {
                writeln!(out, "M {} inline {}", mode.as_octal(), quote_path_if_needed(path))?;
                write_data(out, bytes)?;
            }
        },
        FileOp::Delete { path } => writeln!(out, "D {}", quote_path_if_needed(path))?,
        FileOp::Rename { src, tgt } => write_path_pair(out, "R", src, tgt)?,
        FileOp::Copy { src, tgt } => write_path_pair(out, "C", src, tgt)?,
        FileOp::DeleteAll => writeln!(out, "deleteall")?,
    }
    Ok(())
}

fn comment_with_legacy(comment: &str, legacy_id: &Option<String>, options: &WriterOptions) -> String {
    match (options.emit_legacy_ids, legacy_id) {
        (true, Some(id)) => format!("{comment}\nLegacy-ID: {id}\n"),
        _ => comment.to_string(),
    }
}

/// Renders `repo` as a fast-import stream (SPEC_FULL.md §4.5).
pub fn write_stream<W: Write>(repo: &Repository, out: &mut W, options: &WriterOptions) -> Result<()> {
    let mut realized: HashSet<String> = HashSet::new();

    for event in repo.events.iter() {
        match event {
            Event::Passthrough(p) => {
                writeln!(out, "{}", p.text)?;
            }
            Event::Blob(blob) => {
                writeln!(out, "blob")?;
                if !blob.mark.is_none() {
                    writeln!(out, "mark {}", blob.mark)?;
                }
                let bytes = match &blob.content {
                    crate::event::BlobContent::Inline(bytes) => bytes.clone(),
                    crate::event::BlobContent::StreamRef { .. } => {
                        // No reader in this crate ever builds a StreamRef (the
                        // stream parser always produces Inline); writing one out
                        // as empty data would silently corrupt whatever content
                        // it was meant to stand in for.
                        return Err(SurgeryError::invariant(
                            "cannot write a blob with unresolved StreamRef content",
                        ));
                    }
                    crate::event::BlobContent::Materialized { path, compressed } => {
                        let raw = std::fs::read(path)?;
                        if *compressed {
                            use std::io::Read as _;
                            let mut decoder = flate2::read::GzDecoder::new(&raw[..]);
                            let mut decoded = Vec::new();
                            decoder.read_to_end(&mut decoded)?;
                            decoded
                        } else {
                            raw
                        }
                    }
                };
                write_data(out, &bytes)?;
            }
            Event::Commit(commit) => {
                if !realized.contains(&commit.branch) && commit.parents.is_empty() {
                    writeln!(out, "reset {}^0", commit.branch)?;
                }
                realized.insert(commit.branch.clone());

                writeln!(out, "commit {}", commit.branch)?;
                if !commit.mark.is_none() {
                    writeln!(out, "mark {}", commit.mark)?;
                }
                for author in &commit.authors {
                    writeln!(out, "author {author}")?;
                }
                writeln!(out, "committer {}", commit.committer)?;
                let comment = comment_with_legacy(&commit.comment, &commit.legacy_id, options);
                write_data(out, comment.as_bytes())?;

                for (i, parent) in commit.parents.iter().enumerate() {
                    let keyword = if i == 0 { "from" } else { "merge" };
                    if let Some(value) = committish_line(repo, parent, options) {
                        writeln!(out, "{keyword} {value}")?;
                    }
                }

                for (name, value) in commit.properties.iter() {
                    writeln!(out, "property {name} {}", value.len())?;
                    out.write_all(value.as_bytes())?;
                    writeln!(out)?;
                }

                for op in &commit.fileops {
                    write_fileop(out, op)?;
                }
            }
            Event::Tag(tag) => {
                writeln!(out, "tag {}", tag.name)?;
                if let Some(value) = committish_line(repo, &tag.target, options) {
                    writeln!(out, "from {value}")?;
                }
                writeln!(out, "tagger {}", tag.tagger)?;
                let comment = comment_with_legacy(&tag.comment, &tag.legacy_id, options);
                write_data(out, comment.as_bytes())?;
            }
            Event::Reset(reset) => {
                writeln!(out, "reset {}", reset.refname)?;
                if let Some(target) = &reset.target {
                    if let Some(value) = committish_line(repo, target, options) {
                        writeln!(out, "from {value}")?;
                    }
                }
                realized.insert(reset.refname.clone());
            }
        }
    }

    Ok(())
}
