//! Blob events (SPEC_FULL.md §4.1): content that lives either as a
//! `(offset, size)` slice of the repository's input stream, or as a
//! materialized file under the repository's scratch directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::Result;
use crate::hash::BlobHash;
use crate::mark::Mark;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobContent {
    /// Content held directly in memory. Not part of the source's two
    /// storage modes, but the natural default for blobs built by surgical
    /// constructors or tests rather than read off a stream (DESIGN.md).
    Inline(Vec<u8>),
    /// `(offset, size)` into the repository's seekable input stream.
    StreamRef { offset: u64, size: u64 },
    /// A file under `<repo>/.rs<pid>-<name>/blobs/NNN/NNN/NNN`, optionally
    /// gzip-compressed.
    Materialized { path: PathBuf, compressed: bool },
}

/// A `$Id$`/`$Revision$`/`$LastChangedRev$` cookie extracted from a blob's
/// content on first set (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub path: String,
    pub rev: String,
    /// A revision containing `.` implies CVS; otherwise SVN.
    pub is_cvs: bool,
}

/// Scans for the first recognized keyword cookie in `content`. Only the
/// first match is kept, per SPEC_FULL.md's "scan once" rule.
pub fn parse_cookie(content: &[u8]) -> Option<Cookie> {
    let text = String::from_utf8_lossy(content);
    for (keyword, is_id) in [("$Id:", true), ("$Revision:", false), ("$LastChangedRev:", false)] {
        if let Some(start) = text.find(keyword) {
            let rest = &text[start + keyword.len()..];
            let end = rest.find('$')?;
            let body = rest[..end].trim();
            if is_id {
                let mut parts = body.split_whitespace();
                let path = parts.next()?.to_string();
                let rev = parts.next().unwrap_or("").to_string();
                return Some(Cookie {
                    is_cvs: rev.contains('.'),
                    path,
                    rev,
                });
            } else {
                let rev = body.split_whitespace().next().unwrap_or("").to_string();
                return Some(Cookie {
                    path: String::new(),
                    is_cvs: rev.contains('.'),
                    rev,
                });
            }
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub mark: Mark,
    pub content: BlobContent,
    /// In-repo path aliases this blob has been known under.
    pub paths: Vec<String>,
    pub delete: bool,
    /// Small bit set used by branch-splitting operations (unite/expunge).
    pub coloring: u32,
    pub cookie: Option<Cookie>,
    pub hash: Option<BlobHash>,
}

impl Blob {
    pub fn new(mark: Mark, content: BlobContent) -> Self {
        Blob {
            mark,
            content,
            paths: Vec::new(),
            delete: false,
            coloring: 0,
            cookie: None,
            hash: None,
        }
    }

    /// Sets content and derives the dedup hash and `$`-cookie from it, per
    /// the "on content set, scan once" rule (SPEC_FULL.md §4.1).
    pub fn set_inline_content(&mut self, bytes: Vec<u8>) {
        self.cookie = parse_cookie(&bytes);
        self.hash = Some(BlobHash::of(&bytes));
        self.content = BlobContent::Inline(bytes);
    }

    /// The on-disk path for blob sequence number `seq` under `scratch_dir`,
    /// per SPEC_FULL.md §6: three zero-padded three-digit fields sliced
    /// from the (zero-padded to 9 digits) decimal sequence number.
    pub fn blob_path(scratch_dir: &Path, seq: u64) -> PathBuf {
        let padded = format!("{seq:09}");
        scratch_dir
            .join("blobs")
            .join(&padded[0..3])
            .join(&padded[3..6])
            .join(&padded[6..9])
    }

    /// Forces already-resolved `bytes` to disk at `dest`, replacing
    /// stream-referenced content so the owning stream can be closed.
    pub fn materialize(&mut self, bytes: &[u8], dest: PathBuf, compress: bool) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if compress {
            let file = std::fs::File::create(&dest)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(bytes)?;
            encoder.finish()?;
        } else {
            std::fs::write(&dest, bytes)?;
        }
        self.content = BlobContent::Materialized {
            path: dest,
            compressed: compress,
        };
        Ok(())
    }

    /// Hard-links the materialized file at `dest` (falling back to a
    /// symlink across filesystems), per the `clone()` contract in
    /// SPEC_FULL.md §4.1.
    pub fn clone_materialized_to(&self, dest: &Path) -> Result<()> {
        let BlobContent::Materialized { path, .. } = &self.content else {
            return Err(crate::errors::SurgeryError::invariant(
                "clone_materialized_to called on a non-materialized blob",
            ));
        };
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if std::fs::hard_link(path, dest).is_err() {
            #[cfg(unix)]
            std::os::unix::fs::symlink(path, dest)?;
            #[cfg(not(unix))]
            std::fs::copy(path, dest).map(|_| ())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_path_slices_into_three_digit_fields() {
        let path = Blob::blob_path(Path::new("/repo"), 42);
        assert_eq!(path, PathBuf::from("/repo/blobs/000/000/042"));
    }

    #[test]
    fn cookie_parses_dollar_id() {
        let cookie = parse_cookie(b"stuff $Id: trunk/foo.c 123 $ more").unwrap();
        assert_eq!(cookie.path, "trunk/foo.c");
        assert_eq!(cookie.rev, "123");
        assert!(!cookie.is_cvs);
    }

    #[test]
    fn cookie_detects_cvs_style_dotted_revision() {
        let cookie = parse_cookie(b"$Id: foo.c 1.4 $").unwrap();
        assert!(cookie.is_cvs);
    }

    #[test]
    fn no_cookie_when_absent() {
        assert!(parse_cookie(b"plain content").is_none());
    }

    #[test]
    fn set_inline_content_derives_hash() {
        let mut blob = Blob::new(Mark(1), BlobContent::Inline(Vec::new()));
        blob.set_inline_content(b"hello".to_vec());
        assert_eq!(blob.hash, Some(BlobHash::of(b"hello")));
    }
}
