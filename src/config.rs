//! Process-wide surgical options (SPEC_FULL.md §4.14): where blobs are
//! materialized, whether they're compressed, how big the read-only worker
//! pool gets, and the on-disk tables a repository consults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SurgeonConfig {
    /// Root directory under which each repository's `.rs<pid>-<name>`
    /// scratch directory is created (SPEC_FULL.md §6).
    pub scratch_root: PathBuf,
    /// Whether materialized blob files are gzip-compressed on disk.
    pub compress_blobs: bool,
    /// Size of the bounded worker pool used for read-only traversals
    /// (SPEC_FULL.md §5). `1` forces serial execution for determinism.
    pub worker_pool_size: usize,
    /// Path to a legacy-ID map file to preload, if any.
    pub legacy_map_path: Option<PathBuf>,
    /// Path to an author map file to preload, if any.
    pub author_map_path: Option<PathBuf>,
    /// Append `Legacy-ID: <id>` to commit/tag comments on stream output.
    pub emit_legacy_ids: bool,
    /// Reset the process abort flag after a recoverable command error
    /// instead of leaving it set (the source's `--relax`).
    pub relax: bool,
}

impl Default for SurgeonConfig {
    fn default() -> Self {
        Self {
            scratch_root: PathBuf::from("."),
            compress_blobs: false,
            worker_pool_size: num_cpus::get().max(1),
            legacy_map_path: None,
            author_map_path: None,
            emit_legacy_ids: false,
            relax: false,
        }
    }
}

impl SurgeonConfig {
    /// Loads a config overlay from a JSON file on top of `Default::default()`.
    /// Unknown fields are ignored so older config files keep working.
    pub fn load_overlay(path: &std::path::Path) -> crate::errors::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let parsed: Self = serde_json::from_str(&text)
            .map_err(|e| crate::errors::SurgeryError::command(format!("bad config: {e}")))?;
        Ok(parsed)
    }

    /// The scratch directory name for a repository, per SPEC_FULL.md §6:
    /// `<basedir>/.rs<pid>-<name>`.
    pub fn scratch_dir(&self, pid: u32, name: &str) -> PathBuf {
        self.scratch_root.join(format!(".rs{pid}-{name}"))
    }
}
