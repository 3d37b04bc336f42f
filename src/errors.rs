//! Error types for the reposurgeon-core crate.
//!
//! This module defines a unified error enumeration used across the event
//! model, the path map, the repository container, the fast-import codec,
//! and the surgical engines (squash, expunge, unite, coloring). It mirrors
//! the four recoverable error classes of the source tool plus an I/O
//! variant and an internal-invariant variant for bugs.
//!
//! Notes:
//! - Each recoverable variant carries a message and, where meaningful, the
//!   index of the event it concerns so call sites can report "at event #N".
//! - Only the call site that declares interest in a given class should
//!   match on it; everywhere else propagate with `?`.

use colored::Colorize;
use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for reposurgeon-core.
///
/// - Used across the stream codec, the repository container, and the
///   surgical engines.
/// - Implements `std::error::Error` via `thiserror`.
pub enum SurgeryError {
    /// Malformed fast-import stream input. Recovery: abort the current
    /// parse and discard any repository state built during it.
    #[error("parse error: {message}")]
    Parse {
        message: String,
        /// Byte offset into the input stream, if known.
        offset: Option<u64>,
    },

    /// A user-level surgical operation failed. Recovery: unwind to the
    /// caller; the abort flag is set unless the context is in relaxed mode.
    #[error("command error: {message}")]
    Command {
        message: String,
        event: Option<usize>,
    },

    /// A generic extractor disagreed with the underlying VCS. Recovery:
    /// abort that repository read.
    #[error("extractor error: {message}")]
    Extractor { message: String },

    /// A metadata (mailbox-style) update was malformed. Recovery: reject
    /// the update, leave the repository unchanged.
    #[error("metadata update error: {message}")]
    MsgBox { message: String },

    /// I/O failure from the underlying reader, writer, or filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal invariant (see SPEC_FULL.md §3) was violated. This is a
    /// programming error in the core, never a user-facing condition.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl SurgeryError {
    pub fn parse(message: impl Into<String>) -> Self {
        SurgeryError::Parse {
            message: message.into(),
            offset: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, offset: u64) -> Self {
        SurgeryError::Parse {
            message: message.into(),
            offset: Some(offset),
        }
    }

    pub fn command(message: impl Into<String>) -> Self {
        SurgeryError::Command {
            message: message.into(),
            event: None,
        }
    }

    pub fn command_at(message: impl Into<String>, event: usize) -> Self {
        SurgeryError::Command {
            message: message.into(),
            event: Some(event),
        }
    }

    pub fn extractor(message: impl Into<String>) -> Self {
        SurgeryError::Extractor {
            message: message.into(),
        }
    }

    pub fn msgbox(message: impl Into<String>) -> Self {
        SurgeryError::MsgBox {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        SurgeryError::Invariant(message.into())
    }

    /// True for the four recoverable classes named in SPEC_FULL.md §7;
    /// false for `Io` and `Invariant`, which are always fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SurgeryError::Parse { .. }
                | SurgeryError::Command { .. }
                | SurgeryError::Extractor { .. }
                | SurgeryError::MsgBox { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SurgeryError>;

/// Colorizes interactive warning text for terminal display (yellow), per
/// SPEC_FULL.md §4.13. Colorization is cosmetic: the returned string still
/// carries the original message, just wrapped in ANSI color codes.
pub fn colorize_warning(message: &str) -> String {
    message.yellow().to_string()
}

/// Colorizes text announcing an aborted operation (red, bold), per
/// SPEC_FULL.md §4.13.
pub fn colorize_aborted(message: &str) -> String {
    message.red().bold().to_string()
}
