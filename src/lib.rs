//! reposurgeon-core is a library for loading an entire version-control
//! history into memory and performing surgical graph and metadata
//! transformations on it: deletions with fileop pushforward/pushback,
//! branch splits and unites, path rewrites, commit coalescence,
//! tagification, and reparenting, all while preserving correctness
//! invariants across thousands of interacting objects.

pub mod attribution;
pub mod coloring;
pub mod config;
pub mod context;
pub mod dag;
pub mod errors;
pub mod event;
pub mod expunge;
pub mod fileop;
pub mod hash;
pub mod manifest;
pub mod mark;
pub mod pathmap;
pub mod repository;
pub mod squash;
pub mod stream;
pub mod unite;
pub mod utils;

pub use errors::{Result, SurgeryError};
