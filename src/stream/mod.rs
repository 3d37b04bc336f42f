//! The fast-import stream codec (SPEC_FULL.md §4.4, §4.5): a reader that
//! builds a `Repository` from a stream and a writer that renders one back.

pub mod reader;
pub mod writer;

pub use reader::parse_stream;
pub use writer::{write_stream, WriterOptions};
