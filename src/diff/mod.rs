//! Unified diff parsing
//!
//! Converts pre-rendered `git diff` text into files, hunks and lines so the
//! filters and the serializer never have to look at raw diff syntax.

mod parser;
mod types;

pub use parser::{parse_name_status, DiffParser};
pub use types::{file_extension, Chunk, Diff, DiffLine, FileDiff, FileStatus, LineKind, StatusEntry};
