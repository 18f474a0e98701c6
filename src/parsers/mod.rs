//! JSONL parsers for session log files
//!
//! # Error Handling Strategy
//!
//! - **Individual line failures**: a malformed line becomes a [`ParseError`]
//!   carrying its 1-based line number and the failure kind. The line is skipped
//!   and the rest of the file is still read; no failure rate aborts a file.
//!
//! - **Pure functions**: parsers never log. Errors are returned to the index
//!   builder, which attaches them to the session and decides what to surface.
//!
//! - **File-level failures**: only an unreadable or oversized file fails as a
//!   whole, as a [`BuildError`](crate::error::BuildError).
//!
//! [`ParseError`]: crate::error::ParseError

pub mod content;
pub mod deserializers;
pub mod record;
pub mod session_file;

pub use content::{classify_block, classify_content};
pub use record::parse_record;
pub use session_file::{SessionFile, parse_session_file, peek_session_id};
