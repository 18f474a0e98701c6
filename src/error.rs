//! Error taxonomy for parsing, building, rebuilding and querying the index.
//!
//! Line- and session-level errors are values the builder collects and attaches
//! to the snapshot; only [`IndexError`] and [`QueryError`] ever reach a caller
//! of the store or the query engine.

use std::path::PathBuf;

use thiserror::Error;

/// One log line that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {reason}")]
pub struct ParseError {
    pub line_number: usize,
    pub reason: ParseFailure,
}

impl ParseError {
    pub fn new(line_number: usize, reason: ParseFailure) -> Self {
        Self { line_number, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid field value: {0}")]
    InvalidField(String),

    #[error("unrecognized record shape: {0}")]
    UnrecognizedShape(String),
}

/// A file or session that could not be built at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("session {session_id} has no valid messages")]
    EmptySession { session_id: String },

    #[error("session {session_id}: every message sits on a parent cycle")]
    UnresolvableCycle { session_id: String },

    #[error("cannot read {path}: {reason}")]
    FileUnreadable { path: PathBuf, reason: String },

    #[error("file too large: {path} ({size} bytes, max {max} bytes)")]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("sub-agent log {path} has no parent session {session_id}")]
    MissingParentSession { path: PathBuf, session_id: String },

    #[error("duplicate session {session_id}; already indexed from {kept}")]
    DuplicateSession { session_id: String, kept: PathBuf },
}

/// Failure of a whole rebuild; the previously published snapshot stays in place
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("session source unavailable: {path}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session source is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },
}

impl IndexError {
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable { path: path.into(), source }
    }
}

/// What a query referred to that the snapshot does not contain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("no session `{0}`")]
    Session(String),

    #[error("no message `{message_id}` in session `{session_id}`")]
    Message { session_id: String, message_id: String },

    #[error("no message `{0}` in the index")]
    GlobalMessage(String),

    #[error("no side-chain for tool use `{tool_use_id}` in session `{session_id}`")]
    SideChain { session_id: String, tool_use_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
}

impl QueryError {
    pub fn session(session_id: &str) -> Self {
        NotFound::Session(session_id.to_string()).into()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NotFound(_))
    }
}

/// Textual filter expression that could not be turned into criteria
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("unknown field `{0}` (valid fields: messages, tokens, input, output, branch, since, until, role, block, project)")]
    UnknownField(String),

    #[error("invalid value `{value}` for `{field}`: {reason}")]
    InvalidValue { field: String, value: String, reason: String },

    #[error("invalid token `{0}` (expected field:value)")]
    InvalidToken(String),

    #[error("unterminated quoted string")]
    UnterminatedQuote,

    #[error("OR is not supported: criteria are always combined with AND")]
    OrNotSupported,

    #[error("filter ended with an operator")]
    DanglingOperator,
}
