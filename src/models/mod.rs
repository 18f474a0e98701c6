//! Data models for indexed session logs.
//!
//! - [`RawRecord`] - wire shape of one JSONL line, deserialized with serde
//! - [`Record`] - what the record parser hands to the builder
//! - [`Message`] / [`ContentBlock`] - typed conversation turns and their content
//! - [`Session`] - one linked message forest plus its aggregates
//!
//! Special fields (timestamps, blank strings) go through the custom
//! deserializers in `parsers::deserializers`.

pub mod content;
pub mod message;
pub mod record;
pub mod session;

pub use content::{BlockKind, ContentBlock, ImageSourceKind};
pub use message::{AgentInvocation, Message, SenderRole, TokenUsage};
pub use record::{RawAgentResult, RawMessage, RawRecord, RawUsage, Record};
pub use session::{Diagnostic, Session, SessionSummary, SideChain};
