//! Session Inspector - index and query coding-assistant session logs
//!
//! This library indexes the line-delimited session logs stored under
//! `~/.claude/projects/` and answers structured queries over them:
//!
//! - Parsing each log line into a typed message with classified content blocks
//! - Linking messages into a per-session forest, including side-chains
//!   spawned by tool invocations and merged sub-agent logs
//! - Publishing immutable snapshots that readers use while a rebuild runs
//! - Filtering, sorting and paginating sessions; navigating message trees
//!
//! # Example
//!
//! ```no_run
//! use session_inspector::{FilterCriteria, IndexConfig, IndexStore, PageRequest, RebuildTrigger, SessionOrder};
//!
//! let store = IndexStore::from_config(IndexConfig::default())?;
//! store.rebuild(RebuildTrigger::Startup)?;
//!
//! let snapshot = store.current();
//! let page = snapshot.list_sessions(&FilterCriteria::any(), SessionOrder::default(), PageRequest::new(0, 20));
//! for session in &page.items {
//!     println!("{} {} messages", session.session_id, session.message_count);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod filters;
pub mod index_store;
pub mod indexer;
pub mod models;
pub mod parsers;
pub mod query;
pub mod utils;

// Re-export commonly used types
pub use config::IndexConfig;
pub use error::{BuildError, FilterParseError, IndexError, NotFound, ParseError, QueryError};
pub use filters::{FilterCriteria, parse_filter};
pub use index_store::{IndexSnapshot, IndexStore, RebuildTrigger};
pub use models::{ContentBlock, Message, Session, SessionSummary};
pub use parsers::parse_session_file;
pub use query::{PageRequest, SessionOrder, SortKey, SortOrder};
