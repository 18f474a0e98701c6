//! Building sessions from log files
//!
//! Data flow per session: [`discovery`] finds the files, the parsers turn lines
//! into messages, [`tree`] links them into a forest and attributes
//! side-chains, [`aggregate`] computes the per-session metrics, and
//! [`builder`] runs that pipeline for every session in parallel.

pub mod aggregate;
pub mod builder;
pub mod discovery;
pub mod tree;

pub use aggregate::{SessionSources, aggregate};
pub use builder::{BuildOutput, build_sessions};
pub use discovery::{AgentSource, DiscoveredSources, SessionSource, discover_sources};
pub use tree::{SessionTree, build_tree};
