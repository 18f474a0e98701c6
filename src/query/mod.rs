//! Query engine over a published [`IndexSnapshot`](crate::index_store::IndexSnapshot).
//!
//! Queries are inherent methods on the snapshot and never mutate it:
//! - `list_sessions`: filter, sort, paginate session summaries
//! - `get_message_tree`: roots of a session or of one side-chain
//! - `get_messages_page`: lazy main-chain loading
//! - `get_message`, `get_children`, `get_message_global`: id navigation
//! - `list_side_chains`, `side_chain_origin`: side-chain entry and exit

mod engine;
pub mod page;

pub use page::{
    MessagePage, MessageTree, Page, PageRequest, SessionOrder, SessionPage, SortKey, SortOrder, TreeEntry,
};
