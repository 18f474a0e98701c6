use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::models::{Message, Session, SessionSummary, SideChain};

/// Field sessions are ordered by before pagination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    StartTime,
    EndTime,
    MessageCount,
    TokenCount,
    SessionId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Sort key plus direction; the default is newest session first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOrder {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SessionOrder {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Total order: the key in the requested direction, then `session_id` ascending
    pub fn compare(&self, a: &Session, b: &Session) -> Ordering {
        let by_key = match self.key {
            SortKey::StartTime => a.start_time.cmp(&b.start_time),
            SortKey::EndTime => a.end_time.cmp(&b.end_time),
            SortKey::MessageCount => a.message_count.cmp(&b.message_count),
            SortKey::TokenCount => a.total_token_count.cmp(&b.total_token_count),
            SortKey::SessionId => Ordering::Equal,
        };
        let by_key = match self.order {
            SortOrder::Ascending => by_key,
            SortOrder::Descending => by_key.reverse(),
        };

        let by_id = a.session_id.cmp(&b.session_id);
        match (self.key, self.order) {
            (SortKey::SessionId, SortOrder::Descending) => by_id.reverse(),
            _ => by_key.then(by_id),
        }
    }
}

/// Offset/limit window over an ordered result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// 0-based page number of `limit` items each
    pub fn page(number: usize, limit: usize) -> Self {
        Self { offset: number.saturating_mul(limit), limit }
    }

    /// The index range this page covers within `len` items
    pub fn bounds(&self, len: usize) -> std::ops::Range<usize> {
        let start = self.offset.min(len);
        let end = start.saturating_add(self.limit).min(len);
        start..end
    }
}

/// One page of an ordered result, tagged with the snapshot it came from
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Items in the whole result, not just this page
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub generation: u64,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len()) < self.total
    }
}

pub type SessionPage = Page<SessionSummary>;
pub type MessagePage = Page<Arc<Message>>;

/// Message tree of one session, or of one of its side-chains.
///
/// Holds the session's `Arc`, so it stays valid after the snapshot it came
/// from has been replaced.
#[derive(Debug, Clone)]
pub struct MessageTree {
    session: Arc<Session>,
    side_chain: Option<String>,
    roots: Vec<Arc<Message>>,
}

/// One message in a pre-order walk, with its depth below the tree's roots
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry<'a> {
    pub depth: usize,
    pub message: &'a Message,
}

impl MessageTree {
    pub(crate) fn new(session: Arc<Session>, side_chain: Option<String>, roots: Vec<Arc<Message>>) -> Self {
        Self { session, side_chain, roots }
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    /// The requested side-chain's `tool_use_id`, `None` for the main tree
    pub fn side_chain(&self) -> Option<&str> {
        self.side_chain.as_deref()
    }

    pub fn roots(&self) -> &[Arc<Message>] {
        &self.roots
    }

    /// Side-chains attributed in this session, keyed by owning `tool_use_id`
    pub fn side_chains(&self) -> impl Iterator<Item = &SideChain> {
        self.session.side_chain_roots.values()
    }

    /// Roots of side-chains whose owning invocation is unknown
    pub fn unattributed_roots(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.session.unattributed_side_chains.iter().filter_map(|id| self.session.message(id))
    }

    /// Messages reachable from the roots through same-chain children, pre-order
    pub fn walk(&self) -> Vec<TreeEntry<'_>> {
        let mut entries = Vec::new();
        let mut stack: Vec<(usize, &Message)> = self.roots.iter().rev().map(|m| (0, m.as_ref())).collect();

        while let Some((depth, message)) = stack.pop() {
            entries.push(TreeEntry { depth, message });
            for child_id in message.children.iter().rev() {
                if let Some(child) = self.session.message(child_id) {
                    stack.push((depth + 1, child.as_ref()));
                }
            }
        }
        entries
    }
}
