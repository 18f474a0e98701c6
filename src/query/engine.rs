use std::sync::Arc;

use super::page::{MessagePage, MessageTree, PageRequest, SessionOrder, SessionPage};
use crate::error::{NotFound, QueryError};
use crate::filters::{FilterCriteria, apply_filters};
use crate::index_store::IndexSnapshot;
use crate::models::{Message, Session, SideChain};

/// Read-only queries. Every method works on this snapshot alone, so repeated
/// calls against the same `Arc<IndexSnapshot>` are deterministic.
impl IndexSnapshot {
    /// Sessions matching every criterion, ordered, then paginated.
    ///
    /// The order is total (ties break on `session_id`), so consecutive pages
    /// of the same snapshot never overlap or skip a session.
    pub fn list_sessions(&self, criteria: &FilterCriteria, order: SessionOrder, page: PageRequest) -> SessionPage {
        let mut matched = apply_filters(self.sessions(), criteria);
        matched.sort_by(|a, b| order.compare(a, b));

        let total = matched.len();
        let items = matched[page.bounds(total)].iter().map(|session| session.summary_view()).collect();

        SessionPage { items, total, offset: page.offset, limit: page.limit, generation: self.generation() }
    }

    /// Whole message forest of a session, or one side-chain by its owning `tool_use_id`
    pub fn get_message_tree(&self, session_id: &str, side_chain: Option<&str>) -> Result<MessageTree, QueryError> {
        let session = self.require_session(session_id)?;

        let Some(tool_use_id) = side_chain else {
            let roots = resolve(session, &session.root_messages);
            return Ok(MessageTree::new(Arc::clone(session), None, roots));
        };

        let chain = side_chain_of(session, tool_use_id)?;
        let roots = resolve(session, &chain.roots);
        Ok(MessageTree::new(Arc::clone(session), Some(tool_use_id.to_string()), roots))
    }

    /// Slice of the main chain in file order
    pub fn get_messages_page(&self, session_id: &str, page: PageRequest) -> Result<MessagePage, QueryError> {
        let session = self.require_session(session_id)?;
        let total = session.main_chain.len();
        let items = resolve(session, &session.main_chain[page.bounds(total)]);

        Ok(MessagePage { items, total, offset: page.offset, limit: page.limit, generation: self.generation() })
    }

    pub fn get_message(&self, session_id: &str, message_id: &str) -> Result<&Arc<Message>, QueryError> {
        let session = self.require_session(session_id)?;
        session.message(message_id).ok_or_else(|| {
            NotFound::Message { session_id: session_id.to_string(), message_id: message_id.to_string() }.into()
        })
    }

    /// Same-chain children of a message in file order. Side-chains started by
    /// the message are reached through [`list_side_chains`](Self::list_side_chains).
    pub fn get_children(&self, session_id: &str, message_id: &str) -> Result<Vec<Arc<Message>>, QueryError> {
        let message = self.get_message(session_id, message_id)?;
        let session = self.require_session(session_id)?;
        Ok(resolve(session, &message.children))
    }

    /// Lookup by id alone, across every session
    pub fn get_message_global(&self, message_id: &str) -> Result<&Arc<Message>, QueryError> {
        self.message(message_id).ok_or_else(|| NotFound::GlobalMessage(message_id.to_string()).into())
    }

    /// Attributed side-chains of a session, ordered by `tool_use_id`
    pub fn list_side_chains(&self, session_id: &str) -> Result<Vec<&SideChain>, QueryError> {
        let session = self.require_session(session_id)?;
        Ok(session.side_chain_roots.values().collect())
    }

    /// Exit a side-chain: the message whose `tool_use` block spawned it
    pub fn side_chain_origin(&self, session_id: &str, tool_use_id: &str) -> Result<&Arc<Message>, QueryError> {
        let session = self.require_session(session_id)?;
        session
            .tool_uses
            .get(tool_use_id)
            .and_then(|message_id| session.message(message_id))
            .ok_or_else(|| side_chain_miss(session_id, tool_use_id))
    }

    fn require_session(&self, session_id: &str) -> Result<&Arc<Session>, QueryError> {
        self.session(session_id).ok_or_else(|| QueryError::session(session_id))
    }
}

fn side_chain_of<'a>(session: &'a Session, tool_use_id: &str) -> Result<&'a SideChain, QueryError> {
    session.side_chain_roots.get(tool_use_id).ok_or_else(|| side_chain_miss(&session.session_id, tool_use_id))
}

fn side_chain_miss(session_id: &str, tool_use_id: &str) -> QueryError {
    NotFound::SideChain { session_id: session_id.to_string(), tool_use_id: tool_use_id.to_string() }.into()
}

fn resolve(session: &Session, ids: &[String]) -> Vec<Arc<Message>> {
    ids.iter().filter_map(|id| session.message(id)).cloned().collect()
}
