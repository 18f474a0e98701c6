//! Links one session's messages into a forest and attributes side-chains.
//!
//! Linking is a single pass in file order. A child that arrives before its
//! parent waits in a per-parent buffer and is attached when the parent shows
//! up; whatever is still buffered at the end of the file becomes a synthetic
//! root flagged [`Diagnostic::OrphanedMessage`].
//!
//! Every node has at most one parent, so a node that cannot be reached from a
//! root after linking hangs off a parent cycle. Each cycle is cut at its
//! earliest member in file order ([`Diagnostic::CycleBroken`]). A session in
//! which no message is a root at all is rejected with
//! [`BuildError::UnresolvableCycle`].
//!
//! Side-chain attribution walks each tree from its root. A message starts a
//! side-chain when it is not already inside an attributed one and either names
//! an owning tool invocation or carries the raw side-chain flag. Descendants
//! inherit the owner of the nearest start toward the root. A start node keeps
//! its `parent_id` (so callers can step back out) but is removed from the
//! parent's `children`, which therefore list same-chain children only.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::BuildError;
use crate::models::{Diagnostic, Message, SideChain};

/// A linked, attributed session forest, not yet aggregated
#[derive(Debug, Clone, Default)]
pub struct SessionTree {
    pub session_id: String,
    /// Surviving messages in file order with links and attribution filled in
    pub messages: Vec<Message>,
    /// Main-chain roots in file order
    pub root_messages: Vec<String>,
    /// Main-chain message ids in file order
    pub main_chain: Vec<String>,
    pub side_chain_roots: BTreeMap<String, SideChain>,
    /// Roots of side-chains with no known owning invocation
    pub unattributed_side_chains: Vec<String>,
    /// tool_use_id -> id of the message holding the tool_use block
    pub tool_uses: HashMap<String, String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Positional parent/child links over the deduplicated nodes
struct Links {
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chain {
    Main,
    Side(Option<String>),
}

#[derive(Debug, Clone)]
struct Placement {
    chain: Chain,
    /// First node of its chain along the path from the root
    starts: bool,
}

/// Build the forest for one session from its messages in file order
pub fn build_tree(session_id: &str, messages: Vec<Message>) -> Result<SessionTree, BuildError> {
    let mut diagnostics = Vec::new();
    let mut nodes = dedup(messages, &mut diagnostics);

    if nodes.is_empty() {
        return Err(BuildError::EmptySession { session_id: session_id.to_string() });
    }

    let mut links = link(&mut nodes, &mut diagnostics);
    if links.roots.is_empty() {
        return Err(BuildError::UnresolvableCycle { session_id: session_id.to_string() });
    }
    break_cycles(&mut nodes, &mut links, &mut diagnostics);
    links.roots.sort_unstable();

    let tool_uses = collect_tool_uses(&nodes);
    flag_unresolved_results(&nodes, &tool_uses, &mut diagnostics);

    let placements = attribute(&nodes, &links, &mut diagnostics);

    for (position, placement) in placements.iter().enumerate() {
        if placement.starts
            && let Some(parent) = links.parent[position]
        {
            links.children[parent].retain(|&child| child != position);
        }
    }

    let mut tree = SessionTree { session_id: session_id.to_string(), ..SessionTree::default() };

    for (position, placement) in placements.into_iter().enumerate() {
        let children: Vec<String> =
            links.children[position].iter().map(|&c| nodes[c].message_id.clone()).collect();
        let node = &mut nodes[position];
        node.children = children;

        match placement.chain {
            Chain::Main => {
                node.is_side_chain = false;
                node.owning_tool_use_id = None;
                tree.main_chain.push(node.message_id.clone());
                if placement.starts {
                    tree.root_messages.push(node.message_id.clone());
                }
            }
            Chain::Side(Some(owner)) => {
                node.is_side_chain = true;
                node.owning_tool_use_id = Some(owner.clone());

                let side_chain = tree.side_chain_roots.entry(owner.clone()).or_insert_with(|| SideChain {
                    origin_message_id: tool_uses.get(&owner).cloned(),
                    tool_use_id: owner.clone(),
                    roots: Vec::new(),
                    message_count: 0,
                });
                side_chain.message_count += 1;
                if placement.starts {
                    if !side_chain.roots.is_empty() {
                        diagnostics.push(Diagnostic::DuplicateSideChainRoot {
                            tool_use_id: owner,
                            message_id: node.message_id.clone(),
                        });
                    }
                    side_chain.roots.push(node.message_id.clone());
                }
            }
            Chain::Side(None) => {
                node.is_side_chain = true;
                node.owning_tool_use_id = None;
                if placement.starts {
                    diagnostics.push(Diagnostic::UnattributedSideChain {
                        root_message_id: node.message_id.clone(),
                        agent_id: None,
                    });
                    tree.unattributed_side_chains.push(node.message_id.clone());
                }
            }
        }
    }

    tree.messages = nodes;
    tree.tool_uses = tool_uses;
    tree.diagnostics = diagnostics;
    Ok(tree)
}

/// Keep the first record for each id
fn dedup(messages: Vec<Message>, diagnostics: &mut Vec<Diagnostic>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(messages.len());
    let mut nodes = Vec::with_capacity(messages.len());

    for mut message in messages {
        if !seen.insert(message.message_id.clone()) {
            diagnostics.push(Diagnostic::DuplicateMessageId {
                message_id: message.message_id,
                line_number: message.line_number,
            });
            continue;
        }
        message.children.clear();
        nodes.push(message);
    }

    nodes
}

/// Single pass with a deferred-link buffer for children seen before their parent
fn link(nodes: &mut [Message], diagnostics: &mut Vec<Diagnostic>) -> Links {
    let count = nodes.len();
    let mut parent = vec![None; count];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut roots = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(count);
    let mut pending: HashMap<String, Vec<usize>> = HashMap::new();

    for position in 0..count {
        match nodes[position].parent_id.as_deref() {
            None => roots.push(position),
            Some(parent_id) => match index.get(parent_id) {
                Some(&found) => {
                    parent[position] = Some(found);
                    children[found].push(position);
                }
                None => pending.entry(parent_id.to_string()).or_default().push(position),
            },
        }

        let id = nodes[position].message_id.clone();
        if let Some(waiting) = pending.remove(&id) {
            for child in waiting {
                parent[child] = Some(position);
                children[position].push(child);
            }
            // Early children were buffered; keep the list in file order
            children[position].sort_unstable();
        }
        index.insert(id, position);
    }

    let mut orphans: Vec<(usize, String)> = pending
        .into_iter()
        .flat_map(|(missing, waiting)| waiting.into_iter().map(move |child| (child, missing.clone())))
        .collect();
    orphans.sort_unstable();

    for (position, missing_parent_id) in orphans {
        nodes[position].parent_id = None;
        roots.push(position);
        diagnostics.push(Diagnostic::OrphanedMessage {
            message_id: nodes[position].message_id.clone(),
            missing_parent_id,
        });
    }

    Links { parent, children, roots }
}

/// Cut every parent cycle at its earliest member and promote that member to a root
fn break_cycles(nodes: &mut [Message], links: &mut Links, diagnostics: &mut Vec<Diagnostic>) {
    let mut reached = vec![false; nodes.len()];
    for &root in &links.roots {
        mark_reachable(root, &links.children, &mut reached);
    }

    let mut cursor = 0;
    while let Some(start) = (cursor..nodes.len()).find(|&p| !reached[p]) {
        cursor = start;

        // Walk parents until a node repeats; that node is on the cycle
        let mut on_path = HashSet::new();
        let mut current = start;
        while on_path.insert(current) {
            match links.parent[current] {
                Some(up) => current = up,
                None => break,
            }
        }

        let mut earliest = current;
        let mut member = current;
        while let Some(up) = links.parent[member] {
            if up == current {
                break;
            }
            earliest = earliest.min(up);
            member = up;
        }

        if let Some(up) = links.parent[earliest].take() {
            links.children[up].retain(|&c| c != earliest);
        }
        nodes[earliest].parent_id = None;
        links.roots.push(earliest);
        diagnostics.push(Diagnostic::CycleBroken { message_id: nodes[earliest].message_id.clone() });
        mark_reachable(earliest, &links.children, &mut reached);
    }
}

fn mark_reachable(root: usize, children: &[Vec<usize>], reached: &mut [bool]) {
    let mut stack = vec![root];
    while let Some(position) = stack.pop() {
        if reached[position] {
            continue;
        }
        reached[position] = true;
        stack.extend(children[position].iter().copied());
    }
}

/// Assign every node to the main chain or a side-chain, walking down from roots
fn attribute(nodes: &[Message], links: &Links, diagnostics: &mut Vec<Diagnostic>) -> Vec<Placement> {
    let mut placements = vec![Placement { chain: Chain::Main, starts: false }; nodes.len()];
    let mut stack: Vec<(usize, Option<Chain>)> = links.roots.iter().rev().map(|&r| (r, None)).collect();

    while let Some((position, inherited)) = stack.pop() {
        let node = &nodes[position];
        let claim = node.owning_tool_use_id.as_deref();

        let chain = match (&inherited, claim) {
            (Some(Chain::Side(Some(owner))), Some(claimed)) if claimed != owner => {
                diagnostics.push(Diagnostic::ConflictingSideChainOwner {
                    message_id: node.message_id.clone(),
                    claimed: claimed.to_string(),
                    inherited: owner.clone(),
                });
                Chain::Side(Some(owner.clone()))
            }
            (Some(Chain::Side(Some(owner))), _) => Chain::Side(Some(owner.clone())),
            (_, Some(claimed)) => Chain::Side(Some(claimed.to_string())),
            (Some(Chain::Side(None)), None) => Chain::Side(None),
            (_, None) if node.is_side_chain => Chain::Side(None),
            _ => Chain::Main,
        };

        let starts = inherited.as_ref() != Some(&chain);
        for &child in links.children[position].iter().rev() {
            stack.push((child, Some(chain.clone())));
        }
        placements[position] = Placement { chain, starts };
    }

    placements
}

fn collect_tool_uses(nodes: &[Message]) -> HashMap<String, String> {
    let mut tool_uses = HashMap::new();
    for node in nodes {
        for tool_use_id in node.tool_use_ids() {
            tool_uses.entry(tool_use_id.to_string()).or_insert_with(|| node.message_id.clone());
        }
    }
    tool_uses
}

fn flag_unresolved_results(
    nodes: &[Message],
    tool_uses: &HashMap<String, String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for node in nodes {
        for tool_use_id in node.tool_result_ids() {
            if !tool_uses.contains_key(tool_use_id) {
                diagnostics.push(Diagnostic::UnresolvedToolResult {
                    message_id: node.message_id.clone(),
                    tool_use_id: tool_use_id.to_string(),
                });
            }
        }
    }
}
