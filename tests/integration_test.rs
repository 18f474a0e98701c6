/// End-to-end integration tests for the session index
///
/// These tests verify complete workflows: log files → rebuild → queries
mod common;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use common::{ClaudeDirBuilder, RecordBuilder, SessionFileBuilder, conversation};
use serde_json::json;
use session_inspector::error::{IndexError, NotFound, QueryError};
use session_inspector::filters::FilterCriteria;
use session_inspector::index_store::{IndexSnapshot, IndexStore, RebuildTrigger};
use session_inspector::models::{ContentBlock, Diagnostic, ImageSourceKind, Session};
use session_inspector::query::{PageRequest, SessionOrder, SortKey, SortOrder};
use session_inspector::IndexConfig;
use tempfile::TempDir;

fn index(claude_dir: &TempDir) -> Arc<IndexSnapshot> {
    let store = IndexStore::new(claude_dir.path().join("projects"), IndexConfig::default());
    store.rebuild(RebuildTrigger::Startup).unwrap();
    store.current()
}

/// Every message id reachable from the roots, the side-chain roots and the
/// unattributed side-chain roots, following same-chain children
fn reachable(snapshot: &IndexSnapshot, session: &Session) -> HashSet<String> {
    let mut stack: Vec<String> = session.root_messages.clone();
    stack.extend(session.side_chain_roots.values().flat_map(|chain| chain.roots.iter().cloned()));
    stack.extend(session.unattributed_side_chains.iter().cloned());

    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        for child in snapshot.get_children(&session.session_id, &id).unwrap() {
            stack.push(child.message_id.clone());
        }
    }
    seen
}

#[test]
fn test_e2e_single_session() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "-Users-alice-work",
            &[SessionFileBuilder::session("s1")
                .summary("Fix the login bug")
                .records(conversation("m", 4).into_iter().map(|r| r.branch("main").cwd("/Users/alice/work")))],
        )
        .build();
    let snapshot = index(&claude);

    assert_eq!(snapshot.generation(), 1);
    assert_eq!(snapshot.session_count(), 1);
    let session = snapshot.session("s1").unwrap();
    assert_eq!(session.message_count, 4);
    assert_eq!(session.total_token_count, 30);
    assert_eq!(session.git_branch.as_deref(), Some("main"));
    assert_eq!(session.project_path.as_deref(), Some("/Users/alice/work"));
    assert_eq!(session.title.as_deref(), Some("Fix the login bug"));
    assert!(session.start_time <= session.end_time);
    assert_eq!(session.duration().num_seconds(), 3);
    assert!(!session.partial);
}

#[test]
fn test_e2e_side_chain_attribution() {
    // A(root) → B(tool_use T1) → C(owner T1) → D
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[SessionFileBuilder::session("s1").records([
                RecordBuilder::user("A").at(0),
                RecordBuilder::assistant("B").parent("A").at(1).tool_use("T1", "Task"),
                RecordBuilder::user("C").parent("B").at(2).owner("T1"),
                RecordBuilder::assistant("D").parent("C").at(3),
            ])],
        )
        .build();
    let snapshot = index(&claude);
    let session = snapshot.session("s1").unwrap();

    assert_eq!(session.message_count, 2);
    assert_eq!(session.main_chain, vec!["A", "B"]);

    let side = snapshot.get_message_tree("s1", Some("T1")).unwrap();
    let entries = side.walk();
    let walked: Vec<(usize, &str)> = entries.iter().map(|e| (e.depth, e.message.message_id.as_str())).collect();
    assert_eq!(walked, vec![(0, "C"), (1, "D")]);
    for entry in &entries {
        assert!(entry.message.is_side_chain);
        assert_eq!(entry.message.owning_tool_use_id.as_deref(), Some("T1"));
    }

    let main = snapshot.get_message_tree("s1", None).unwrap();
    let main_ids: Vec<String> = main.walk().iter().map(|e| e.message.message_id.clone()).collect();
    assert_eq!(main_ids, vec!["A", "B"]);
    assert_eq!(main.side_chains().count(), 1);

    let origin = snapshot.side_chain_origin("s1", "T1").unwrap();
    assert_eq!(origin.message_id, "B");

    let chains = snapshot.list_side_chains("s1").unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].roots, vec!["C"]);
    assert_eq!(chains[0].origin_message_id.as_deref(), Some("B"));
    assert_eq!(chains[0].message_count, 2);
}

#[test]
fn test_e2e_reachability_covers_every_parsed_message() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[SessionFileBuilder::session("s1").records([
                // child before its parent
                RecordBuilder::assistant("b").parent("a").at(1),
                RecordBuilder::user("a").at(0),
                RecordBuilder::assistant("c").parent("b").at(2).tool_use("T1", "Task"),
                RecordBuilder::user("side1").parent("c").owner("T1").at(3),
                RecordBuilder::assistant("side2").parent("side1").at(4),
                RecordBuilder::user("orphan").parent("never-written").at(5),
                RecordBuilder::user("loose").side_chain().at(6),
            ])],
        )
        .build();
    let snapshot = index(&claude);
    let session = snapshot.session("s1").unwrap();

    let parsed: HashSet<String> = session.messages.keys().cloned().collect();
    assert_eq!(parsed.len(), 7);
    assert_eq!(reachable(&snapshot, session), parsed);

    assert!(session.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::OrphanedMessage { message_id, .. } if message_id == "orphan"
    )));
    assert_eq!(session.unattributed_side_chains, vec!["loose"]);
    assert!(session.partial);
}

#[test]
fn test_e2e_list_sessions_unconstrained_returns_each_once() {
    let mut files = Vec::new();
    for i in 0..7 {
        files.push(SessionFileBuilder::session(&format!("s{}", i)).records(conversation(&format!("s{}-", i), 2)));
    }
    let claude = ClaudeDirBuilder::new().with_project("proj", &files).build();
    let snapshot = index(&claude);

    let all = snapshot.list_sessions(&FilterCriteria::any(), SessionOrder::default(), PageRequest::new(0, 100));
    assert_eq!(all.total, 7);
    let ids: BTreeSet<&str> = all.items.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids.len(), 7);

    // Identical start times: ties fall back to session id, so pages partition the order
    let mut paged = Vec::new();
    for number in 0..3 {
        let page = snapshot.list_sessions(&FilterCriteria::any(), SessionOrder::default(), PageRequest::page(number, 3));
        assert_eq!(page.generation, snapshot.generation());
        paged.extend(page.items.into_iter().map(|s| s.session_id));
    }
    let full: Vec<String> = all.items.into_iter().map(|s| s.session_id).collect();
    assert_eq!(paged, full);
    assert_eq!(full, vec!["s0", "s1", "s2", "s3", "s4", "s5", "s6"]);
}

#[test]
fn test_e2e_list_sessions_sort_keys() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[
                SessionFileBuilder::session("old").records(conversation("o", 5)),
                SessionFileBuilder::session("new")
                    .records(conversation("n", 2).into_iter().map(|r| r.at(3600))),
            ],
        )
        .build();
    let snapshot = index(&claude);
    let ids = |order: SessionOrder| -> Vec<String> {
        snapshot
            .list_sessions(&FilterCriteria::any(), order, PageRequest::new(0, 10))
            .items
            .into_iter()
            .map(|s| s.session_id)
            .collect()
    };

    assert_eq!(ids(SessionOrder::default()), vec!["new", "old"]);
    assert_eq!(ids(SessionOrder::new(SortKey::StartTime, SortOrder::Ascending)), vec!["old", "new"]);
    assert_eq!(ids(SessionOrder::new(SortKey::MessageCount, SortOrder::Descending)), vec!["old", "new"]);
    assert_eq!(ids(SessionOrder::new(SortKey::SessionId, SortOrder::Ascending)), vec!["new", "old"]);
    assert_eq!(ids(SessionOrder::new(SortKey::SessionId, SortOrder::Descending)), vec!["old", "new"]);
}

#[test]
fn test_e2e_null_token_usage_counts_zero() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[SessionFileBuilder::session("s1").records([
                RecordBuilder::user("a"),
                RecordBuilder::assistant("b").parent("a"),
            ])],
        )
        .build();
    let snapshot = index(&claude);
    let session = snapshot.session("s1").unwrap();
    assert_eq!(session.total_token_count, 0);
    assert_eq!(session.total_input_tokens, 0);
    assert!(session.messages.values().all(|m| m.token_usage.is_none()));
}

#[test]
fn test_e2e_image_source_kinds_survive() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[SessionFileBuilder::session("s1").record(RecordBuilder::user("img").blocks(json!([
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "iVBORw0KGgo="}},
                {"type": "image", "source": {"type": "url", "url": "https://example.com/diagram.png"}}
            ])))],
        )
        .build();
    let snapshot = index(&claude);
    let message = snapshot.get_message("s1", "img").unwrap();

    match &message.content_blocks[..] {
        [
            ContentBlock::Image { source_kind: first_kind, data_or_url: data, media_type },
            ContentBlock::Image { source_kind: second_kind, data_or_url: url, .. },
        ] => {
            assert_eq!(*first_kind, ImageSourceKind::Base64);
            assert_eq!(data, "iVBORw0KGgo=");
            assert_eq!(media_type.as_deref(), Some("image/png"));
            assert_eq!(*second_kind, ImageSourceKind::Url);
            assert_eq!(url, "https://example.com/diagram.png");
        }
        other => panic!("expected two image blocks, got {:?}", other),
    }
}

#[test]
fn test_e2e_malformed_line_between_valid_ones() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[SessionFileBuilder::session("s1")
                .record(RecordBuilder::user("a"))
                .raw_line(r#"{"type":"user","uuid":"broken","message":"#)
                .record(RecordBuilder::assistant("b").parent("a").at(1))],
        )
        .build();
    let snapshot = index(&claude);
    let session = snapshot.session("s1").unwrap();

    assert_eq!(session.main_chain, vec!["a", "b"]);
    assert_eq!(session.messages["b"].parent_id.as_deref(), Some("a"));
    assert_eq!(session.parse_errors.len(), 1);
    assert_eq!(session.parse_errors[0].line_number, 2);
    assert!(session.partial);
    assert_eq!(snapshot.stats().parse_errors, 1);
}

#[test]
fn test_e2e_messages_page_two_then_one() {
    let claude = ClaudeDirBuilder::new()
        .with_project("proj", &[SessionFileBuilder::session("s1").records(conversation("m", 3))])
        .build();
    let snapshot = index(&claude);

    let first = snapshot.get_messages_page("s1", PageRequest::new(0, 2)).unwrap();
    let second = snapshot.get_messages_page("s1", PageRequest::new(2, 2)).unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(second.items.len(), 1);
    assert_eq!(first.total, 3);
    assert!(first.has_more());
    assert!(!second.has_more());

    let ids: Vec<&str> = first.items.iter().chain(&second.items).map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, vec!["m0", "m1", "m2"]);

    let past_end = snapshot.get_messages_page("s1", PageRequest::new(10, 2)).unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total, 3);
}

#[test]
fn test_e2e_agent_file_becomes_side_chain() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[
                SessionFileBuilder::session("s1").records([
                    RecordBuilder::user("a").session_id("s1"),
                    RecordBuilder::assistant("b").parent("a").at(1).session_id("s1").tool_use("toolu_9", "Task"),
                    RecordBuilder::user("c")
                        .parent("b")
                        .at(5)
                        .session_id("s1")
                        .tool_result("toolu_9")
                        .agent_result("ag1"),
                ]),
                SessionFileBuilder::agent("ag1").records([
                    RecordBuilder::user("x").at(2).session_id("s1").side_chain(),
                    RecordBuilder::assistant("y").parent("x").at(3).session_id("s1").side_chain().usage(7, 3),
                ]),
            ],
        )
        .build();
    let snapshot = index(&claude);
    assert_eq!(snapshot.session_count(), 1);

    let session = snapshot.session("s1").unwrap();
    assert_eq!(session.message_count, 3);
    assert_eq!(session.side_chain_message_count, 2);
    assert_eq!(session.agent_files.len(), 1);
    assert_eq!(session.total_token_count, 10);

    let tree = snapshot.get_message_tree("s1", Some("toolu_9")).unwrap();
    let ids: Vec<&str> = tree.roots().iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, vec!["x"]);
    assert_eq!(snapshot.side_chain_origin("s1", "toolu_9").unwrap().message_id, "b");
    assert_eq!(snapshot.get_message_global("y").unwrap().session_id, "s1");
}

#[test]
fn test_e2e_not_found_is_typed() {
    let claude = ClaudeDirBuilder::new()
        .with_project("proj", &[SessionFileBuilder::session("s1").records(conversation("m", 1))])
        .build();
    let snapshot = index(&claude);

    assert_eq!(
        snapshot.get_messages_page("nope", PageRequest::new(0, 5)).unwrap_err(),
        QueryError::NotFound(NotFound::Session("nope".into()))
    );
    assert!(matches!(
        snapshot.get_message("s1", "zzz"),
        Err(QueryError::NotFound(NotFound::Message { .. }))
    ));
    assert!(matches!(
        snapshot.get_message_tree("s1", Some("toolu_x")),
        Err(QueryError::NotFound(NotFound::SideChain { .. }))
    ));
    assert!(matches!(snapshot.side_chain_origin("s1", "toolu_x"), Err(QueryError::NotFound(_))));
    assert!(matches!(snapshot.get_message_global("zzz"), Err(QueryError::NotFound(NotFound::GlobalMessage(_)))));

    // An existing session with no matching data is not a miss
    let empty = snapshot.list_sessions(
        &FilterCriteria::any().with_message_count(100..=200),
        SessionOrder::default(),
        PageRequest::new(0, 5),
    );
    assert_eq!(empty.total, 0);
}

#[test]
fn test_e2e_unusable_files_do_not_abort_others() {
    let claude = ClaudeDirBuilder::new()
        .with_project(
            "proj",
            &[
                SessionFileBuilder::session("good").records(conversation("g", 2)),
                SessionFileBuilder::session("garbage").raw_line("not json").raw_line("{}"),
                SessionFileBuilder::session("empty"),
            ],
        )
        .build();
    let snapshot = index(&claude);

    assert_eq!(snapshot.session_count(), 1);
    assert!(snapshot.session("good").is_some());
    assert_eq!(snapshot.failures().len(), 2);
    assert_eq!(snapshot.stats().files_failed, 2);
}

#[test]
fn test_e2e_missing_source_keeps_previous_snapshot() {
    let claude = ClaudeDirBuilder::new()
        .with_project("proj", &[SessionFileBuilder::session("s1").records(conversation("m", 2))])
        .build();
    let store = IndexStore::new(claude.path().join("projects"), IndexConfig::default());
    store.rebuild(RebuildTrigger::Startup).unwrap();
    let before = store.current();

    std::fs::remove_dir_all(claude.path().join("projects")).unwrap();
    let err = store.rebuild(RebuildTrigger::Manual).unwrap_err();
    assert!(matches!(err, IndexError::SourceUnavailable { .. }));

    let after = store.current();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(after.session("s1").is_some());
}
