use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::config::IndexConfig;
use crate::filters::parse_filter;
use crate::index_store::{IndexSnapshot, IndexStats, IndexStore, RebuildTrigger};
use crate::models::Message;
use crate::query::{PageRequest, SessionOrder, SortKey, SortOrder};
use crate::utils::{format_path_with_tilde, preview_line};

const TITLE_PREVIEW_CHARS: usize = 60;
const MESSAGE_PREVIEW_CHARS: usize = 100;
const FIELD_PREVIEW_CHARS: usize = 80;
const FAILURE_PREVIEW_CHARS: usize = 240;

#[derive(Parser)]
#[command(name = "session-inspector")]
#[command(version)]
#[command(about = "Index and query coding-assistant session logs", long_about = None)]
pub struct Cli {
    /// Claude data directory (default: $CLAUDE_CONFIG_DIR, then ~/.claude)
    #[arg(long, global = true, value_name = "DIR")]
    pub claude_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show statistics about the index
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// List sessions, newest first unless sorted otherwise
    List {
        /// Filter expression, e.g. `messages:10.. branch:feature/* role:tool`
        #[arg(long, short)]
        filter: Option<String>,
        #[arg(long, value_enum, default_value_t = SortArg::Start)]
        sort: SortArg,
        /// Ascending order
        #[arg(long)]
        asc: bool,
        /// 1-based page number
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        page: u64,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show a page of a session's main chain
    Show {
        session_id: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show a session's message tree, or one side-chain of it
    Tree {
        session_id: String,
        /// `tool_use_id` that owns the side-chain to show
        #[arg(long, value_name = "TOOL_USE_ID")]
        side_chain: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Start,
    End,
    Messages,
    Tokens,
    Id,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Start => SortKey::StartTime,
            SortArg::End => SortKey::EndTime,
            SortArg::Messages => SortKey::MessageCount,
            SortArg::Tokens => SortKey::TokenCount,
            SortArg::Id => SortKey::SessionId,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = &cli.command else {
        println!("Use --help for usage information");
        return Ok(());
    };

    let mut config = IndexConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.claude_dir {
        config.claude_dir = Some(dir.clone());
    }
    let page_size = config.default_page_size;

    let store = IndexStore::from_config(config)?;
    store
        .rebuild(RebuildTrigger::Startup)
        .with_context(|| format!("failed to index {}", format_path_with_tilde(store.source_dir())))?;
    let snapshot = store.current();

    match command {
        Commands::Stats { json } => show_stats(&snapshot, *json),
        Commands::List { filter, sort, asc, page, page_size: size, json } => {
            let direction = if *asc { SortOrder::Ascending } else { SortOrder::Descending };
            let order = SessionOrder::new((*sort).into(), direction);
            let limit = size.unwrap_or(page_size);
            let page = PageRequest::page((*page - 1) as usize, limit);
            list_sessions(&snapshot, filter.as_deref(), order, page, *json)
        }
        Commands::Show { session_id, offset, limit, json } => {
            let page = PageRequest::new(*offset, limit.unwrap_or(page_size));
            show_messages(&snapshot, session_id, page, *json)
        }
        Commands::Tree { session_id, side_chain, json } => {
            show_tree(&snapshot, session_id, side_chain.as_deref(), *json)
        }
    }
}

#[derive(Serialize)]
struct StatsView<'a> {
    generation: u64,
    source_dir: Option<&'a Path>,
    sessions: usize,
    messages: usize,
    stats: &'a IndexStats,
    failures: Vec<FailureView<'a>>,
}

#[derive(Serialize)]
struct FailureView<'a> {
    path: &'a Path,
    error: String,
}

fn show_stats(snapshot: &IndexSnapshot, json: bool) -> Result<()> {
    let failures: Vec<FailureView> = snapshot
        .failures()
        .iter()
        .map(|failure| FailureView { path: &failure.path, error: failure.error.to_string() })
        .collect();

    if json {
        let view = StatsView {
            generation: snapshot.generation(),
            source_dir: snapshot.source_dir(),
            sessions: snapshot.session_count(),
            messages: snapshot.message_count(),
            stats: snapshot.stats(),
            failures,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let stats = snapshot.stats();
    println!("Session Index Statistics");
    println!("========================");
    println!("Sessions: {}", snapshot.session_count());
    println!("  Partial: {}", stats.sessions_partial);
    println!("Messages indexed: {}", snapshot.message_count());
    println!("Files scanned: {}", stats.files_scanned);
    println!("  Failed: {}", stats.files_failed);
    println!("  Skipped: {}", stats.files_skipped);
    println!("Parse errors: {}", stats.parse_errors);
    println!("Metadata records: {}", stats.metadata_records);
    if let Some(dir) = snapshot.source_dir() {
        println!();
        println!("Source directory: {}", format_path_with_tilde(dir));
    }

    if let Some(oldest) = snapshot.sessions().map(|s| s.start_time).min() {
        println!("Oldest session: {}", oldest.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(newest) = snapshot.sessions().map(|s| s.end_time).max() {
        println!("Newest activity: {}", newest.format("%Y-%m-%d %H:%M:%S"));
    }

    for failure in &failures {
        let line = format!("{}: {}", format_path_with_tilde(failure.path), failure.error);
        println!("  ! {}", preview_line(&line, FAILURE_PREVIEW_CHARS));
    }

    Ok(())
}

fn list_sessions(
    snapshot: &IndexSnapshot,
    filter: Option<&str>,
    order: SessionOrder,
    page: PageRequest,
    json: bool,
) -> Result<()> {
    let criteria = parse_filter(filter.unwrap_or_default()).context("invalid filter")?;
    let result = snapshot.list_sessions(&criteria, order, page);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for summary in &result.items {
        let title = summary.title.as_deref().map(|t| preview_line(t, TITLE_PREVIEW_CHARS)).unwrap_or_default();
        println!(
            "{}  {}  {:>5} msgs  {:>9} tokens  {:<20}  {}{}",
            summary.start_time.format("%Y-%m-%d %H:%M"),
            field(&summary.session_id),
            summary.message_count,
            summary.total_token_count,
            summary.git_branch.as_deref().map_or_else(|| "-".to_string(), field),
            if summary.partial { "[partial] " } else { "" },
            title
        );
    }

    let shown_from = if result.items.is_empty() { 0 } else { result.offset + 1 };
    println!("Showing {}-{} of {} sessions", shown_from, result.offset + result.items.len(), result.total);
    Ok(())
}

fn show_messages(snapshot: &IndexSnapshot, session_id: &str, page: PageRequest, json: bool) -> Result<()> {
    let result = snapshot.get_messages_page(session_id, page)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for message in &result.items {
        println!("{}", message_line(message));
    }
    println!(
        "Messages {}-{} of {}",
        if result.items.is_empty() { 0 } else { result.offset + 1 },
        result.offset + result.items.len(),
        result.total
    );
    Ok(())
}

fn show_tree(snapshot: &IndexSnapshot, session_id: &str, side_chain: Option<&str>, json: bool) -> Result<()> {
    let tree = snapshot.get_message_tree(session_id, side_chain)?;
    let entries = tree.walk();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!("{}{}", "  ".repeat(entry.depth), message_line(entry.message));
    }

    if tree.side_chain().is_none() {
        let chains: Vec<_> = tree.side_chains().collect();
        if !chains.is_empty() {
            println!();
            println!("Side-chains:");
            for chain in chains {
                println!(
                    "  {}  {} messages  from {}",
                    field(&chain.tool_use_id),
                    chain.message_count,
                    chain.origin_message_id.as_deref().map_or_else(|| "?".to_string(), field)
                );
            }
        }
        for root in tree.unattributed_roots() {
            println!("  (unattributed)  root {}", field(&root.message_id));
        }
    }
    Ok(())
}

/// `[role] time id  preview`, falling back to block kinds when there is no text
fn message_line(message: &Message) -> String {
    let preview = match message.text() {
        Some(text) => preview_line(&text, MESSAGE_PREVIEW_CHARS),
        None => {
            let kinds: Vec<&str> = message.content_blocks.iter().map(|b| b.kind().as_str()).collect();
            format!("<{}>", kinds.join(", "))
        }
    };
    format!(
        "[{}] {} {}  {}",
        message.sender_role.as_str(),
        message.timestamp.format("%H:%M:%S"),
        field(&message.message_id),
        preview
    )
}

/// Identifiers and branch names come straight from log files
fn field(value: &str) -> String {
    preview_line(value, FIELD_PREVIEW_CHARS)
}
