//! Per-session build pipeline.
//!
//! # Error Handling Strategy
//!
//! Graceful degradation at every level:
//!
//! - **Line-level**: malformed lines are skipped by the parser and attached to
//!   the session as parse errors; the session is built from the rest.
//! - **Session-level**: a session that cannot be built (unreadable, oversized,
//!   empty, or one big cycle) becomes a [`FileFailure`] and is left out. Other
//!   sessions are unaffected.
//! - **Sub-agent files**: a sub-agent log that cannot be read is recorded on its
//!   parent session as a diagnostic. One whose parent session does not exist is
//!   a [`FileFailure`].
//!
//! Files are parsed on the rayon thread pool, one task per session. Results are
//! collected in discovery order so output does not depend on scheduling.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use super::aggregate::{SessionSources, aggregate};
use super::discovery::{AgentSource, SessionSource, discover_sources};
use super::tree::build_tree;
use crate::config::IndexConfig;
use crate::error::{BuildError, IndexError};
use crate::index_store::fingerprint::unchanged;
use crate::index_store::{FileFailure, FileFingerprint, IndexSnapshot, IndexStats};
use crate::models::{Diagnostic, Message, Session};
use crate::parsers::{parse_session_file, peek_session_id};

/// Sessions and failures produced by one build pass
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub sessions: HashMap<String, Arc<Session>>,
    pub failures: Vec<FileFailure>,
    pub stats: IndexStats,
}

/// One session plus the sub-agent logs merged into it
#[derive(Debug, Clone)]
struct SessionJob {
    source: SessionSource,
    agents: Vec<AgentSource>,
}

enum JobResult {
    Built(Session),
    Reused(Arc<Session>),
    Failed(FileFailure),
}

/// Build every session under `source_dir`.
///
/// Sessions whose files are unchanged since `previous` are taken over as-is.
///
/// # Errors
///
/// Only a missing or unreadable `source_dir` fails the pass.
pub fn build_sessions(
    source_dir: &Path,
    config: &IndexConfig,
    previous: Option<&IndexSnapshot>,
) -> Result<BuildOutput, IndexError> {
    let discovered = discover_sources(source_dir)?;

    let mut output = BuildOutput::default();
    output.stats.files_skipped = discovered.skipped.len();
    output.stats.files_scanned = discovered.sessions.len();

    let mut jobs: BTreeMap<String, SessionJob> = BTreeMap::new();
    for source in discovered.sessions {
        if let Some(existing) = jobs.get(&source.session_id) {
            warn!(
                session_id = %source.session_id,
                kept = %existing.source.path.display(),
                skipped = %source.path.display(),
                "duplicate session id"
            );
            output.failures.push(FileFailure {
                error: BuildError::DuplicateSession {
                    session_id: source.session_id,
                    kept: existing.source.path.clone(),
                },
                path: source.path,
            });
            continue;
        }
        jobs.insert(source.session_id.clone(), SessionJob { source, agents: Vec::new() });
    }

    if config.include_agent_files {
        output.stats.files_scanned += discovered.agents.len();
        assign_agents(discovered.agents, &mut jobs, config.max_file_size_bytes, &mut output.failures);
    }

    let results: Vec<JobResult> = jobs
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|job| run_job(job, config, previous))
        .collect();

    for result in results {
        match result {
            JobResult::Built(session) => {
                output.stats.sessions_built += 1;
                record_session(&mut output, Arc::new(session));
            }
            JobResult::Reused(session) => {
                output.stats.sessions_reused += 1;
                record_session(&mut output, session);
            }
            JobResult::Failed(failure) => {
                warn!(path = %failure.path.display(), error = %failure.error, "session not indexed");
                output.failures.push(failure);
            }
        }
    }

    output.stats.files_failed = output.failures.len();
    Ok(output)
}

fn record_session(output: &mut BuildOutput, session: Arc<Session>) {
    if session.partial {
        output.stats.sessions_partial += 1;
    }
    output.stats.parse_errors += session.parse_errors.len();
    output.stats.metadata_records += session.metadata_records;
    output.stats.messages_indexed += session.messages.len();
    output.sessions.insert(session.session_id.clone(), session);
}

/// Attach each sub-agent log to the session it belongs to
fn assign_agents(
    agents: Vec<AgentSource>,
    jobs: &mut BTreeMap<String, SessionJob>,
    max_size: u64,
    failures: &mut Vec<FileFailure>,
) {
    let owners: Vec<(AgentSource, Result<Option<String>, BuildError>)> = agents
        .into_par_iter()
        .map(|agent| {
            let declared = peek_session_id(&agent.path, max_size);
            (agent, declared)
        })
        .collect();

    for (agent, declared) in owners {
        let session_id = match declared {
            Ok(declared) => declared.or_else(|| agent.layout_session_id.clone()),
            Err(error) => {
                failures.push(FileFailure { path: agent.path, error });
                continue;
            }
        };

        let Some(session_id) = session_id else {
            failures.push(FileFailure {
                error: BuildError::FileUnreadable {
                    path: agent.path.clone(),
                    reason: "sub-agent log names no session".to_string(),
                },
                path: agent.path,
            });
            continue;
        };

        match jobs.get_mut(&session_id) {
            Some(job) => job.agents.push(agent),
            None => failures.push(FileFailure {
                error: BuildError::MissingParentSession { path: agent.path.clone(), session_id },
                path: agent.path,
            }),
        }
    }
}

fn run_job(job: SessionJob, config: &IndexConfig, previous: Option<&IndexSnapshot>) -> JobResult {
    let fingerprints = match fingerprint_job(&job) {
        Ok(fingerprints) => fingerprints,
        Err(error) => return JobResult::Failed(FileFailure { path: job.source.path, error }),
    };

    if let Some(prior) = previous.and_then(|snapshot| snapshot.session(&job.source.session_id))
        && unchanged(&prior.files, &fingerprints)
    {
        debug!(session_id = %job.source.session_id, "session unchanged, reusing");
        return JobResult::Reused(Arc::clone(prior));
    }

    let path = job.source.path.clone();
    match build_session(job, fingerprints, config.max_file_size_bytes) {
        Ok(session) => JobResult::Built(session),
        Err(error) => JobResult::Failed(FileFailure { path, error }),
    }
}

fn fingerprint_job(job: &SessionJob) -> Result<Vec<FileFingerprint>, BuildError> {
    std::iter::once(&job.source.path)
        .chain(job.agents.iter().map(|a| &a.path))
        .map(|path| {
            FileFingerprint::from_path(path).map_err(|e| BuildError::FileUnreadable {
                path: path.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse, link and aggregate one session and its sub-agent logs
fn build_session(
    job: SessionJob,
    files: Vec<FileFingerprint>,
    max_size: u64,
) -> Result<Session, BuildError> {
    let SessionJob { source, mut agents } = job;
    let session_id = source.session_id;

    let main = parse_session_file(&source.path, max_size)?;
    if let Some(declared) = &main.declared_session_id
        && *declared != session_id
    {
        debug!(%session_id, %declared, "file name and sessionId differ; using file name");
    }
    if main.incomplete_tail {
        debug!(%session_id, "ignoring unterminated final line");
    }

    let mut messages: Vec<Message> = main.messages;
    for message in &mut messages {
        message.session_id.clone_from(&session_id);
    }

    let mut metadata_records = main.metadata_records;
    let mut diagnostics = Vec::new();
    let mut agent_files = Vec::new();
    let mut unowned_agents: HashMap<String, String> = HashMap::new();

    agents.sort_by(|a, b| a.path.cmp(&b.path));
    let mut agent_logs = Vec::new();
    for agent in agents {
        let parsed = match parse_session_file(&agent.path, max_size) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(%session_id, path = %agent.path.display(), %error, "skipping sub-agent log");
                diagnostics.push(Diagnostic::AgentFileSkipped { path: agent.path, reason: error.to_string() });
                continue;
            }
        };

        if !parsed.parse_errors.is_empty() {
            diagnostics.push(Diagnostic::AgentFileParseErrors {
                path: agent.path.clone(),
                count: parsed.parse_errors.len(),
            });
        }
        metadata_records += parsed.metadata_records;

        agent_logs.push(AgentLog {
            agent_id: agent.agent_id,
            declared_agent_id: parsed.declared_agent_id,
            messages: parsed.messages,
        });
        agent_files.push(agent.path);
    }

    // A nested agent is launched from inside another agent's log
    let owners = agent_owners(messages.iter().chain(agent_logs.iter().flat_map(|log| &log.messages)));
    for log in agent_logs {
        let owner = owners
            .get(&log.agent_id)
            .or_else(|| log.declared_agent_id.as_ref().and_then(|id| owners.get(id)))
            .cloned();
        for mut message in log.messages {
            message.session_id.clone_from(&session_id);
            message.is_side_chain = true;
            if message.owning_tool_use_id.is_none() {
                match &owner {
                    Some(owner) => message.owning_tool_use_id = Some(owner.clone()),
                    None => {
                        unowned_agents.insert(message.message_id.clone(), log.agent_id.clone());
                    }
                }
            }
            messages.push(message);
        }
    }

    let mut tree = build_tree(&session_id, messages)?;
    for diagnostic in &mut tree.diagnostics {
        if let Diagnostic::UnattributedSideChain { root_message_id, agent_id } = diagnostic {
            *agent_id = unowned_agents.get(root_message_id).cloned();
        }
    }

    let session = aggregate(
        tree,
        SessionSources {
            file_path: source.path,
            agent_files,
            summary: main.summary,
            parse_errors: main.parse_errors,
            metadata_records,
            diagnostics,
            files,
        },
    );

    if session.partial {
        warn!(
            %session_id,
            parse_errors = session.parse_errors.len(),
            diagnostics = session.diagnostics.len(),
            "session indexed with problems"
        );
    }
    Ok(session)
}

/// Messages parsed from one sub-agent log
struct AgentLog {
    /// From the file name
    agent_id: String,
    declared_agent_id: Option<String>,
    messages: Vec<Message>,
}

/// Map each reported agent id to the tool_use_id whose result announced it.
/// The first announcement wins.
fn agent_owners<'a>(messages: impl Iterator<Item = &'a Message>) -> HashMap<String, String> {
    let mut owners = HashMap::new();
    for agent in messages.filter_map(|m| m.agent.as_ref()) {
        if let Some(tool_use_id) = &agent.tool_use_id {
            owners.entry(agent.agent_id.clone()).or_insert_with(|| tool_use_id.clone());
        }
    }
    owners
}
