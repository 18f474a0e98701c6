//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

/// Base timestamp for generated records: 2025-01-15T12:00:00Z
pub const BASE_TS: i64 = 1_736_942_400;

/// Builder for test `.claude` directories with a `projects/` tree
pub struct ClaudeDirBuilder {
    temp_dir: TempDir,
}

impl ClaudeDirBuilder {
    /// Create a new builder with an empty `projects/` directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join("projects")).expect("Failed to create projects dir");
        Self { temp_dir }
    }

    /// Path of the `.claude` directory
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.temp_dir.path().join("projects")
    }

    /// Add a project directory holding the given session logs
    pub fn with_project(self, name: &str, files: &[SessionFileBuilder]) -> Self {
        let project_dir = self.projects_dir().join(name);
        fs::create_dir_all(&project_dir).expect("Failed to create project dir");
        for file in files {
            file.create_in(&project_dir);
        }
        self
    }

    /// Build and return the temp directory (consumes self)
    pub fn build(self) -> TempDir {
        self.temp_dir
    }
}

impl Default for ClaudeDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one JSONL log file
pub struct SessionFileBuilder {
    file_name: String,
    lines: Vec<String>,
    trailing_newline: bool,
}

impl SessionFileBuilder {
    /// Main session log `<session_id>.jsonl`
    pub fn session(session_id: &str) -> Self {
        Self { file_name: format!("{}.jsonl", session_id), lines: Vec::new(), trailing_newline: true }
    }

    /// Sub-agent log `agent-<agent_id>.jsonl`
    pub fn agent(agent_id: &str) -> Self {
        Self { file_name: format!("agent-{}.jsonl", agent_id), lines: Vec::new(), trailing_newline: true }
    }

    /// Path relative to the project directory, e.g. `sid/subagents/agent-x.jsonl`
    pub fn at(mut self, relative: &str) -> Self {
        self.file_name = relative.to_string();
        self
    }

    pub fn record(mut self, record: RecordBuilder) -> Self {
        self.lines.push(record.to_json());
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = RecordBuilder>) -> Self {
        self.lines.extend(records.into_iter().map(|r| r.to_json()));
        self
    }

    /// Append a line verbatim (malformed JSON, blank lines, ...)
    pub fn raw_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn summary(mut self, text: &str) -> Self {
        self.lines.push(json!({"type": "summary", "summary": text, "leafUuid": "leaf"}).to_string());
        self
    }

    pub fn metadata(mut self, kind: &str) -> Self {
        self.lines.push(json!({"type": kind, "messageId": "m", "snapshot": {}}).to_string());
        self
    }

    pub fn without_trailing_newline(mut self) -> Self {
        self.trailing_newline = false;
        self
    }

    pub fn content(&self) -> String {
        let mut content = self.lines.join("\n");
        if self.trailing_newline && !content.is_empty() {
            content.push('\n');
        }
        content
    }

    pub fn create_in(&self, dir: &Path) -> PathBuf {
        let path = dir.join(&self.file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create log parent dir");
        }
        fs::write(&path, self.content()).expect("Failed to write log file");
        path
    }
}

/// Builder for one conversation record line
#[derive(Clone)]
pub struct RecordBuilder {
    record: Value,
}

impl RecordBuilder {
    fn base(kind: &str, uuid: &str) -> Self {
        Self {
            record: json!({
                "type": kind,
                "uuid": uuid,
                "parentUuid": null,
                "timestamp": "2025-01-15T12:00:00.000Z",
                "isSidechain": false,
                "message": {"role": kind, "content": format!("{} message {}", kind, uuid)},
            }),
        }
    }

    pub fn user(uuid: &str) -> Self {
        Self::base("user", uuid)
    }

    pub fn assistant(uuid: &str) -> Self {
        Self::base("assistant", uuid)
    }

    pub fn parent(mut self, parent: &str) -> Self {
        self.record["parentUuid"] = json!(parent);
        self
    }

    /// Seconds after [`BASE_TS`]
    pub fn at(mut self, offset_secs: i64) -> Self {
        let ts = chrono::DateTime::from_timestamp(BASE_TS + offset_secs, 0).expect("valid timestamp");
        self.record["timestamp"] = json!(ts.to_rfc3339());
        self
    }

    pub fn session_id(mut self, session_id: &str) -> Self {
        self.record["sessionId"] = json!(session_id);
        self
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.record["gitBranch"] = json!(branch);
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.record["cwd"] = json!(cwd);
        self
    }

    pub fn usage(mut self, input: u64, output: u64) -> Self {
        self.record["message"]["usage"] = json!({"input_tokens": input, "output_tokens": output});
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.record["message"]["content"] = json!(text);
        self
    }

    /// Replace the content with explicit blocks
    pub fn blocks(mut self, blocks: Value) -> Self {
        self.record["message"]["content"] = blocks;
        self
    }

    pub fn tool_use(self, tool_use_id: &str, name: &str) -> Self {
        self.blocks(json!([
            {"type": "text", "text": "Delegating"},
            {"type": "tool_use", "id": tool_use_id, "name": name, "input": {"prompt": "go"}}
        ]))
    }

    pub fn tool_result(self, tool_use_id: &str) -> Self {
        self.blocks(json!([{"type": "tool_result", "tool_use_id": tool_use_id, "content": "done"}]))
    }

    pub fn side_chain(mut self) -> Self {
        self.record["isSidechain"] = json!(true);
        self
    }

    /// Name the owning tool invocation directly
    pub fn owner(mut self, tool_use_id: &str) -> Self {
        self.record["parentToolUseId"] = json!(tool_use_id);
        self
    }

    /// `toolUseResult` of a finished sub-agent run
    pub fn agent_result(mut self, agent_id: &str) -> Self {
        self.record["toolUseResult"] = json!({
            "status": "completed",
            "agentId": agent_id,
            "prompt": "Search the codebase",
            "totalTokens": 1200,
            "totalDurationMs": 3400
        });
        self
    }

    pub fn to_json(&self) -> String {
        self.record.to_string()
    }
}

/// A linear user/assistant conversation of `n` messages `<prefix>0..<prefix>n-1`
pub fn conversation(prefix: &str, n: usize) -> Vec<RecordBuilder> {
    (0..n)
        .map(|i| {
            let id = format!("{}{}", prefix, i);
            let record = if i % 2 == 0 {
                RecordBuilder::user(&id)
            } else {
                RecordBuilder::assistant(&id).usage(10, 5)
            };
            let record = record.at(i as i64);
            if i == 0 { record } else { record.parent(&format!("{}{}", prefix, i - 1)) }
        })
        .collect()
}
