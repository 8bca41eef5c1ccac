//! Append-only call recorder.
//!
//! Every dispatch attempt (and every connection lifecycle event) becomes one
//! JSONL line in a local audit file. The sink is best-effort: a failed write
//! is warned about and dropped, never surfaced to the conversation.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::Value;

/// Pseudo-event names recorded alongside real tool invocations.
pub const EVENT_CONNECTION: &str = "CONNECTION";
pub const EVENT_CONNECTION_ERROR: &str = "CONNECTION_ERROR";
pub const EVENT_USER_QUESTION: &str = "USER_QUESTION";
pub const EVENT_CHAT_ERROR: &str = "CHAT_ERROR";
pub const EVENT_SESSION_END: &str = "SESSION_END";

/// Default sink location, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = "logs/mcp_calls.txt";

#[derive(Debug, Serialize)]
struct CallRecord<'a> {
    timestamp: String,
    tool: &'a str,
    parameters: &'a Value,
    result: &'a Value,
    execution_time_ms: Option<u64>,
}

/// Writes one [`CallRecord`] per line to a fixed local path, creating the
/// parent directory on demand.
pub struct CallRecorder {
    path: PathBuf,
}

impl CallRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Failures are swallowed after a local warning.
    pub fn record(
        &self,
        tool: &str,
        parameters: &Value,
        result: &Value,
        execution_time_ms: Option<u64>,
    ) {
        let record = CallRecord {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            tool,
            parameters,
            result,
            execution_time_ms,
        };

        if let Err(e) = self.append(&record) {
            tracing::warn!("failed to append call record: {}", e);
        }
    }

    /// Record a lifecycle pseudo-event (connection, session boundary, ...).
    pub fn record_event(&self, event: &str, parameters: Value, result: Value) {
        self.record(event, &parameters, &result, None);
    }

    fn append(&self, record: &CallRecord<'_>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn appends_one_json_line_per_record() {
        let temp = TempDir::new().unwrap();
        let recorder = CallRecorder::new(temp.path().join("mcp_calls.txt"));

        recorder.record(
            "get_competitions",
            &serde_json::json!({}),
            &serde_json::json!({"count": 12}),
            Some(41),
        );
        recorder.record(
            "get_team_by_id",
            &serde_json::json!({"team_id": "86"}),
            &serde_json::json!({"name": "Real Madrid"}),
            Some(7),
        );

        let lines = read_lines(recorder.path());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["tool"], "get_competitions");
        assert_eq!(lines[0]["execution_time_ms"], 41);
        assert_eq!(lines[1]["parameters"]["team_id"], "86");
        assert!(lines[1]["timestamp"].as_str().unwrap().len() >= 19);
    }

    #[test]
    fn creates_parent_directory_on_demand() {
        let temp = TempDir::new().unwrap();
        let recorder = CallRecorder::new(temp.path().join("logs/deep/mcp_calls.txt"));

        recorder.record_event(
            EVENT_SESSION_END,
            serde_json::json!({"user_action": "quit"}),
            serde_json::json!({}),
        );

        let lines = read_lines(recorder.path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["tool"], EVENT_SESSION_END);
        assert_eq!(lines[0]["execution_time_ms"], Value::Null);
    }

    #[test]
    fn write_failure_is_swallowed() {
        // Point the sink at a path whose parent is a regular file, so the
        // append must fail. record() returns normally regardless.
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let recorder = CallRecorder::new(blocker.join("mcp_calls.txt"));
        recorder.record(
            "get_competitions",
            &serde_json::json!({}),
            &serde_json::json!({}),
            None,
        );
    }
}
