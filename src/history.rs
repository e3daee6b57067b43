//! Per-session event log.
//!
//! Each session is an append-only JSON Lines file `{dir}/{session_id}.jsonl`.
//! One line per event:
//!
//! ```json
//! {"timestamp":"2026-01-31T09:15:00Z","type":"qa","payload":{...}}
//! ```
//!
//! Session ids are sanitized to alphanumerics, `-` and `_` before they touch
//! the filesystem; anything else collapses to `default`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Session used when the caller supplies none (or only invalid characters).
pub const DEFAULT_SESSION: &str = "default";

/// A single logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// UTC, `%Y-%m-%dT%H:%M:%SZ`.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Reduce `session_id` to a safe file stem.
pub fn safe_session_id(session_id: &str) -> String {
    let cleaned: String = session_id
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        DEFAULT_SESSION.to_string()
    } else {
        cleaned
    }
}

/// JSONL session store rooted at a directory.
#[derive(Debug, Clone)]
pub struct SessionLog {
    dir: PathBuf,
}

impl SessionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", safe_session_id(session_id)))
    }

    /// Append one event and return it.
    pub fn append(
        &self,
        session_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<SessionEvent> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create session dir: {}", self.dir.display()))?;

        let event = SessionEvent {
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            event_type: event_type.to_string(),
            payload,
        };

        let path = self.session_path(session_id);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open session log: {}", path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&event)?)?;
        Ok(event)
    }

    /// The last `limit` events of a session, oldest first. `limit == 0`
    /// returns everything. Unparseable lines are skipped.
    pub fn read(&self, session_id: &str, limit: usize) -> Result<Vec<SessionEvent>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session log: {}", path.display()))?;

        let lines: Vec<&str> = content.lines().collect();
        let start = if limit > 0 {
            lines.len().saturating_sub(limit)
        } else {
            0
        };

        let mut events = Vec::new();
        for line in &lines[start..] {
            match serde_json::from_str::<SessionEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::debug!(error = %e, "skipping malformed session line"),
            }
        }
        Ok(events)
    }

    /// Known session ids, most recently modified first.
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions: Vec<(SystemTime, String)> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            sessions.push((modified, stem.to_string()));
        }
        sessions.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(sessions.into_iter().map(|(_, id)| id).collect())
    }
}
