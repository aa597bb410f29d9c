//! Request lifecycle logging.
//!
//! Append-only event log under the workspace runtime directory, plus
//! verbose/warning logging to stderr. The log is the session's flight
//! recorder; nothing here is on the user-visible path and every write
//! failure is swallowed by the caller.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tandem_core::runtime_dir;
use uuid::Uuid;

/// One step in a request's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestEvent {
    /// A trigger source handed a request to the orchestrator.
    RequestStarted { source: String, request_type: String },
    /// A provider call returned and was normalized.
    ResponseReceived { provider: String, parse_ok: bool },
    /// The stored suggestion was applied to the document.
    EditApplied,
    /// Session state was reset to defaults.
    SessionCleared,
    /// An operation aborted on a missing prerequisite.
    PreconditionFailed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq_no: u64,
    pub at: DateTime<Utc>,
    pub session_id: Uuid,
    pub event: RequestEvent,
}

pub struct Observer {
    log_path: PathBuf,
    verbose: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: dir.join("observe.log"),
            verbose: false,
        })
    }

    pub fn record_event(&self, envelope: &EventEnvelope) -> Result<()> {
        self.append_log_line(&format!(
            "{} EVENT {}",
            Utc::now().to_rfc3339(),
            serde_json::to_string(envelope)?
        ))
    }

    /// Enable or disable verbose logging to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Log a message to stderr with `[tandem]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[tandem] {msg}");
        }
    }

    /// Log a warning - always written to the log file, and to stderr.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[tandem WARN] {msg}");
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn records_event_lines_to_the_log() {
        let workspace = TempDir::new().expect("tempdir");
        let observer = Observer::new(workspace.path()).expect("observer");

        observer
            .record_event(&EventEnvelope {
                seq_no: 1,
                at: Utc::now(),
                session_id: Uuid::now_v7(),
                event: RequestEvent::RequestStarted {
                    source: "sidebar".to_string(),
                    request_type: "chat_with_context".to_string(),
                },
            })
            .expect("record");
        observer.warn_log("provider unreachable");

        let log = fs::read_to_string(runtime_dir(workspace.path()).join("observe.log"))
            .expect("log file");
        assert!(log.contains("request_started"));
        assert!(log.contains("chat_with_context"));
        assert!(log.contains("WARN provider unreachable"));
    }

    #[test]
    fn event_envelope_roundtrips() {
        let envelope = EventEnvelope {
            seq_no: 7,
            at: Utc::now(),
            session_id: Uuid::now_v7(),
            event: RequestEvent::ResponseReceived {
                provider: "groq".to_string(),
                parse_ok: false,
            },
        };
        let json = serde_json::to_string(&envelope).expect("json");
        let back: EventEnvelope = serde_json::from_str(&json).expect("parse");
        assert_eq!(back.seq_no, 7);
        assert!(matches!(back.event, RequestEvent::ResponseReceived { parse_ok: false, .. }));
    }
}
