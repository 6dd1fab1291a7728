//! Append-only interaction log.
//!
//! Every observable event in a turn (receipt, patient resolution, handoff,
//! retrieval outcome, reply) is appended here as a structured entry and
//! mirrored to `tracing`. The log is queryable by recency and by session,
//! backing the `/logs` endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Kinds of loggable events in the turn lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An inbound turn was accepted for processing.
    TurnReceived,
    /// A patient record was resolved and cached on the session.
    PatientResolved,
    /// A given name could not be resolved to a record.
    PatientNotFound,
    /// Control passed from intake to the clinical agent.
    AgentHandoff,
    /// The retrieval pipeline produced an evidence bundle.
    RetrievalCompleted,
    /// The confidence gate escalated to web search.
    WebFallback,
    /// The text generation call failed and the fallback reply was used.
    GenerationFailed,
    /// A reply was committed to the session.
    ReplySent,
    /// A session was cleared by the caller.
    SessionCleared,
}

/// One structured log entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Session the event belongs to, when applicable.
    pub session_id: Option<String>,
    /// Agent or subsystem that emitted the event.
    pub agent: String,
    pub kind: EventKind,
    pub detail: String,
}

/// Maximum entries retained in memory; older entries are dropped.
const MAX_ENTRIES: usize = 10_000;

/// Truncation limit for detail strings.
const MAX_DETAIL_LEN: usize = 500;

/// Process-wide append-only interaction log.
///
/// Appends are fire-and-forget: a poisoned lock drops the entry rather than
/// failing the turn.
#[derive(Debug, Default)]
pub struct InteractionLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl InteractionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Detail strings are truncated to a bounded length.
    pub fn record(
        &self,
        session_id: Option<&str>,
        agent: &str,
        kind: EventKind,
        detail: impl Into<String>,
    ) {
        let mut detail = detail.into();
        if detail.len() > MAX_DETAIL_LEN {
            detail.truncate(
                detail
                    .char_indices()
                    .take_while(|(i, _)| *i < MAX_DETAIL_LEN)
                    .last()
                    .map(|(i, c)| i + c.len_utf8())
                    .unwrap_or(0),
            );
        }

        tracing::info!(
            session = session_id.unwrap_or("-"),
            agent,
            kind = ?kind,
            detail = %detail,
            "interaction event"
        );

        let entry = LogEntry {
            timestamp: Utc::now(),
            session_id: session_id.map(String::from),
            agent: agent.to_string(),
            kind,
            detail,
        };

        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.push(entry);
        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - MAX_ENTRIES;
            entries.drain(..excess);
        }
    }

    /// Return the most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let start = entries.len().saturating_sub(limit);
        entries[start..].to_vec()
    }

    /// Return all entries for a given session, oldest first.
    pub fn by_session(&self, session_id: &str) -> Vec<LogEntry> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| e.session_id.as_deref() == Some(session_id))
            .cloned()
            .collect()
    }

    /// Total entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
