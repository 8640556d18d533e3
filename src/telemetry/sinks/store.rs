//! In-memory progress event store.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::telemetry::events::ProgressEvent;
use crate::telemetry::sessions::policy::SessionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub command: String,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    pub status: SessionStatus,
    pub error: Option<String>,
}

#[derive(Default)]
struct SessionLog {
    next_seq: u64,
    events: Vec<ProgressEvent>,
}

#[derive(Default)]
pub struct ProgressStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    events: RwLock<HashMap<String, SessionLog>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_session(&self, record: SessionRecord) {
        self.sessions
            .write()
            .insert(record.session_id.clone(), record);
    }

    pub fn get_session(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Most recent first.
    pub fn list_sessions(&self) -> Vec<SessionRecord> {
        let mut out: Vec<SessionRecord> = self.sessions.read().values().cloned().collect();
        out.sort_by_key(|s| std::cmp::Reverse(s.started_at_ms));
        out
    }

    /// Reserve the next sequence number for a session, starting at 1.
    pub fn next_seq(&self, session_id: &str) -> u64 {
        let mut events = self.events.write();
        let log = events.entry(session_id.to_string()).or_default();
        log.next_seq += 1;
        log.next_seq
    }

    pub fn append_event(&self, event: ProgressEvent) {
        let mut events = self.events.write();
        let log = events.entry(event.session.clone()).or_default();
        let pos = log.events.partition_point(|e| e.seq < event.seq);
        log.events.insert(pos, event);
    }

    pub fn read_events(&self, session_id: &str) -> Vec<ProgressEvent> {
        self.read_events_after(session_id, 0)
    }

    pub fn read_events_after(&self, session_id: &str, after_seq: u64) -> Vec<ProgressEvent> {
        self.events
            .read()
            .get(session_id)
            .map(|log| {
                log.events
                    .iter()
                    .filter(|e| e.seq > after_seq)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn delete_session(&self, session_id: &str) {
        self.sessions.write().remove(session_id);
        self.events.write().remove(session_id);
    }
}
