//! Session lifecycle service. One session per pipeline run or CLI command.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;
use crate::telemetry::events::{ProgressEnvelope, ProgressEvent, SessionEndedData, SessionStartedData};
use crate::telemetry::routing::bus::ProgressBus;
use crate::telemetry::routing::ingestor::{EventIngestor, SharedIngestor};
use crate::telemetry::sessions::policy::SessionStatus;
use crate::telemetry::sinks::store::{ProgressStore, SessionRecord};
use crate::telemetry::types::{new_session_id, now_millis};

/// Runtime for session lifecycle and event emission. Holds store, bus, ingestor.
#[derive(Clone)]
pub struct ProgressRuntime {
    store: Arc<ProgressStore>,
    bus: ProgressBus,
    ingestor: SharedIngestor,
}

impl ProgressRuntime {
    pub fn new() -> Self {
        let store = Arc::new(ProgressStore::new());
        let (bus, rx) = ProgressBus::new_pair();
        let ingestor = SharedIngestor::new(EventIngestor::new(store.clone(), rx));
        Self {
            store,
            bus,
            ingestor,
        }
    }

    pub fn start_session(&self, command_name: &str) -> Result<String, ApiError> {
        let session_id = new_session_id();
        self.start_session_with_id(&session_id, command_name)?;
        Ok(session_id)
    }

    /// Open a session under a caller-chosen id (the pipeline uses its run id).
    pub fn start_session_with_id(&self, session_id: &str, command_name: &str) -> Result<(), ApiError> {
        if self.store.get_session(session_id).is_some() {
            return Err(ApiError::ProviderError(format!(
                "progress session {} already exists",
                session_id
            )));
        }
        self.store.put_session(SessionRecord {
            session_id: session_id.to_string(),
            command: command_name.to_string(),
            started_at_ms: now_millis(),
            ended_at_ms: None,
            status: SessionStatus::Active,
            error: None,
        });
        self.emit_typed(
            session_id,
            "session_started",
            &SessionStartedData {
                command: command_name.to_string(),
            },
        )
    }

    pub fn finish_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        error: Option<String>,
    ) -> Result<(), ApiError> {
        let mut record = self.store.get_session(session_id).ok_or_else(|| {
            ApiError::ProviderError(format!("progress session {} not found", session_id))
        })?;
        self.emit_typed(
            session_id,
            "session_ended",
            &SessionEndedData {
                status: status.as_str().to_string(),
                error: error.clone(),
            },
        )?;
        record.status = status;
        record.ended_at_ms = Some(now_millis());
        record.error = error;
        self.store.put_session(record);
        Ok(())
    }

    pub fn emit_event(&self, session_id: &str, event_type: &str, data: Value) -> Result<(), ApiError> {
        self.bus
            .emit(session_id.to_string(), event_type, data)
            .map_err(to_api_error)?;
        self.ingestor.drain();
        Ok(())
    }

    pub fn emit_typed<T: Serialize>(
        &self,
        session_id: &str,
        event_type: &str,
        data: &T,
    ) -> Result<(), ApiError> {
        self.bus
            .emit_typed(session_id.to_string(), event_type, data)
            .map_err(to_api_error)?;
        self.ingestor.drain();
        Ok(())
    }

    pub fn emit_event_best_effort<T: Serialize>(&self, session_id: &str, event_type: &str, data: &T) {
        if let Err(err) = self.emit_typed(session_id, event_type, data) {
            warn!(
                session_id = %session_id,
                event_type = %event_type,
                error = %err,
                "failed to emit progress event"
            );
        }
    }

    pub fn read_events(&self, session_id: &str) -> Vec<ProgressEvent> {
        self.store.read_events(session_id)
    }

    pub fn list_sessions(&self) -> Vec<SessionRecord> {
        self.store.list_sessions()
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }
}

impl Default for ProgressRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn to_api_error(err: std::sync::mpsc::SendError<ProgressEnvelope>) -> ApiError {
    ApiError::IoError(format!("progress bus closed: {}", err))
}
