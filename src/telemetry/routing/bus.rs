//! In-process event bus for telemetry events.

use std::sync::mpsc::{channel, Receiver, SendError, Sender};

use serde::Serialize;
use serde_json::Value;

use crate::telemetry::events::ProgressEnvelope;

#[derive(Clone)]
pub struct ProgressBus {
    sender: Sender<ProgressEnvelope>,
}

impl ProgressBus {
    pub fn new_pair() -> (Self, Receiver<ProgressEnvelope>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }

    pub fn emit(
        &self,
        session: impl Into<String>,
        event_type: impl Into<String>,
        data: Value,
    ) -> Result<(), SendError<ProgressEnvelope>> {
        self.sender
            .send(ProgressEnvelope::with_now(session, event_type, data))
    }

    /// Emit a typed payload; a payload that fails to serialize is sent as `null`.
    pub fn emit_typed<T: Serialize>(
        &self,
        session: impl Into<String>,
        event_type: impl Into<String>,
        data: &T,
    ) -> Result<(), SendError<ProgressEnvelope>> {
        let data = serde_json::to_value(data).unwrap_or(Value::Null);
        self.emit(session, event_type, data)
    }
}
