//! Event ingestion and sequence assignment.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::telemetry::events::{ProgressEnvelope, ProgressEvent};
use crate::telemetry::sinks::store::ProgressStore;

pub struct EventIngestor {
    store: Arc<ProgressStore>,
    receiver: Receiver<ProgressEnvelope>,
}

impl EventIngestor {
    pub fn new(store: Arc<ProgressStore>, receiver: Receiver<ProgressEnvelope>) -> Self {
        Self { store, receiver }
    }

    pub fn ingest_pending(&mut self) -> usize {
        let mut count = 0usize;
        while let Ok(envelope) = self.receiver.try_recv() {
            let seq = self.store.next_seq(&envelope.session);
            self.store
                .append_event(ProgressEvent::from_envelope(envelope, seq));
            count += 1;
        }
        count
    }
}

#[derive(Clone)]
pub struct SharedIngestor(Arc<Mutex<EventIngestor>>);

impl SharedIngestor {
    pub fn new(inner: EventIngestor) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    pub fn drain(&self) -> usize {
        self.0.lock().ingest_pending()
    }
}
