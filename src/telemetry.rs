//! Telemetry domain: events, sessions, routing and the in-memory sink.
//!
//! Producers emit envelopes on the bus; the ingestor assigns per-session
//! sequence numbers and appends them to the store that readers query.

mod types;

pub mod events;
pub mod routing;
pub mod sessions;
pub mod sinks;

pub use events::{
    ParagraphImagesEventData, ProgressEvent, RunFinishedData, RunStartedData, SessionEndedData,
    SessionStartedData, StageEventData, VideoJobEventData,
};
pub use sessions::policy::SessionStatus;
pub use sessions::ProgressRuntime;
pub use sinks::store::{ProgressStore, SessionRecord};
pub use types::{new_session_id, now_millis};
