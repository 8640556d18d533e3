//! Progress events recorded for pipeline runs.

use crate::integration::MockPort;
use reelgen::pipeline::{GenerationOrchestrator, StageStatus};
use reelgen::telemetry::{ProgressEvent, ProgressRuntime, SessionStatus};
use std::sync::Arc;

fn event_types(events: &[ProgressEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event_type.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn completed_run_records_ordered_stage_events() {
    let port = Arc::new(MockPort::new(&["one", "two"]).with_video_job(1));
    let progress = Arc::new(ProgressRuntime::new());
    let result = GenerationOrchestrator::new(port)
        .with_progress(progress.clone())
        .run("observability")
        .await;
    assert!(result.is_completed());

    let session = progress.store().get_session(&result.run_id).unwrap();
    assert_eq!(session.command, "run");
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.ended_at_ms.is_some());

    let events = progress.read_events(&result.run_id);
    assert_eq!(events.first().unwrap().seq, 1);
    assert!(events.windows(2).all(|w| w[1].seq == w[0].seq + 1));

    let types = event_types(&events);
    assert_eq!(types.first(), Some(&"session_started"));
    assert_eq!(types.last(), Some(&"session_ended"));
    let stage_events: Vec<&str> = types
        .iter()
        .copied()
        .filter(|t| t.starts_with("stage_") || t.starts_with("run_"))
        .collect();
    assert_eq!(
        stage_events,
        vec![
            "run_started",
            "stage_started",
            "stage_completed",
            "stage_started",
            "stage_completed",
            "stage_started",
            "stage_completed",
            "stage_started",
            "stage_completed",
            "run_completed",
        ]
    );
    assert_eq!(
        types.iter().filter(|t| **t == "paragraph_images_completed").count(),
        2
    );
    assert_eq!(types.iter().filter(|t| **t == "video_job_polled").count(), 2);

    let submitted = events
        .iter()
        .find(|e| e.event_type == "video_job_submitted")
        .unwrap();
    assert_eq!(submitted.data["job_id"], "job-1");
    let last_poll = events
        .iter()
        .rev()
        .find(|e| e.event_type == "video_job_polled")
        .unwrap();
    assert_eq!(last_poll.data["attempt"], 2);
    assert_eq!(last_poll.data["status"], "done");
}

#[tokio::test]
async fn failed_run_records_failure_details() {
    let port = Arc::new(MockPort::new(&["one", "two"]).failing_images("two", "rate limited"));
    let progress = Arc::new(ProgressRuntime::new());
    let result = GenerationOrchestrator::new(port)
        .with_progress(progress.clone())
        .run("failure")
        .await;
    assert_eq!(result.state.images, StageStatus::Error);

    let session = progress.store().get_session(&result.run_id).unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session.error.unwrap().contains("rate limited"));

    let events = progress.read_events(&result.run_id);
    let failed_paragraph = events
        .iter()
        .find(|e| e.event_type == "paragraph_images_failed")
        .unwrap();
    assert_eq!(failed_paragraph.data["paragraph_index"], 1);
    assert_eq!(failed_paragraph.data["error"], "rate limited");

    let stage_failed = events
        .iter()
        .find(|e| e.event_type == "stage_failed")
        .unwrap();
    assert_eq!(stage_failed.data["stage"], "images");
    assert_eq!(stage_failed.data["error_kind"], "image_generation_failed");

    let run_failed = events
        .iter()
        .find(|e| e.event_type == "run_failed")
        .unwrap();
    assert_eq!(run_failed.data["failed_stage"], "images");
    assert_eq!(run_failed.data["error"], "rate limited");
    assert!(events.iter().all(|e| e.event_type != "run_completed"));
}

#[tokio::test]
async fn runs_without_progress_runtime_still_complete() {
    let port = Arc::new(MockPort::new(&["only"]));
    let result = GenerationOrchestrator::new(port).run("quiet").await;
    assert!(result.is_completed());
}
