//! Long-running job poller bounds, failures and cancellation.

use crate::integration::MockPort;
use reelgen::error::PollError;
use reelgen::pipeline::{LongRunningJobPoller, PollPolicy};
use reelgen::types::JobHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn policy(interval_secs: u64, max_attempts: u32, max_duration_secs: u64) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(interval_secs),
        max_attempts,
        max_duration: Duration::from_secs(max_duration_secs),
    }
}

#[tokio::test(start_paused = true)]
async fn observer_sees_every_attempt_in_order() {
    let port = MockPort::new(&["p"]).with_video_job(2);
    let poller = LongRunningJobPoller::new(policy(5, 10, 600));
    let mut seen = Vec::new();

    let video = poller
        .poll(&port, &JobHandle::new("job-1"), &CancellationToken::new(), |attempt, status| {
            seen.push((attempt, status.label()));
        })
        .await
        .unwrap();

    assert_eq!(video, MockPort::final_video());
    assert_eq!(seen, vec![(1, "pending"), (2, "pending"), (3, "done")]);
}

#[tokio::test(start_paused = true)]
async fn elapsed_bound_stops_polling() {
    let port = MockPort::new(&["p"]).with_stuck_video_job();
    let poller = LongRunningJobPoller::new(policy(5, 100, 12));
    let started = tokio::time::Instant::now();

    let err = poller
        .poll(&port, &JobHandle::new("job-1"), &CancellationToken::new(), |_, _| {})
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::TimedOut { .. }));
    assert_eq!(port.poll_calls(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn failed_status_query_is_not_retried() {
    // No job was ever submitted, so the port rejects the status query.
    let port = MockPort::new(&["p"]);
    let poller = LongRunningJobPoller::new(policy(5, 10, 600));

    let err = poller
        .poll(&port, &JobHandle::new("ghost"), &CancellationToken::new(), |_, _| {})
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Query(_)));
    assert_eq!(err.to_string(), "unknown job ghost");
    assert_eq!(port.poll_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_wait() {
    let port = MockPort::new(&["p"]).with_stuck_video_job();
    let poller = LongRunningJobPoller::new(policy(5, 100, 600));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        trigger.cancel();
    });

    let err = poller
        .poll(&port, &JobHandle::new("job-1"), &cancel, |_, _| {})
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Cancelled));
    assert_eq!(port.poll_calls(), 1);
}
