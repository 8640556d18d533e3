//! Bounded fixed-interval polling of long-running remote jobs.

use crate::error::PollError;
use crate::provider::{JobStatus, RemoteGenerationPort};
use crate::types::{JobHandle, VideoArtifact};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Poll cadence and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Wait before every status query, including the first.
    pub interval: Duration,
    /// Status queries allowed before giving up.
    pub max_attempts: u32,
    /// Wall-clock bound measured from the start of polling.
    pub max_duration: Duration,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;
    pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(15 * 60);
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            max_duration: Self::DEFAULT_MAX_DURATION,
        }
    }
}

/// Queries a job until it reaches a terminal status or a bound is hit.
///
/// A `Failed` status or a failed query ends polling at once; nothing is retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongRunningJobPoller {
    policy: PollPolicy,
}

impl LongRunningJobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Poll `handle` until done. `observer` sees every status returned, with its 1-based attempt.
    pub async fn poll<F>(
        &self,
        port: &dyn RemoteGenerationPort,
        handle: &JobHandle,
        cancel: &CancellationToken,
        mut observer: F,
    ) -> Result<VideoArtifact, PollError>
    where
        F: FnMut(u32, &JobStatus),
    {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = sleep(self.policy.interval) => {}
            }

            attempt += 1;
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                status = port.poll_video_job(handle) => status.map_err(|err| {
                    warn!(job_id = %handle, attempt, error = %err, "Job status query failed");
                    PollError::Query(err)
                })?,
            };
            observer(attempt, &status);

            match status {
                JobStatus::Done(video) => {
                    debug!(job_id = %handle, attempt, "Job completed");
                    return Ok(video);
                }
                JobStatus::Failed(message) => {
                    warn!(job_id = %handle, attempt, error = %message, "Job failed");
                    return Err(PollError::JobFailed(message));
                }
                JobStatus::Pending => {
                    debug!(job_id = %handle, attempt, "Job pending");
                }
            }

            if attempt >= self.policy.max_attempts {
                return Err(PollError::AttemptsExhausted { attempts: attempt });
            }
            let elapsed = started.elapsed();
            if elapsed >= self.policy.max_duration {
                return Err(PollError::TimedOut { elapsed });
            }
        }
    }
}
