use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::models::job::{Job, JobStatus};
use crate::services::transport::Backend;

/// Bounds on how long a single job is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(5),
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.poll_max_attempts,
            interval: config.poll_interval(),
        }
    }

    /// Worst-case wall-clock time spent polling one job.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// How a polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The job is completed and carries a result URL.
    Completed,
    /// The backend reported `failed`.
    Failed,
    /// Every attempt was used without reaching a terminal status.
    TimedOut { attempts: u32 },
    /// The caller cancelled the loop.
    Cancelled,
}

/// Fixed-cadence status poller.
#[derive(Clone)]
pub struct StatusPoller {
    backend: Arc<dyn Backend>,
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn Backend>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Poll `job` until it completes, fails, runs out of attempts or `cancel` fires.
    ///
    /// A fetch error counts as an attempt and the loop carries on. No request is
    /// issued once `cancel` has fired.
    pub async fn poll(&self, job: &mut Job, cancel: &CancellationToken) -> PollResult {
        if job.is_completed() {
            return PollResult::Completed;
        }

        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return PollResult::Cancelled;
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PollResult::Cancelled,
                fetched = self.backend.get_status(job.id) => fetched,
            };

            match fetched {
                Ok(report) => {
                    job.apply(&report);
                    tracing::debug!(
                        job_id = job.id,
                        attempt,
                        status = %report.status,
                        has_result = report.has_result,
                        "Status checked"
                    );

                    if job.is_completed() {
                        tracing::info!(job_id = job.id, attempt, "Job completed");
                        return PollResult::Completed;
                    }
                    if report.status == JobStatus::Failed {
                        tracing::info!(job_id = job.id, attempt, "Job failed on backend");
                        return PollResult::Failed;
                    }
                    if report.status == JobStatus::Completed {
                        tracing::warn!(
                            job_id = job.id,
                            attempt,
                            has_result = report.has_result,
                            "Backend reported completion without a result image; still polling"
                        );
                    }
                }
                Err(e) => {
                    tracing::debug!(job_id = job.id, attempt, error = %e, "Status check missed");
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return PollResult::Cancelled,
                    _ = sleep(self.policy.interval) => {}
                }
            }
        }

        tracing::info!(job_id = job.id, attempts = max_attempts, "Job polling timed out");
        PollResult::TimedOut {
            attempts: max_attempts,
        }
    }
}
