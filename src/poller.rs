//! The asynchronous task poller.
//!
//! ```text
//! status ──▶ success ──▶ result ──▶ save ──▶ Ok(TaskOutput)
//!   │   ──▶ failure ──▶ Err(TaskFailed)            (no retry)
//!   │   ──▶ other   ──▶ wait interval, ask again   (up to max_attempts)
//!   └── budget gone ──▶ Err(Timeout { last_status })
//! ```
//!
//! Any transport, HTTP or protocol error from the status or result request
//! ends the run on the spot: a malformed status is not silently read as
//! "still pending".

use crate::api::TaskApi;
use crate::config::PollConfig;
use crate::error::DocServeError;
use crate::progress::ProgressCallback;
use crate::retry::{retry_until, Clock, RetryOutcome, TokioClock};
use crate::storage;
use crate::task::{validate_task_id, ConversionResult, ConvertSourceRequest, TaskStatusResponse};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a successful polling run produced.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub task_id: String,
    /// The terminal (`success`) status response.
    pub status: TaskStatusResponse,
    pub result: ConversionResult,
    /// Number of status requests issued.
    pub attempts: u32,
    /// Where the result was written, when an output directory is configured.
    pub saved_to: Option<PathBuf>,
    pub duration_ms: u64,
}

/// Polls tasks on one service with one [`PollConfig`].
///
/// # Example
/// ```rust,no_run
/// use docserve_client::{ClientConfig, HttpTaskApi, PollConfig, TaskPoller};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpTaskApi::new(ClientConfig::from_env()?)?;
/// let config = PollConfig::builder().output_dir(".").build()?;
/// let output = TaskPoller::new(Arc::new(api), config).poll("my-task-id").await?;
/// println!("{} chunks -> {:?}", output.result.chunk_count(), output.saved_to);
/// # Ok(())
/// # }
/// ```
pub struct TaskPoller {
    api: Arc<dyn TaskApi>,
    clock: Arc<dyn Clock>,
    config: PollConfig,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl TaskPoller {
    pub fn new(api: Arc<dyn TaskApi>, config: PollConfig) -> Self {
        Self {
            api,
            clock: Arc::new(TokioClock),
            config,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the wall clock, e.g. with a [`crate::retry::ManualClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Stop polling when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this poller's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Wait for the task, fetch its result, and save it if an output
    /// directory is configured.
    pub async fn poll(&self, task_id: &str) -> Result<TaskOutput, DocServeError> {
        let started = Instant::now();
        info!("Polling task {}", task_id);
        match self.poll_inner(task_id, started).await {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!("Task {}: {}", task_id, e);
                if let Some(ref cb) = self.progress {
                    cb.on_poll_error(task_id, &e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Submit `request` and poll the task it creates.
    pub async fn submit_and_poll(
        &self,
        request: &ConvertSourceRequest,
    ) -> Result<TaskOutput, DocServeError> {
        let accepted = self.api.submit(request).await?;
        info!(
            "Submitted {} source(s) as task {} ({})",
            request.sources.len(),
            accepted.task_id,
            accepted.task_status
        );
        self.poll(&accepted.task_id).await
    }

    /// Poll until the task succeeds, without fetching the result.
    ///
    /// Returns the terminal status and the number of status requests made.
    pub async fn wait_for_success(
        &self,
        task_id: &str,
    ) -> Result<(TaskStatusResponse, u32), DocServeError> {
        validate_task_id(task_id)?;
        if let Some(ref cb) = self.progress {
            cb.on_poll_start(task_id, self.config.max_attempts);
        }

        let policy = self.config.retry_policy();
        let max_attempts = policy.max_attempts;
        let api = &self.api;
        let progress = &self.progress;

        let outcome = retry_until(
            &policy,
            self.clock.as_ref(),
            &self.cancel,
            |attempt| async move {
                let response = api.status(task_id).await?;
                debug!(
                    "Task {}: attempt {}/{} -> {}",
                    task_id, attempt, max_attempts, response.task_status
                );
                if let Some(cb) = progress {
                    cb.on_status(task_id, attempt, max_attempts, &response.task_status);
                }
                Ok::<_, DocServeError>(response)
            },
            |response| response.task_status.is_terminal(),
        )
        .await?;

        match outcome {
            RetryOutcome::Terminal { value, attempts } if value.task_status.is_success() => {
                Ok((value, attempts))
            }
            RetryOutcome::Terminal { value, .. } => Err(DocServeError::TaskFailed {
                task_id: task_id.to_string(),
                payload: value.to_payload(),
                response: Box::new(value),
            }),
            RetryOutcome::Exhausted { last, attempts } => Err(DocServeError::Timeout {
                task_id: task_id.to_string(),
                attempts,
                last_status: last_status(last.as_ref()),
            }),
            RetryOutcome::DeadlineExceeded { last, .. } => Err(DocServeError::DeadlineExceeded {
                task_id: task_id.to_string(),
                deadline_secs: policy.deadline.map(|d| d.as_secs()).unwrap_or_default(),
                last_status: last_status(last.as_ref()),
            }),
            RetryOutcome::Cancelled { attempts, .. } => Err(DocServeError::Cancelled {
                task_id: task_id.to_string(),
                attempts,
            }),
        }
    }

    async fn poll_inner(&self, task_id: &str, started: Instant) -> Result<TaskOutput, DocServeError> {
        let (status, attempts) = self.wait_for_success(task_id).await?;

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(DocServeError::Cancelled {
                    task_id: task_id.to_string(),
                    attempts,
                });
            }
            result = self.api.result(task_id) => result?,
        };
        let saved_to = match self.config.output_dir {
            Some(ref dir) => Some(storage::save_result(dir, task_id, &result).await?),
            None => None,
        };

        if let Some(ref cb) = self.progress {
            cb.on_result(task_id, result.chunk_count());
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Task {} succeeded after {} attempts: {} chunks, {}ms",
            task_id,
            attempts,
            result.chunk_count(),
            duration_ms
        );

        Ok(TaskOutput {
            task_id: task_id.to_string(),
            status,
            result,
            attempts,
            saved_to,
            duration_ms,
        })
    }
}

fn last_status(last: Option<&TaskStatusResponse>) -> String {
    last.map(|r| r.task_status.to_string())
        .unwrap_or_else(|| "none observed".to_string())
}

/// Poll `task_id` with a fixed interval and no result file.
///
/// The plain `poll(task, max_attempts, interval)` contract; use
/// [`TaskPoller`] for deadlines, cancellation, progress or persistence.
pub async fn poll_task(
    api: Arc<dyn TaskApi>,
    task_id: &str,
    max_attempts: u32,
    interval: Duration,
) -> Result<TaskOutput, DocServeError> {
    let config = PollConfig::builder()
        .max_attempts(max_attempts)
        .interval(interval)
        .build()?;
    TaskPoller::new(api, config).poll(task_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[test]
    fn last_status_formats() {
        assert_eq!(last_status(None), "none observed");
        let r = TaskStatusResponse::new("t", TaskStatus::Unknown("queued".into()));
        assert_eq!(last_status(Some(&r)), "queued");
    }
}
