//! Streaming status API: emit every observed status as it arrives.
//!
//! [`crate::poller::TaskPoller`] only reports how a task ended.
//! [`watch_status`] yields each intermediate [`TaskStatusResponse`] too,
//! which is what a dashboard or a log tail wants. The stream ends after a
//! terminal status, after the attempt budget, when the next wait would
//! cross the policy deadline, or after the first error (yielded as `Err`).

use crate::api::TaskApi;
use crate::error::DocServeError;
use crate::retry::{Clock, RetryPolicy};
use crate::task::{validate_task_id, TaskStatusResponse};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of status observations.
pub type StatusStream = Pin<Box<dyn Stream<Item = Result<TaskStatusResponse, DocServeError>> + Send>>;

struct WatchState {
    api: Arc<dyn TaskApi>,
    clock: Arc<dyn Clock>,
    task_id: String,
    policy: RetryPolicy,
    attempt: u32,
    started: Option<Instant>,
    done: bool,
}

/// Stream the statuses of `task_id`, spaced by `policy`'s backoff.
///
/// # Example
/// ```rust,no_run
/// use docserve_client::{watch_status, ClientConfig, HttpTaskApi, RetryPolicy, TokioClock};
/// use futures::StreamExt;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = Arc::new(HttpTaskApi::new(ClientConfig::from_env()?)?);
/// let policy = RetryPolicy::fixed(60, Duration::from_secs(5));
/// let mut statuses = watch_status(api, "my-task-id", policy, Arc::new(TokioClock));
/// while let Some(status) = statuses.next().await {
///     println!("{}", status?.task_status);
/// }
/// # Ok(())
/// # }
/// ```
pub fn watch_status(
    api: Arc<dyn TaskApi>,
    task_id: impl Into<String>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
) -> StatusStream {
    let task_id = task_id.into();
    if let Err(e) = validate_task_id(&task_id) {
        return Box::pin(stream::once(async move { Err::<TaskStatusResponse, _>(e) }));
    }

    let state = WatchState {
        api,
        clock,
        task_id,
        policy,
        attempt: 0,
        started: None,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.done || st.attempt >= st.policy.max_attempts {
            return None;
        }

        if st.attempt > 0 {
            let delay = st.policy.backoff.delay(st.attempt);
            if let (Some(deadline), Some(started)) = (st.policy.deadline, st.started) {
                if st.clock.now().saturating_duration_since(started) + delay > deadline {
                    debug!("watch {}: deadline reached after {} attempts", st.task_id, st.attempt);
                    return None;
                }
            }
            st.clock.sleep(delay).await;
        } else {
            st.started = Some(st.clock.now());
        }

        st.attempt += 1;
        let item = st.api.status(&st.task_id).await;
        match item {
            Ok(ref r) if r.task_status.is_terminal() => st.done = true,
            Err(_) => st.done = true,
            Ok(_) => {}
        }
        Some((item, st))
    })
    .boxed()
}
