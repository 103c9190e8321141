//! # docserve-client
//!
//! Client for an asynchronous document-conversion service: submit sources,
//! poll the task until it is terminal, fetch the chunked result and keep it
//! on disk.
//!
//! ## Task lifecycle
//!
//! ```text
//! POST /v1/convert/source/async ──▶ task_id
//!                                      │
//! GET  /v1/status/poll/{task_id} ◀─────┤  pending / started: wait, ask again
//!                                      │  failure: stop, TaskFailed
//!                                      ▼  success
//! GET  /v1/result/{task_id}      ──▶ chunks ──▶ <output_dir>/<task_id>.json
//! ```
//!
//! Every request carries `Authorization: Bearer <identity token>` and
//! `X-Api-Key: <application key>`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docserve_client::{
//!     ClientConfig, ConvertSourceRequest, HttpTaskApi, PollConfig, Source, TaskPoller,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // DOCSERVE_URL, DOCSERVE_API_KEY, DOCSERVE_ID_TOKEN
//!     let api = HttpTaskApi::new(ClientConfig::from_env()?)?;
//!     let config = PollConfig::builder()
//!         .max_attempts(60)
//!         .interval(Duration::from_secs(5))
//!         .output_dir("results")
//!         .build()?;
//!
//!     let request = ConvertSourceRequest::new(vec![Source::http("https://arxiv.org/pdf/2408.09869")]);
//!     let output = TaskPoller::new(Arc::new(api), config)
//!         .submit_and_poll(&request)
//!         .await?;
//!     println!("{} chunks saved to {:?}", output.result.chunk_count(), output.saved_to);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docserve` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod poller;
pub mod progress;
pub mod retry;
pub mod storage;
pub mod stream;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{HttpTaskApi, TaskApi};
pub use config::{ClientConfig, ClientConfigBuilder, PollConfig, PollConfigBuilder};
pub use error::DocServeError;
pub use poller::{poll_task, TaskOutput, TaskPoller};
pub use progress::{NoopProgressCallback, PollProgressCallback, ProgressCallback};
pub use retry::{retry_until, Backoff, Clock, ManualClock, RetryOutcome, RetryPolicy, TokioClock};
pub use storage::{load_result, result_path, save_result};
pub use stream::{watch_status, StatusStream};
pub use task::{
    Chunk, ChunkMetadata, ConversionResult, ConvertSourceRequest, Source, TaskStatus,
    TaskStatusResponse,
};
pub use tokio_util::sync::CancellationToken;
