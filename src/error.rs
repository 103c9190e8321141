//! Error types for the docserve-client library.
//!
//! Every fallible operation returns [`DocServeError`]. The variants fall into
//! three groups:
//!
//! * **Task outcomes** — the remote task itself ended badly
//!   ([`DocServeError::TaskFailed`]) or never ended within the budget
//!   ([`DocServeError::Timeout`], [`DocServeError::DeadlineExceeded`],
//!   [`DocServeError::Cancelled`]).
//!
//! * **Wire errors** — the service could not be reached
//!   ([`DocServeError::Transport`]), answered with a non-2xx status
//!   ([`DocServeError::Http`]), or answered with a body that does not follow
//!   the protocol ([`DocServeError::Protocol`]). A missing status field is a
//!   protocol error, never an implicit "pending".
//!
//! * **Local errors** — bad configuration, bad task ids, file I/O.

use crate::task::TaskStatusResponse;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docserve-client library.
#[derive(Debug, Error)]
pub enum DocServeError {
    // ── Task outcomes ─────────────────────────────────────────────────────
    /// The task reached the `failure` status. Not retryable.
    #[error("Task '{task_id}' failed on the server (status payload: {payload})")]
    TaskFailed {
        task_id: String,
        /// Raw status payload as returned by the status endpoint.
        payload: String,
        response: Box<TaskStatusResponse>,
    },

    /// The attempt budget was used up while the task stayed non-terminal.
    #[error(
        "Task '{task_id}' did not finish after {attempts} attempts (last status: {last_status})\n\
Increase --max-attempts or --interval."
    )]
    Timeout {
        task_id: String,
        attempts: u32,
        last_status: String,
    },

    /// The overall polling deadline would have been crossed by the next wait.
    #[error("Task '{task_id}' exceeded the {deadline_secs}s polling deadline (last status: {last_status})")]
    DeadlineExceeded {
        task_id: String,
        deadline_secs: u64,
        last_status: String,
    },

    /// Polling was cancelled through its cancellation token.
    #[error("Polling of task '{task_id}' was cancelled after {attempts} attempts")]
    Cancelled { task_id: String, attempts: u32 },

    // ── Wire errors ───────────────────────────────────────────────────────
    /// The response body did not match the expected shape.
    #[error("Protocol error from {endpoint}: {detail}")]
    Protocol { endpoint: String, detail: String },

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("Request to {endpoint} failed: {reason}\nCheck the service URL and your network connection.")]
    Transport { endpoint: String, reason: String },

    // ── Local errors ──────────────────────────────────────────────────────
    /// The task id cannot be used in a URL path or as a file name.
    #[error("Invalid task id '{task_id}': {reason}")]
    InvalidTaskId { task_id: String, reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A local file given as a conversion source could not be read.
    #[error("Failed to read source file '{path}': {source}")]
    SourceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the result file.
    #[error("Failed to write result file '{path}': {source}")]
    ResultWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read or decode a stored result file.
    #[error("Failed to read result file '{path}': {detail}")]
    ResultReadFailed { path: PathBuf, detail: String },
}

impl DocServeError {
    /// Whether a fresh attempt at the same request could plausibly succeed.
    ///
    /// Transport errors, 429 and 5xx responses are transient; everything
    /// else (including a failed task) is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether this error ends a polling run because of the task's state
    /// rather than because of the client or the wire.
    pub fn is_task_outcome(&self) -> bool {
        matches!(
            self,
            Self::TaskFailed { .. }
                | Self::Timeout { .. }
                | Self::DeadlineExceeded { .. }
                | Self::Cancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[test]
    fn timeout_display_reports_last_status() {
        let e = DocServeError::Timeout {
            task_id: "abc".into(),
            attempts: 60,
            last_status: "started".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("60 attempts"), "got: {msg}");
        assert!(msg.contains("started"), "got: {msg}");
    }

    #[test]
    fn task_failed_display_includes_payload() {
        let response = TaskStatusResponse::new("abc", TaskStatus::Failure);
        let e = DocServeError::TaskFailed {
            task_id: "abc".into(),
            payload: r#"{"task_status":"failure"}"#.into(),
            response: Box::new(response),
        };
        assert!(e.to_string().contains("failure"));
        assert!(e.is_task_outcome());
        assert!(!e.is_retryable());
    }

    #[test]
    fn http_retryable_only_for_transient_statuses() {
        let http = |status| DocServeError::Http {
            endpoint: "/v1/status/poll/x".into(),
            status,
            body: String::new(),
        };
        assert!(http(503).is_retryable());
        assert!(http(429).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!http(404).is_retryable());
    }

    #[test]
    fn protocol_error_is_not_retryable() {
        let e = DocServeError::Protocol {
            endpoint: "/v1/status/poll/x".into(),
            detail: "missing task_status".into(),
        };
        assert!(!e.is_retryable());
        assert!(!e.is_task_outcome());
        assert!(e.to_string().contains("missing task_status"));
    }
}
