//! End-to-end tests against a live conversion service.
//!
//! These make real HTTP calls, so they are gated behind `E2E_ENABLED` and
//! need the usual credentials in the environment:
//!
//!   E2E_ENABLED=1 DOCSERVE_URL=... DOCSERVE_API_KEY=... DOCSERVE_ID_TOKEN=... \
//!     cargo test --test e2e -- --nocapture
//!
//! `E2E_SOURCE_URL` overrides the document submitted by the smoke test.

use docserve_client::{
    ClientConfig, ConvertSourceRequest, DocServeError, HttpTaskApi, PollConfig, Source, TaskApi,
    TaskPoller, TaskStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const DEFAULT_SOURCE: &str = "https://arxiv.org/pdf/2408.09869";

fn output_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/e2e-output")
}

/// Skip this test unless E2E_ENABLED is set and the client config loads.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_logging();
        match ClientConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                println!("SKIP — {e}");
                return;
            }
        }
    }};
}

/// Show the client's own logs with `--nocapture`; `RUST_LOG` overrides.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docserve_client=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn source_url() -> String {
    std::env::var("E2E_SOURCE_URL").unwrap_or_else(|_| DEFAULT_SOURCE.to_string())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let config = e2e_skip_unless_ready!();
    let api = HttpTaskApi::new(config).expect("client");

    let health = api.health().await.expect("health check failed");
    println!("health: {health}");
    assert!(health.is_object(), "health response should be a JSON object");
}

#[tokio::test]
async fn test_unknown_task_is_not_success() {
    let config = e2e_skip_unless_ready!();
    let api = HttpTaskApi::new(config).expect("client");

    match api.status("00000000-0000-0000-0000-000000000000").await {
        Ok(status) => {
            println!("unknown task status: {}", status.task_status);
            assert_ne!(status.task_status, TaskStatus::Success);
        }
        Err(DocServeError::Http { status, .. }) => {
            println!("unknown task rejected with HTTP {status}");
            assert!((400..500).contains(&status));
        }
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn test_submit_and_poll_smoke() {
    let config = e2e_skip_unless_ready!();
    let api = Arc::new(HttpTaskApi::new(config).expect("client"));

    let poll = PollConfig::builder()
        .max_attempts(120)
        .interval(Duration::from_secs(5))
        .output_dir(output_dir())
        .build()
        .expect("poll config");

    let request = ConvertSourceRequest::new(vec![Source::http(source_url())]);
    let output = TaskPoller::new(api, poll)
        .submit_and_poll(&request)
        .await
        .expect("conversion did not succeed");

    println!(
        "task {} succeeded after {} attempts in {}ms: {} chunks",
        output.task_id,
        output.attempts,
        output.duration_ms,
        output.result.chunk_count()
    );
    assert!(output.result.chunk_count() > 0, "result has no chunks");
    assert!(output.result.total_text_len() > 0, "chunks carry no text");

    let saved = output.saved_to.expect("result should be saved");
    assert_eq!(
        saved.file_name().and_then(|n| n.to_str()),
        Some(format!("{}.json", output.task_id).as_str())
    );
    let reloaded = docserve_client::load_result(&saved)
        .await
        .expect("saved result should load");
    assert_eq!(reloaded.chunk_count(), output.result.chunk_count());
}
