//! HTTP access to the conversion service.
//!
//! [`TaskApi`] is the seam between the polling logic and the network: the
//! poller only ever talks to a `dyn TaskApi`, so tests drive it with a
//! scripted sequence of responses and production code plugs in
//! [`HttpTaskApi`].
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | submit    | `POST /v1/convert/source/async` |
//! | status    | `GET  /v1/status/poll/{task_id}` |
//! | result    | `GET  /v1/result/{task_id}` |
//! | health    | `GET  /health` |
//!
//! Every request carries `Authorization: Bearer <identity token>` and
//! `X-Api-Key: <application key>`.

use crate::config::ClientConfig;
use crate::error::DocServeError;
use crate::task::{validate_task_id, ConversionResult, ConvertSourceRequest, TaskStatusResponse};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Header carrying the application key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Longest response body excerpt carried inside an error.
const MAX_ERROR_BODY: usize = 512;

/// Operations the client needs from the conversion service.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Submit sources for asynchronous conversion; returns the new task.
    async fn submit(
        &self,
        request: &ConvertSourceRequest,
    ) -> Result<TaskStatusResponse, DocServeError>;

    /// Current status of a task.
    async fn status(&self, task_id: &str) -> Result<TaskStatusResponse, DocServeError>;

    /// Full result of a finished task.
    async fn result(&self, task_id: &str) -> Result<ConversionResult, DocServeError>;

    /// Service health document.
    async fn health(&self) -> Result<Value, DocServeError>;
}

/// [`TaskApi`] over HTTPS with reqwest.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    config: ClientConfig,
    client: Client,
}

impl HttpTaskApi {
    /// Build a client with the configured timeouts.
    pub fn new(config: ClientConfig) -> Result<Self, DocServeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("docserve-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DocServeError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Use a pre-configured reqwest client (proxies, custom TLS, …).
    pub fn with_client(config: ClientConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url, DocServeError> {
        Url::parse(&self.config.endpoint(path))
            .map_err(|e| DocServeError::InvalidConfig(format!("service URL: {e}")))
    }

    /// `path` with the task id appended as one percent-encoded segment.
    fn task_url(&self, path: &str, task_id: &str) -> Result<Url, DocServeError> {
        validate_task_id(task_id)?;
        let mut url = self.url(path)?;
        url.path_segments_mut()
            .map_err(|()| {
                DocServeError::InvalidConfig(format!(
                    "service URL cannot carry a path: {}",
                    self.config.base_url
                ))
            })?
            .push(task_id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.identity_token)
            .header(API_KEY_HEADER, &self.config.api_key)
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, DocServeError> {
        let started = std::time::Instant::now();
        let response = builder.send().await.map_err(|e| DocServeError::Transport {
            endpoint: path.to_string(),
            reason: if e.is_timeout() {
                format!("timed out after {}s", self.config.request_timeout_secs)
            } else {
                e.to_string()
            },
        })?;
        debug!(
            "{} -> HTTP {} in {}ms",
            path,
            response.status().as_u16(),
            started.elapsed().as_millis()
        );
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, url: Url) -> Result<T, DocServeError> {
        let response = self.send(path, self.request(Method::GET, url)).await?;
        decode(path, response).await
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn submit(
        &self,
        request: &ConvertSourceRequest,
    ) -> Result<TaskStatusResponse, DocServeError> {
        let path = "v1/convert/source/async";
        let builder = self.request(Method::POST, self.url(path)?).json(request);
        let response = self.send(path, builder).await?;
        let accepted: TaskStatusResponse = decode(path, response).await?;
        if accepted.task_id.is_empty() {
            return Err(DocServeError::Protocol {
                endpoint: path.to_string(),
                detail: "submission response has no task_id".to_string(),
            });
        }
        Ok(accepted)
    }

    async fn status(&self, task_id: &str) -> Result<TaskStatusResponse, DocServeError> {
        let url = self.task_url("v1/status/poll", task_id)?;
        self.get_json(&format!("v1/status/poll/{task_id}"), url).await
    }

    async fn result(&self, task_id: &str) -> Result<ConversionResult, DocServeError> {
        let url = self.task_url("v1/result", task_id)?;
        self.get_json(&format!("v1/result/{task_id}"), url).await
    }

    async fn health(&self) -> Result<Value, DocServeError> {
        self.get_json("health", self.url("health")?).await
    }
}

/// Check the status code, then decode the body as JSON.
///
/// Non-2xx → [`DocServeError::Http`]; undecodable body →
/// [`DocServeError::Protocol`]. The body is read as text first so both
/// errors can quote it.
async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, DocServeError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| DocServeError::Transport {
        endpoint: path.to_string(),
        reason: format!("failed to read response body: {e}"),
    })?;

    if !status.is_success() {
        return Err(DocServeError::Http {
            endpoint: path.to_string(),
            status: status.as_u16(),
            body: excerpt(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| DocServeError::Protocol {
        endpoint: path.to_string(),
        detail: format!("{e} (body: {})", excerpt(&body)),
    })
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}\u{2026}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .base_url("https://svc.example.com/")
            .api_key("k")
            .identity_token("t")
            .build()
            .unwrap()
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY + 1);
        assert!(cut.ends_with('\u{2026}'));
        assert_eq!(excerpt("  short \n"), "short");
    }

    #[test]
    fn client_keeps_config() {
        let api = HttpTaskApi::new(config()).unwrap();
        assert_eq!(api.config().base_url, "https://svc.example.com");
    }

    #[test]
    fn task_id_is_one_encoded_path_segment() {
        let api = HttpTaskApi::new(config()).unwrap();
        let url = api.task_url("v1/status/poll", "abc?x=1#frag%").unwrap();
        assert_eq!(url.path(), "/v1/status/poll/abc%3Fx=1%23frag%25");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[tokio::test]
    async fn invalid_task_id_is_rejected_before_any_request() {
        let api = HttpTaskApi::new(config()).unwrap();
        let err = api.status("../etc").await.unwrap_err();
        assert!(matches!(err, DocServeError::InvalidTaskId { .. }));
        let err = api.result("").await.unwrap_err();
        assert!(matches!(err, DocServeError::InvalidTaskId { .. }));
    }
}
