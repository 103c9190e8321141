//! Configuration types for talking to the conversion service.
//!
//! Two structs, two concerns:
//!
//! * [`ClientConfig`] — where the service lives and how to authenticate.
//!   Every request carries `Authorization: Bearer <identity token>` (checked
//!   by the platform's access layer) and `X-Api-Key: <application key>`
//!   (checked by the service itself). Both are required.
//! * [`PollConfig`] — how long to wait for a task: attempt budget, delay
//!   between attempts, optional overall deadline, and where to store the
//!   result.
//!
//! Both are built through a builder whose `build()` validates the values,
//! so a config that exists is a config that can be used.

use crate::error::DocServeError;
use crate::retry::{Backoff, RetryPolicy};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the service base URL.
pub const ENV_URL: &str = "DOCSERVE_URL";
/// Environment variable holding the application key.
pub const ENV_API_KEY: &str = "DOCSERVE_API_KEY";
/// Environment variable holding the identity token.
pub const ENV_ID_TOKEN: &str = "DOCSERVE_ID_TOKEN";

/// Connection and credential settings for [`crate::api::HttpTaskApi`].
///
/// # Example
/// ```rust
/// use docserve_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://docserve-abc123.a.run.app")
///     .api_key("app-key")
///     .identity_token("eyJhbGciOi...")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "https://docserve-abc123.a.run.app");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Service root, without a trailing slash.
    pub base_url: String,

    /// Application key sent as `X-Api-Key`.
    pub api_key: String,

    /// Short-lived identity token sent as a bearer credential.
    pub identity_token: String,

    /// Per-request timeout in seconds. Default: 60.
    ///
    /// Applies to each status, result and submit call individually, not to
    /// the polling run as a whole (see [`PollConfig::deadline`]).
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            identity_token: String::new(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("identity_token", &redact(&self.identity_token))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build from `DOCSERVE_URL`, `DOCSERVE_API_KEY` and `DOCSERVE_ID_TOKEN`.
    pub fn from_env() -> Result<Self, DocServeError> {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self::builder()
            .base_url(var(ENV_URL))
            .api_key(var(ENV_API_KEY))
            .identity_token(var(ENV_ID_TOKEN))
            .build()
    }

    /// Full URL for a path relative to the service root.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into().trim().to_string();
        self
    }

    pub fn identity_token(mut self, token: impl Into<String>) -> Self {
        self.config.identity_token = token.into().trim().to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, DocServeError> {
        let c = &self.config;
        if c.base_url.is_empty() {
            return Err(DocServeError::InvalidConfig(format!(
                "service URL is not set (use --url or {ENV_URL})"
            )));
        }
        if !crate::task::is_url(&c.base_url) {
            return Err(DocServeError::InvalidConfig(format!(
                "service URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.api_key.is_empty() {
            return Err(DocServeError::InvalidConfig(format!(
                "application key is not set (use --api-key or {ENV_API_KEY})"
            )));
        }
        if c.identity_token.is_empty() {
            return Err(DocServeError::InvalidConfig(format!(
                "identity token is not set (use --id-token or {ENV_ID_TOKEN})"
            )));
        }
        Ok(self.config)
    }
}

/// Settings for one polling run.
///
/// # Example
/// ```rust
/// use docserve_client::PollConfig;
/// use std::time::Duration;
///
/// let config = PollConfig::builder()
///     .max_attempts(30)
///     .interval(Duration::from_secs(2))
///     .output_dir("results")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_attempts, 30);
/// ```
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of status requests. Default: 60.
    pub max_attempts: u32,

    /// Delay between status requests. Default: fixed 5 s.
    ///
    /// Fixed spacing is what an operator watching a conversion expects;
    /// library users polling many tasks can switch to
    /// [`Backoff::Exponential`].
    pub backoff: Backoff,

    /// Upper bound on total waiting time. Default: none, the attempt budget
    /// alone bounds the run.
    pub deadline: Option<Duration>,

    /// Directory that receives `<task_id>.json` on success. Default: none
    /// (the result is returned but not written).
    pub output_dir: Option<PathBuf>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
            deadline: None,
            output_dir: None,
        }
    }
}

impl PollConfig {
    /// Create a new builder for `PollConfig`.
    pub fn builder() -> PollConfigBuilder {
        PollConfigBuilder {
            config: Self::default(),
        }
    }

    /// The retry policy this config describes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            deadline: self.deadline,
        }
    }
}

/// Builder for [`PollConfig`].
#[derive(Debug)]
pub struct PollConfigBuilder {
    config: PollConfig,
}

impl PollConfigBuilder {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    /// Fixed delay between attempts.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.backoff = Backoff::Fixed(interval);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = Some(deadline);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PollConfig, DocServeError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(DocServeError::InvalidConfig(
                "max attempts must be ≥ 1".into(),
            ));
        }
        if let Backoff::Exponential { initial, max } = &c.backoff {
            if initial > max {
                return Err(DocServeError::InvalidConfig(format!(
                    "exponential backoff initial delay {initial:?} exceeds max {max:?}"
                )));
            }
        }
        if c.deadline == Some(Duration::ZERO) {
            return Err(DocServeError::InvalidConfig(
                "deadline must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}
