//! Wire data model for the conversion service.
//!
//! All of these types are owned and mutated by the remote service; the
//! client only reads them. Unknown fields are tolerated everywhere and, on
//! [`TaskStatusResponse`] and [`ConversionResult`], preserved so error
//! payloads and stored result files keep everything the server sent.

use crate::error::DocServeError;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

// ── Status ───────────────────────────────────────────────────────────────

/// Lifecycle state of a remote task.
///
/// The vocabulary is defined by the service. Anything this client does not
/// recognise lands in [`TaskStatus::Unknown`] and is treated as
/// non-terminal, so a new server-side state can never be mistaken for
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    /// Accepted by a worker. The server says `started` or `running`.
    Started,
    Success,
    Failure,
    Unknown(String),
}

impl TaskStatus {
    /// `success` and `failure` are the only terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Started => "started",
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
            TaskStatus::Unknown(s) => s,
        }
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("task_status is empty".to_string());
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "pending" => TaskStatus::Pending,
            "started" | "running" => TaskStatus::Started,
            "success" => TaskStatus::Success,
            "failure" => TaskStatus::Failure,
            _ => TaskStatus::Unknown(trimmed.to_string()),
        })
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Unknown(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of the status endpoint, and of the submission endpoint.
///
/// `task_status` is mandatory: a body without it (or with `null` or an empty
/// string) fails to decode and surfaces as a protocol error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default)]
    pub task_id: String,
    pub task_status: TaskStatus,
    /// Position in the server's queue while pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_position: Option<u64>,
    /// Free-form progress metadata while pending or running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_meta: Option<Value>,
    /// Any other fields the server returned, such as `error_message`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskStatusResponse {
    pub fn new(task_id: impl Into<String>, task_status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            task_status,
            task_position: None,
            task_meta: None,
            extra: Map::new(),
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.task_meta = Some(meta);
        self
    }

    /// Server-supplied failure reason, if the body carries one.
    pub fn error_message(&self) -> Option<&str> {
        ["error_message", "error", "detail"]
            .iter()
            .find_map(|key| self.extra.get(*key)?.as_str())
    }

    /// Compact JSON form, used as the failure payload in errors.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"task_status\":\"{}\"}}", self.task_status))
    }
}

// ── Result ───────────────────────────────────────────────────────────────

/// Full conversion output of a successful task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub chunks: Vec<Chunk>,
    /// Any other top-level fields the server returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversionResult {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            extra: Map::new(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_text_len(&self) -> usize {
        self.chunks.iter().map(|c| c.text.len()).sum()
    }

    /// First `max_chars` characters of the first chunk's text.
    pub fn preview(&self, max_chars: usize) -> Option<String> {
        self.chunks
            .first()
            .map(|c| c.text.chars().take(max_chars).collect())
    }
}

/// One piece of converted text with its positional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata::default(),
        }
    }
}

/// Free-form chunk metadata. Positional fields are optional and their
/// names vary between server versions, hence the accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkMetadata(pub Map<String, Value>);

impl ChunkMetadata {
    /// Page number from `page` or `page_no`.
    pub fn page(&self) -> Option<u64> {
        self.0
            .get("page")
            .or_else(|| self.0.get("page_no"))
            .and_then(Value::as_u64)
    }

    /// Bounding box from `bbox` or `box`, in whatever shape the server uses.
    pub fn bbox(&self) -> Option<&Value> {
        self.0.get("bbox").or_else(|| self.0.get("box"))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

// ── Submission ───────────────────────────────────────────────────────────

/// One input document for a conversion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    /// The server downloads the document itself.
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<Map<String, Value>>,
    },
    /// The document travels inline, base64-encoded.
    File {
        base64_string: String,
        filename: String,
    },
}

impl Source {
    pub fn http(url: impl Into<String>) -> Self {
        Source::Http {
            url: url.into(),
            headers: None,
        }
    }

    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Source::File {
            base64_string: base64::engine::general_purpose::STANDARD.encode(bytes),
            filename: filename.into(),
        }
    }

    /// Read a local file into an inline source.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, DocServeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DocServeError::SourceReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::from_bytes(filename, &bytes))
    }

    /// Treat `input` as a URL when it looks like one, otherwise as a path.
    pub async fn resolve(input: &str) -> Result<Self, DocServeError> {
        if is_url(input) {
            Ok(Self::http(input))
        } else {
            Self::from_path(input).await
        }
    }
}

/// Reject task ids that cannot safely appear in a URL path segment or as a
/// result file name.
pub fn validate_task_id(task_id: &str) -> Result<(), DocServeError> {
    let reason = if task_id.is_empty() {
        Some("must not be empty")
    } else if task_id == "." || task_id == ".." {
        Some("must not be a relative path component")
    } else if task_id.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if task_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("must not contain whitespace or control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(DocServeError::InvalidTaskId {
            task_id: task_id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Body of `POST /v1/convert/source/async`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertSourceRequest {
    pub sources: Vec<Source>,
    /// Server-side conversion options, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl ConvertSourceRequest {
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            sources,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}
