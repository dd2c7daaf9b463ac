use chrono::{DateTime, Utc};
use interfaces::defs::{GatewayError, RunId, TopicId};

pub use interfaces::defs::{CanonicalRecord, Language, SourceKind};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// First retry delay; later ones double.
    pub retry_delay_ms: u64,
    pub max_body_size_mb: usize,
    pub max_redirects: usize,
    /// Minimum spacing between two requests to the same host.
    pub min_host_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; research-aggregator/0.1)".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_ms: 1000,
            max_body_size_mb: 10,
            max_redirects: 5,
            min_host_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub logo: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

/// One feed entry as read off the wire. Text fields are still raw (may carry HTML).
#[derive(Debug, Clone, Default)]
pub struct ParsedEntry {
    pub url: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub authors: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// Media thumbnail, or an image attached as media content / enclosure.
    pub image_url: Option<String>,
    /// First audio enclosure.
    pub audio_url: Option<String>,
    pub duration: Option<std::time::Duration>,
}

impl ParsedEntry {
    /// Publication time, falling back to the last update time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.updated_at)
    }

    /// Summary when present, otherwise the full content.
    pub fn summary_or_content(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.content.as_deref())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Topic not found: {0}")]
    TopicNotFound(TopicId),

    #[error("Run {run_id} failed: {message}")]
    RunFailed { run_id: RunId, message: String },

    #[error("Response body exceeds limit: {size_mb}MB from {url}")]
    BodyTooLarge { url: String, size_mb: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

impl ResearchError {
    /// Transport failures, rate limiting and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ResearchError::Http(e) => !e.is_builder() && !e.is_decode(),
            ResearchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResearchError>;
