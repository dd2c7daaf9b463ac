use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TopicId = i64;
pub type RecordId = i64;
pub type RunId = i64;

/// The five content-origin categories a record can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Video,
    News,
    Blog,
    Paper,
    Podcast,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Video,
        SourceKind::News,
        SourceKind::Blog,
        SourceKind::Paper,
        SourceKind::Podcast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Video => "video",
            SourceKind::News => "news",
            SourceKind::Blog => "blog",
            SourceKind::Paper => "paper",
            SourceKind::Podcast => "podcast",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" | "youtube" => Ok(SourceKind::Video),
            "news" => Ok(SourceKind::News),
            "blog" => Ok(SourceKind::Blog),
            "paper" => Ok(SourceKind::Paper),
            "podcast" => Ok(SourceKind::Podcast),
            other => Err(GatewayError::UnknownValue(format!("source kind {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ko,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Ko => "ko",
            Language::En => "en",
        }
    }

    /// Name used when instructing a model which language to answer in.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Ko => "Korean",
            Language::En => "English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" => Ok(Language::Ko),
            "en" => Ok(Language::En),
            other => Err(GatewayError::UnknownValue(format!("language {other:?}"))),
        }
    }
}

/// Normalized, source-agnostic representation of one discovered piece of content.
///
/// The URL is the identity of a record until it has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub url: String,
    pub source_kind: SourceKind,
    pub source_name: String,
    pub language: Language,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub body_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl CanonicalRecord {
    /// Best text available for analysis: body, then description, then nothing.
    pub fn best_body(&self) -> &str {
        self.body_text
            .as_deref()
            .filter(|b| !b.is_empty())
            .or_else(|| self.description.as_deref().filter(|d| !d.is_empty()))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub insights: Vec<String>,
    pub business_relevance: String,
    pub share_score: f64,
    pub share_reason: String,
}

impl AnalysisResult {
    pub const MIN_SCORE: f64 = 0.0;
    pub const MAX_SCORE: f64 = 100.0;

    /// Clamps the share score into `[0, 100]`. Non-finite scores are rejected.
    pub fn sanitized(mut self) -> Result<Self, GatewayError> {
        if !self.share_score.is_finite() {
            return Err(GatewayError::InvalidAnalysis(format!(
                "share score is not a finite number: {}",
                self.share_score
            )));
        }
        self.share_score = self.share_score.clamp(Self::MIN_SCORE, Self::MAX_SCORE);
        Ok(self)
    }
}

/// A persisted record together with its store identity and analysis state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub topic_id: TopicId,
    pub record: CanonicalRecord,
    pub analysis: Option<AnalysisResult>,
    pub collected_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn is_analyzed(&self) -> bool {
        self.analysis.is_some()
    }

    pub fn share_score(&self) -> Option<f64> {
        self.analysis.as_ref().map(|a| a.share_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(GatewayError::UnknownValue(format!("run status {other:?}"))),
        }
    }
}

/// Lifecycle record of one end-to-end run. Counters only cover that run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRun {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub total_found: u64,
    pub total_analyzed: u64,
    pub error_message: Option<String>,
}

impl ResearchRun {
    pub fn started(id: RunId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            total_found: 0,
            total_analyzed: 0,
            error_message: None,
        }
    }

    pub fn complete(&mut self, at: DateTime<Utc>, note: Option<String>) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(at);
        self.error_message = note;
    }

    pub fn fail(&mut self, at: DateTime<Utc>, message: String) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(at);
        self.error_message = Some(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    NoTopics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunOutcome,
    pub total_found: u64,
    pub total_analyzed: u64,
    pub topics_processed: usize,
}

/// Everything the analyzer needs to score one record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub title: String,
    pub body: String,
    pub source_kind: SourceKind,
    pub topic: String,
    pub language: Language,
}

/// One compact line of the daily digest input.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestLine {
    pub source_kind: SourceKind,
    pub title: String,
    pub share_score: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("URL already stored: {0}")]
    DuplicateUrl(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(TopicId),

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Analyzer error: {0}")]
    Analyzer(String),

    #[error("Invalid analysis: {0}")]
    InvalidAnalysis(String),

    #[error("Unrecognized {0}")]
    UnknownValue(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Key-value-by-URL persistence the pipeline writes through.
///
/// Implementations must enforce URL uniqueness atomically: `insert` of a URL
/// that is already stored fails with [`GatewayError::DuplicateUrl`].
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn exists(&self, url: &str) -> GatewayResult<bool>;

    async fn insert(&self, record: &CanonicalRecord, topic_id: TopicId) -> GatewayResult<RecordId>;

    async fn list_unanalyzed(&self, topic_id: TopicId) -> GatewayResult<Vec<StoredRecord>>;

    async fn mark_analyzed(&self, id: RecordId, analysis: &AnalysisResult) -> GatewayResult<()>;

    async fn list_active_topics(&self) -> GatewayResult<Vec<Topic>>;

    async fn get_topic(&self, id: TopicId) -> GatewayResult<Option<Topic>>;

    /// Persists a new run in `running` state.
    async fn create_run(&self) -> GatewayResult<ResearchRun>;

    /// Writes the current lifecycle state and counters of a run.
    async fn record_run(&self, run: &ResearchRun) -> GatewayResult<()>;

    /// Analyzed records collected at or after `since`.
    async fn list_analyzed_since(&self, since: DateTime<Utc>) -> GatewayResult<Vec<StoredRecord>>;
}

/// External scoring service. Treated as an untrusted black box.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> GatewayResult<AnalysisResult>;

    async fn summarize(&self, lines: &[DigestLine], language: Language) -> GatewayResult<String>;
}
