use crate::aggregator::AggregatorSettings;
use crate::analyzer::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::types::{FetchConfig, Language, ResearchError, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://research.db";
const DEFAULT_RESULTS_PER_SOURCE: usize = 10;
const DEFAULT_MAX_CONCURRENT_SEARCHES: usize = 4;
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 120;
const DEFAULT_ANALYSIS_DELAY_MS: u64 = 500;
const ANALYZER_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration, read from environment variables.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub database_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub analyzer_timeout: Duration,
    pub youtube_api_key: Option<String>,
    pub languages: Vec<Language>,
    pub results_per_source: usize,
    pub max_concurrent_searches: usize,
    pub search_timeout: Duration,
    pub analysis_delay: Duration,
    pub digest_language: Language,
    pub fetch: FetchConfig,
}

impl ResearchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unset or blank keys take
    /// their default; set but unparsable values are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        let languages = match get("RESEARCH_LANGUAGES") {
            Some(raw) => parse_languages(&raw)?,
            None => vec![Language::Ko, Language::En],
        };

        let results_per_source = parse_or("RESEARCH_RESULTS_PER_SOURCE", get("RESEARCH_RESULTS_PER_SOURCE"), DEFAULT_RESULTS_PER_SOURCE)?;
        if results_per_source == 0 {
            return Err(ResearchError::Config("RESEARCH_RESULTS_PER_SOURCE must be at least 1".to_string()));
        }
        let max_concurrent_searches = parse_or(
            "RESEARCH_MAX_CONCURRENT_SEARCHES",
            get("RESEARCH_MAX_CONCURRENT_SEARCHES"),
            DEFAULT_MAX_CONCURRENT_SEARCHES,
        )?;
        if max_concurrent_searches == 0 {
            return Err(ResearchError::Config("RESEARCH_MAX_CONCURRENT_SEARCHES must be at least 1".to_string()));
        }
        let search_timeout_secs = parse_or("RESEARCH_SEARCH_TIMEOUT_SECS", get("RESEARCH_SEARCH_TIMEOUT_SECS"), DEFAULT_SEARCH_TIMEOUT_SECS)?;
        let analysis_delay_ms = parse_or("RESEARCH_ANALYSIS_DELAY_MS", get("RESEARCH_ANALYSIS_DELAY_MS"), DEFAULT_ANALYSIS_DELAY_MS)?;

        let digest_language = match get("DIGEST_LANGUAGE") {
            Some(raw) => Language::from_str(&raw).map_err(|e| ResearchError::Config(format!("DIGEST_LANGUAGE: {}", e)))?,
            None => Language::Ko,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            analyzer_timeout: Duration::from_secs(ANALYZER_TIMEOUT_SECS),
            youtube_api_key: get("YOUTUBE_API_KEY"),
            languages,
            results_per_source,
            max_concurrent_searches,
            search_timeout: Duration::from_secs(search_timeout_secs),
            analysis_delay: Duration::from_millis(analysis_delay_ms),
            digest_language,
            fetch: FetchConfig::default(),
        })
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            languages: self.languages.clone(),
            results_per_source: self.results_per_source,
            max_concurrent_searches: self.max_concurrent_searches,
            search_timeout: self.search_timeout,
        }
    }
}

/// Comma separated language codes, e.g. `ko,en`. Repeats are dropped.
pub fn parse_languages(raw: &str) -> Result<Vec<Language>> {
    let mut languages = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|code| !code.is_empty()) {
        let language = Language::from_str(code).map_err(|e| ResearchError::Config(format!("RESEARCH_LANGUAGES: {}", e)))?;
        if !languages.contains(&language) {
            languages.push(language);
        }
    }
    if languages.is_empty() {
        return Err(ResearchError::Config("RESEARCH_LANGUAGES lists no language".to_string()));
    }
    Ok(languages)
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| ResearchError::Config(format!("{} must be a non-negative integer, got {:?}", key, raw))),
        None => Ok(default),
    }
}
