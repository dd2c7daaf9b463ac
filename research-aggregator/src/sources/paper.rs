use super::{description_from, fetch_feed, finalize, record_from_entry};
use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use crate::types::{CanonicalRecord, Language, ParsedFeed, Result, SourceKind};
use crate::utils::text;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const ARXIV_QUERY: &str = "http://export.arxiv.org/api/query";
const PAPERS_WITH_CODE_SEARCH: &str = "https://paperswithcode.com/api/v1/papers/";
const PAPERS_WITH_CODE: &str = "Papers With Code";
const LISTED_AUTHORS: usize = 3;
const LISTED_CATEGORIES: usize = 3;

/// arXiv preprints plus Papers With Code. Both publish in English only.
pub struct PaperAdapter {
    fetcher: Arc<Fetcher>,
}

#[derive(Debug, Deserialize)]
pub struct PapersWithCodeResponse {
    #[serde(default)]
    pub results: Vec<PapersWithCodePaper>,
}

#[derive(Debug, Deserialize)]
pub struct PapersWithCodePaper {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub url_abs: Option<String>,
    #[serde(default)]
    pub paper_url: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
}

impl PaperAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    async fn search_arxiv(&self, topic: &str, limit: usize) -> Vec<CanonicalRecord> {
        let result = match arxiv_query_url(topic, limit) {
            Ok(url) => fetch_feed(&self.fetcher, url.as_str()).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(feed) => map_arxiv(&feed),
            Err(e) => {
                warn!(topic, "arXiv search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn search_papers_with_code(&self, topic: &str, limit: usize) -> Vec<CanonicalRecord> {
        let result = match papers_with_code_url(topic, limit) {
            Ok(url) => self.fetcher.fetch_json::<PapersWithCodeResponse>(url.as_str()).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(response) => map_papers_with_code(&response),
            Err(e) => {
                warn!(topic, "Papers With Code search failed: {}", e);
                Vec::new()
            }
        }
    }
}

pub fn arxiv_query_url(topic: &str, limit: usize) -> Result<Url> {
    let query = format!("all:{}", topic.trim());
    let max_results = limit.to_string();
    Ok(Url::parse_with_params(
        ARXIV_QUERY,
        &[
            ("search_query", query.as_str()),
            ("start", "0"),
            ("max_results", max_results.as_str()),
            ("sortBy", "submittedDate"),
            ("sortOrder", "descending"),
        ],
    )?)
}

pub fn papers_with_code_url(topic: &str, limit: usize) -> Result<Url> {
    let per_page = limit.to_string();
    Ok(Url::parse_with_params(
        PAPERS_WITH_CODE_SEARCH,
        &[("q", topic.trim()), ("items_per_page", per_page.as_str())],
    )?)
}

/// `"A, B, C and 2 more"`.
pub fn author_line(authors: &[String]) -> String {
    let listed: Vec<&str> = authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .take(LISTED_AUTHORS)
        .collect();
    let mut line = listed.join(", ");
    if authors.len() > LISTED_AUTHORS {
        line.push_str(&format!(" and {} more", authors.len() - LISTED_AUTHORS));
    }
    line
}

pub fn map_arxiv(feed: &ParsedFeed) -> Vec<CanonicalRecord> {
    feed.entries
        .iter()
        .filter_map(|entry| {
            let categories: Vec<&str> = entry.tags.iter().map(String::as_str).take(LISTED_CATEGORIES).collect();
            let source_name = if categories.is_empty() {
                "arXiv".to_string()
            } else {
                format!("arXiv ({})", categories.join(", "))
            };

            let mut record = record_from_entry(entry, SourceKind::Paper, &source_name, Language::En, None)?;
            let abstract_text = entry.summary.as_deref().map(text::clean).unwrap_or_default();
            let authors = author_line(&entry.authors);
            record.description = if authors.is_empty() {
                description_from(&abstract_text)
            } else {
                description_from(&format!("Authors: {}. {}", authors, abstract_text))
            };
            if !abstract_text.is_empty() {
                record.body_text = Some(abstract_text);
            }
            Some(record)
        })
        .collect()
}

fn parse_published_day(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

pub fn map_papers_with_code(response: &PapersWithCodeResponse) -> Vec<CanonicalRecord> {
    response
        .results
        .iter()
        .filter_map(|paper| {
            let title = text::clean(paper.title.as_deref().unwrap_or_default());
            let url = paper
                .url_abs
                .as_deref()
                .or(paper.paper_url.as_deref())
                .map(str::trim)
                .unwrap_or_default();
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let abstract_text = paper.abstract_text.as_deref().map(text::clean).filter(|a| !a.is_empty());

            Some(CanonicalRecord {
                title,
                url: url.to_string(),
                source_kind: SourceKind::Paper,
                source_name: PAPERS_WITH_CODE.to_string(),
                language: Language::En,
                thumbnail_url: None,
                description: abstract_text.as_deref().and_then(description_from),
                body_text: abstract_text,
                published_at: paper.published.as_deref().and_then(parse_published_day),
            })
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for PaperAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Paper
    }

    fn supports(&self, language: Language) -> bool {
        language == Language::En
    }

    async fn search(&self, topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>> {
        if !self.supports(language) {
            return Ok(Vec::new());
        }

        let mut records = self.search_arxiv(topic, limit).await;
        records.extend(self.search_papers_with_code(topic, (limit / 2).max(1)).await);

        let records = finalize(records, topic, SourceKind::Paper, limit, Utc::now());
        info!(topic, "Paper search returned {} records", records.len());
        Ok(records)
    }
}
