use super::{fetch_feed, finalize, origins_for, record_from_entry, scan_feeds, FeedOrigin};
use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use crate::types::{CanonicalRecord, Language, ParsedFeed, ResearchError, Result, SourceKind};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const KOREAN_BLOGS: &[FeedOrigin] = &[
    FeedOrigin::new("카카오 AI", "https://tech.kakao.com/feed/"),
    FeedOrigin::new("네이버 D2", "https://d2.naver.com/d2.atom"),
    FeedOrigin::new("라인 엔지니어링", "https://techblog.lycorp.co.jp/ko/feed/index.xml"),
    FeedOrigin::new("우아한형제들", "https://techblog.woowahan.com/feed/"),
    FeedOrigin::new("당근마켓", "https://medium.com/feed/daangn"),
    FeedOrigin::new("토스 기술블로그", "https://toss.tech/rss.xml"),
];

const ENGLISH_BLOGS: &[FeedOrigin] = &[
    FeedOrigin::new("OpenAI Blog", "https://openai.com/blog/rss/"),
    FeedOrigin::new("Google AI Blog", "https://blog.google/technology/ai/rss/"),
    FeedOrigin::new("Meta AI", "https://ai.facebook.com/blog/rss/"),
    FeedOrigin::new("Anthropic", "https://www.anthropic.com/feed.xml"),
    FeedOrigin::new("Hugging Face", "https://huggingface.co/blog/feed.xml"),
    FeedOrigin::new("Towards Data Science", "https://towardsdatascience.com/feed"),
];

const ENTRIES_PER_FEED: usize = 15;
const MEDIUM_TAG_FEED: &str = "https://medium.com/feed/tag";

/// Engineering blogs plus the Medium tag feed for the topic.
pub struct BlogAdapter {
    fetcher: Arc<Fetcher>,
}

impl BlogAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    async fn search_medium(&self, topic: &str, language: Language, limit: usize) -> Vec<CanonicalRecord> {
        let url = match medium_tag_url(topic) {
            Ok(url) => url,
            Err(e) => {
                warn!(topic, "Could not build Medium tag URL: {}", e);
                return Vec::new();
            }
        };
        match fetch_feed(&self.fetcher, url.as_str()).await {
            Ok(feed) => map_medium(&feed, language, limit),
            Err(e) => {
                warn!(topic, "Medium tag feed failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Medium tags are the lower-cased topic with spaces turned into dashes.
pub fn medium_tag(topic: &str) -> String {
    topic.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase()
}

pub fn medium_tag_url(topic: &str) -> Result<Url> {
    let mut url = Url::parse(MEDIUM_TAG_FEED)?;
    url.path_segments_mut()
        .map_err(|_| ResearchError::General(format!("{} cannot carry a path", MEDIUM_TAG_FEED)))?
        .push(&medium_tag(topic));
    Ok(url)
}

pub fn map_medium(feed: &ParsedFeed, language: Language, limit: usize) -> Vec<CanonicalRecord> {
    feed.entries
        .iter()
        .take(limit)
        .filter_map(|entry| {
            let source_name = match entry.authors.first().map(|a| a.trim()).filter(|a| !a.is_empty()) {
                Some(author) => format!("Medium - {}", author),
                None => "Medium".to_string(),
            };
            record_from_entry(entry, SourceKind::Blog, &source_name, language, None)
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for BlogAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Blog
    }

    async fn search(&self, topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>> {
        let origins = origins_for(language, KOREAN_BLOGS, ENGLISH_BLOGS);
        let mut records = scan_feeds(&self.fetcher, origins, ENTRIES_PER_FEED, |origin, _feed, entry| {
            record_from_entry(entry, SourceKind::Blog, origin.name, language, None)
        })
        .await;

        records.extend(self.search_medium(topic, language, (limit / 2).max(1)).await);

        let records = finalize(records, topic, SourceKind::Blog, limit, Utc::now());
        info!(topic, language = %language, "Blog search returned {} records", records.len());
        Ok(records)
    }
}
