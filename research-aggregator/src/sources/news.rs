use super::{fetch_feed, finalize, origins_for, record_from_entry, scan_feeds, FeedOrigin};
use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use crate::types::{CanonicalRecord, Language, ParsedFeed, Result, SourceKind};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const KOREAN_FEEDS: &[FeedOrigin] = &[
    FeedOrigin::new("조선일보 IT", "https://www.chosun.com/arc/outboundfeeds/rss/category/it-science/?outputType=xml"),
    FeedOrigin::new("한경 IT", "https://www.hankyung.com/feed/it"),
    FeedOrigin::new("전자신문", "https://rss.etnews.com/Section901.xml"),
    FeedOrigin::new("ZDNet Korea", "https://zdnet.co.kr/rss/all_news.xml"),
    FeedOrigin::new("AI타임스", "https://www.aitimes.com/rss/allArticle.xml"),
];

const ENGLISH_FEEDS: &[FeedOrigin] = &[
    FeedOrigin::new("TechCrunch AI", "https://techcrunch.com/category/artificial-intelligence/feed/"),
    FeedOrigin::new("VentureBeat AI", "https://venturebeat.com/category/ai/feed/"),
    FeedOrigin::new("The Verge AI", "https://www.theverge.com/rss/ai-artificial-intelligence/index.xml"),
    FeedOrigin::new("Wired AI", "https://www.wired.com/feed/tag/ai/latest/rss"),
    FeedOrigin::new("MIT Tech Review", "https://www.technologyreview.com/feed/"),
];

const ENTRIES_PER_FEED: usize = 20;
const GOOGLE_NEWS_SEARCH: &str = "https://news.google.com/rss/search";
const GOOGLE_NEWS: &str = "Google News";

/// Curated news feeds plus a Google News search.
pub struct NewsAdapter {
    fetcher: Arc<Fetcher>,
}

impl NewsAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    async fn search_google_news(&self, topic: &str, language: Language, limit: usize) -> Vec<CanonicalRecord> {
        let url = match google_news_url(topic, language) {
            Ok(url) => url,
            Err(e) => {
                warn!(topic, "Could not build Google News query: {}", e);
                return Vec::new();
            }
        };
        match fetch_feed(&self.fetcher, url.as_str()).await {
            Ok(feed) => map_google_news(&feed, language, limit),
            Err(e) => {
                warn!(topic, language = %language, "Google News search failed: {}", e);
                Vec::new()
            }
        }
    }
}

pub fn google_news_url(topic: &str, language: Language) -> Result<Url> {
    let (hl, gl) = match language {
        Language::Ko => ("ko", "KR"),
        Language::En => ("en", "US"),
    };
    let ceid = format!("{}:{}", gl, hl);
    Ok(Url::parse_with_params(
        GOOGLE_NEWS_SEARCH,
        &[("q", topic), ("hl", hl), ("gl", gl), ("ceid", ceid.as_str())],
    )?)
}

/// Google News titles carry the publisher as a `" - Publisher"` suffix.
pub fn split_publisher(title: &str) -> (&str, Option<&str>) {
    match title.rsplit_once(" - ") {
        Some((head, publisher)) if !head.trim().is_empty() && !publisher.trim().is_empty() => {
            (head, Some(publisher.trim()))
        }
        _ => (title, None),
    }
}

pub fn map_google_news(feed: &ParsedFeed, language: Language, limit: usize) -> Vec<CanonicalRecord> {
    feed.entries
        .iter()
        .take(limit)
        .filter_map(|entry| {
            let (title, publisher) = split_publisher(&entry.title);
            let mut entry = entry.clone();
            let source_name = publisher.unwrap_or(GOOGLE_NEWS).to_string();
            entry.title = title.to_string();
            record_from_entry(&entry, SourceKind::News, &source_name, language, None)
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for NewsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn search(&self, topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>> {
        let origins = origins_for(language, KOREAN_FEEDS, ENGLISH_FEEDS);
        let mut records = scan_feeds(&self.fetcher, origins, ENTRIES_PER_FEED, |origin, _feed, entry| {
            record_from_entry(entry, SourceKind::News, origin.name, language, None)
        })
        .await;

        records.extend(self.search_google_news(topic, language, (limit / 2).max(1)).await);

        let records = finalize(records, topic, SourceKind::News, limit, Utc::now());
        info!(topic, language = %language, "News search returned {} records", records.len());
        Ok(records)
    }
}
