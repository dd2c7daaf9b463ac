pub mod blog;
pub mod news;
pub mod paper;
pub mod podcast;
pub mod video;

pub use blog::BlogAdapter;
pub use news::NewsAdapter;
pub use paper::PaperAdapter;
pub use podcast::PodcastAdapter;
pub use video::VideoAdapter;

use crate::dedup;
use crate::fetcher::Fetcher;
use crate::parser::FeedParser;
use crate::recency::RecencyWindow;
use crate::traits::SourceAdapter;
use crate::types::{CanonicalRecord, Language, ParsedEntry, ParsedFeed, Result, SourceKind};
use crate::utils::text;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A named feed an adapter scans on every search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOrigin {
    pub name: &'static str,
    pub url: &'static str,
}

impl FeedOrigin {
    pub const fn new(name: &'static str, url: &'static str) -> Self {
        Self { name, url }
    }
}

/// All five adapters in collection order.
pub fn default_adapters(fetcher: Arc<Fetcher>, youtube_api_key: Option<String>) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(VideoAdapter::new(fetcher.clone(), youtube_api_key)),
        Arc::new(NewsAdapter::new(fetcher.clone())),
        Arc::new(BlogAdapter::new(fetcher.clone())),
        Arc::new(PaperAdapter::new(fetcher.clone())),
        Arc::new(PodcastAdapter::new(fetcher)),
    ]
}

pub(crate) fn origins_for(language: Language, korean: &'static [FeedOrigin], english: &'static [FeedOrigin]) -> &'static [FeedOrigin] {
    match language {
        Language::Ko => korean,
        Language::En => english,
    }
}

pub fn description_from(raw: &str) -> Option<String> {
    let cleaned = text::clean(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(text::truncate_chars(&cleaned, MAX_DESCRIPTION_CHARS))
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Maps a feed entry to a record. Entries without a title or link are dropped.
pub fn record_from_entry(
    entry: &ParsedEntry,
    kind: SourceKind,
    source_name: &str,
    language: Language,
    fallback_thumbnail: Option<&str>,
) -> Option<CanonicalRecord> {
    let title = text::clean(&entry.title);
    let url = entry.url.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let raw_summary = entry.summary_or_content();
    let thumbnail_url = entry
        .image_url
        .clone()
        .or_else(|| raw_summary.and_then(text::first_image_src))
        .or_else(|| entry.content.as_deref().and_then(text::first_image_src))
        .or_else(|| fallback_thumbnail.map(str::to_string));

    Some(CanonicalRecord {
        title,
        url: url.to_string(),
        source_kind: kind,
        source_name: source_name.to_string(),
        language,
        thumbnail_url,
        description: raw_summary.and_then(description_from),
        body_text: entry.content.as_deref().map(text::clean).and_then(non_empty),
        published_at: entry.timestamp(),
    })
}

/// Case-insensitive substring match against title, description and body.
pub fn matches_topic(record: &CanonicalRecord, topic: &str) -> bool {
    let needle = topic.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    text::contains_ignore_case(&record.title, &needle)
        || record
            .description
            .as_deref()
            .is_some_and(|d| text::contains_ignore_case(d, &needle))
        || record
            .body_text
            .as_deref()
            .is_some_and(|b| text::contains_ignore_case(b, &needle))
}

/// Topic match, recency window, URL dedup, newest first, truncation.
pub fn finalize(
    records: Vec<CanonicalRecord>,
    topic: &str,
    kind: SourceKind,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<CanonicalRecord> {
    let window = RecencyWindow::for_kind(kind);
    let candidates = records.len();
    let admitted: Vec<CanonicalRecord> = records
        .into_iter()
        .filter(|record| matches_topic(record, topic) && window.admits(record.published_at, now))
        .collect();

    let mut unique = dedup::dedup_by_url(admitted);
    dedup::sort_newest_first(&mut unique);
    unique.truncate(limit);

    debug!(kind = %kind, topic, "Kept {} of {} candidate records", unique.len(), candidates);
    unique
}

pub(crate) async fn fetch_feed(fetcher: &Fetcher, url: &str) -> Result<ParsedFeed> {
    let body = fetcher.fetch_text(url).await?;
    FeedParser::parse_feed(&body)
}

async fn scan_origin<F>(fetcher: &Fetcher, origin: FeedOrigin, per_feed: usize, map: &F) -> Vec<CanonicalRecord>
where
    F: Fn(&FeedOrigin, &ParsedFeed, &ParsedEntry) -> Option<CanonicalRecord> + Sync,
{
    match fetch_feed(fetcher, origin.url).await {
        Ok(feed) => feed
            .entries
            .iter()
            .take(per_feed)
            .filter_map(|entry| map(&origin, &feed, entry))
            .collect(),
        Err(e) => {
            warn!(origin = origin.name, url = origin.url, "Feed unavailable: {}", e);
            Vec::new()
        }
    }
}

/// Reads the first `per_feed` entries of every origin concurrently. A failing
/// origin is logged and contributes nothing.
pub(crate) async fn scan_feeds<F>(
    fetcher: &Fetcher,
    origins: &[FeedOrigin],
    per_feed: usize,
    map: F,
) -> Vec<CanonicalRecord>
where
    F: Fn(&FeedOrigin, &ParsedFeed, &ParsedEntry) -> Option<CanonicalRecord> + Sync,
{
    let scans: Vec<_> = origins
        .iter()
        .copied()
        .map(|origin| scan_origin(fetcher, origin, per_feed, &map))
        .collect();
    join_all(scans).await.into_iter().flatten().collect()
}
