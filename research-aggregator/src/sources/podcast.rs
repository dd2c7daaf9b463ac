use super::{description_from, finalize, origins_for, record_from_entry, scan_feeds, FeedOrigin};
use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use crate::types::{CanonicalRecord, Language, ParsedEntry, ParsedFeed, Result, SourceKind};
use crate::utils::{text, time};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const KOREAN_PODCASTS: &[FeedOrigin] = &[
    FeedOrigin::new("요즘IT", "https://yozm.wishket.com/magazine/feed/"),
    FeedOrigin::new("EO 이오", "https://www.youtube.com/feeds/videos.xml?channel_id=UCQ2DWm5Md16Dc3xRwwhVE7Q"),
];

const ENGLISH_PODCASTS: &[FeedOrigin] = &[
    FeedOrigin::new("Lex Fridman Podcast", "https://lexfridman.com/feed/podcast/"),
    FeedOrigin::new("The AI Podcast (NVIDIA)", "https://feeds.soundcloud.com/users/soundcloud:users:264034133/sounds.rss"),
    FeedOrigin::new("Practical AI", "https://changelog.com/practicalai/feed"),
    FeedOrigin::new("Machine Learning Street Talk", "https://anchor.fm/s/1e4a0eac/podcast/rss"),
    FeedOrigin::new("The TWIML AI Podcast", "https://twimlai.com/feed/"),
    FeedOrigin::new("Gradient Dissent", "https://feeds.soundcloud.com/users/soundcloud:users:777159189/sounds.rss"),
    FeedOrigin::new("AI in Business", "https://emerj.com/feed/podcast/"),
];

const ENTRIES_PER_FEED: usize = 10;
const ITUNES_SEARCH: &str = "https://itunes.apple.com/search";
const ITUNES_PODCAST: &str = "iTunes Podcast";

/// Podcast feeds plus the iTunes episode search.
pub struct PodcastAdapter {
    fetcher: Arc<Fetcher>,
}

#[derive(Debug, Deserialize)]
pub struct ItunesSearchResponse {
    #[serde(default)]
    pub results: Vec<ItunesEpisode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItunesEpisode {
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub track_view_url: Option<String>,
    #[serde(default)]
    pub episode_url: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub artwork_url600: Option<String>,
    #[serde(default)]
    pub artwork_url100: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl PodcastAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    async fn search_itunes(&self, topic: &str, language: Language, limit: usize) -> Vec<CanonicalRecord> {
        let result = match itunes_search_url(topic, language, limit) {
            Ok(url) => self.fetcher.fetch_json::<ItunesSearchResponse>(url.as_str()).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(response) => map_itunes(&response, language),
            Err(e) => {
                warn!(topic, language = %language, "iTunes search failed: {}", e);
                Vec::new()
            }
        }
    }
}

pub fn itunes_search_url(topic: &str, language: Language, limit: usize) -> Result<Url> {
    let country = match language {
        Language::Ko => "kr",
        Language::En => "us",
    };
    let limit = limit.to_string();
    Ok(Url::parse_with_params(
        ITUNES_SEARCH,
        &[
            ("term", topic.trim()),
            ("media", "podcast"),
            ("entity", "podcastEpisode"),
            ("limit", limit.as_str()),
            ("country", country),
        ],
    )?)
}

/// Maps one feed episode. The page link wins over the audio file; the
/// episode length, when known, leads the description.
pub fn map_episode(entry: &ParsedEntry, feed: &ParsedFeed, source_name: &str, language: Language) -> Option<CanonicalRecord> {
    let mut entry = entry.clone();
    if entry.url.as_deref().map_or(true, |url| url.trim().is_empty()) {
        entry.url = entry.audio_url.clone();
    }

    let mut record = record_from_entry(&entry, SourceKind::Podcast, source_name, language, feed.logo.as_deref())?;
    if let Some(duration) = entry.duration {
        let summary = record.description.take().unwrap_or_default();
        record.description = description_from(&format!("[{}] {}", time::format_duration(duration), summary));
    }
    Some(record)
}

fn parse_release_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            let prefix: String = value.trim().chars().take(19).collect();
            NaiveDateTime::parse_from_str(&prefix, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|at| at.and_utc())
        })
}

pub fn map_itunes(response: &ItunesSearchResponse, language: Language) -> Vec<CanonicalRecord> {
    response
        .results
        .iter()
        .filter_map(|episode| {
            let title = text::clean(episode.track_name.as_deref().unwrap_or_default());
            let url = episode
                .track_view_url
                .as_deref()
                .or(episode.episode_url.as_deref())
                .map(str::trim)
                .unwrap_or_default();
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let body = episode.description.as_deref().map(text::clean).filter(|d| !d.is_empty());

            Some(CanonicalRecord {
                title,
                url: url.to_string(),
                source_kind: SourceKind::Podcast,
                source_name: episode
                    .collection_name
                    .clone()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| ITUNES_PODCAST.to_string()),
                language,
                thumbnail_url: episode.artwork_url600.clone().or_else(|| episode.artwork_url100.clone()),
                description: body.as_deref().and_then(description_from),
                body_text: body,
                published_at: episode.release_date.as_deref().and_then(parse_release_date),
            })
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for PodcastAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Podcast
    }

    async fn search(&self, topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>> {
        let origins = origins_for(language, KOREAN_PODCASTS, ENGLISH_PODCASTS);
        let mut records = scan_feeds(&self.fetcher, origins, ENTRIES_PER_FEED, |origin, feed, entry| {
            map_episode(entry, feed, origin.name, language)
        })
        .await;

        records.extend(self.search_itunes(topic, language, (limit / 2).max(1)).await);

        let records = finalize(records, topic, SourceKind::Podcast, limit, Utc::now());
        info!(topic, language = %language, "Podcast search returned {} records", records.len());
        Ok(records)
    }
}
