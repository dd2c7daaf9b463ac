use super::{description_from, finalize, origins_for, record_from_entry, scan_feeds, FeedOrigin};
use crate::fetcher::Fetcher;
use crate::recency::RecencyWindow;
use crate::traits::SourceAdapter;
use crate::types::{CanonicalRecord, Language, Result, SourceKind};
use crate::utils::text;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const API_KEY_HEADER: &str = "X-Goog-Api-Key";
const YOUTUBE_SEARCH: &str = "https://www.googleapis.com/youtube/v3/search";
const YOUTUBE_WATCH: &str = "https://www.youtube.com/watch";
const YOUTUBE: &str = "YouTube";
const ENTRIES_PER_CHANNEL: usize = 15;

const KOREAN_CHANNELS: &[FeedOrigin] = &[
    FeedOrigin::new("EO 이오", "https://www.youtube.com/feeds/videos.xml?channel_id=UCQ2DWm5Md16Dc3xRwwhVE7Q"),
];

const ENGLISH_CHANNELS: &[FeedOrigin] = &[
    FeedOrigin::new("Two Minute Papers", "https://www.youtube.com/feeds/videos.xml?channel_id=UCbfYPyITQ-7l4upoX8nvctg"),
    FeedOrigin::new("Yannic Kilcher", "https://www.youtube.com/feeds/videos.xml?channel_id=UCZHmQk67mSJgfCCTn7xBfew"),
    FeedOrigin::new("Lex Fridman", "https://www.youtube.com/feeds/videos.xml?channel_id=UCSHZKyawb77ixDdsGog4iWA"),
];

/// YouTube search through the Data API when a key is configured, otherwise the
/// upload feeds of a few curated channels.
pub struct VideoAdapter {
    fetcher: Arc<Fetcher>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YoutubeSearchResponse {
    #[serde(default)]
    pub items: Vec<YoutubeSearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct YoutubeSearchItem {
    #[serde(default)]
    pub id: YoutubeVideoId,
    #[serde(default)]
    pub snippet: YoutubeSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeVideoId {
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: YoutubeThumbnails,
}

#[derive(Debug, Default, Deserialize)]
pub struct YoutubeThumbnails {
    #[serde(default)]
    pub high: Option<YoutubeThumbnail>,
    #[serde(default)]
    pub medium: Option<YoutubeThumbnail>,
    #[serde(default)]
    pub default: Option<YoutubeThumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct YoutubeThumbnail {
    pub url: String,
}

impl VideoAdapter {
    pub fn new(fetcher: Arc<Fetcher>, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    async fn search_api(&self, api_key: &str, topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>> {
        let url = youtube_search_url(topic, language, limit, Utc::now())?;
        let response: YoutubeSearchResponse = self
            .fetcher
            .fetch_json_with_headers(url.as_str(), &[(API_KEY_HEADER, api_key)])
            .await?;
        Ok(map_youtube_search(&response, language))
    }

    async fn scan_channels(&self, language: Language) -> Vec<CanonicalRecord> {
        let origins = origins_for(language, KOREAN_CHANNELS, ENGLISH_CHANNELS);
        scan_feeds(&self.fetcher, origins, ENTRIES_PER_CHANNEL, |origin, _feed, entry| {
            record_from_entry(entry, SourceKind::Video, origin.name, language, None)
        })
        .await
    }
}

pub fn youtube_search_url(topic: &str, language: Language, limit: usize, now: DateTime<Utc>) -> Result<Url> {
    let (region, relevance) = match language {
        Language::Ko => ("KR", "ko"),
        Language::En => ("US", "en"),
    };
    let published_after = RecencyWindow::for_kind(SourceKind::Video)
        .cutoff(now)
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let max_results = limit.to_string();
    Ok(Url::parse_with_params(
        YOUTUBE_SEARCH,
        &[
            ("part", "snippet"),
            ("q", topic.trim()),
            ("type", "video"),
            ("maxResults", max_results.as_str()),
            ("order", "date"),
            ("publishedAfter", published_after.as_str()),
            ("regionCode", region),
            ("relevanceLanguage", relevance),
        ],
    )?)
}

pub fn watch_url(video_id: &str) -> Result<Url> {
    Ok(Url::parse_with_params(YOUTUBE_WATCH, &[("v", video_id)])?)
}

pub fn map_youtube_search(response: &YoutubeSearchResponse, language: Language) -> Vec<CanonicalRecord> {
    response
        .items
        .iter()
        .filter_map(|item| {
            let video_id = item.id.video_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
            let url = watch_url(video_id).ok()?;
            let title = text::clean(&item.snippet.title);
            if title.is_empty() {
                return None;
            }
            let thumbnails = &item.snippet.thumbnails;
            let thumbnail_url = thumbnails
                .high
                .as_ref()
                .or(thumbnails.medium.as_ref())
                .or(thumbnails.default.as_ref())
                .map(|thumbnail| thumbnail.url.clone());

            Some(CanonicalRecord {
                title,
                url: url.to_string(),
                source_kind: SourceKind::Video,
                source_name: item
                    .snippet
                    .channel_title
                    .clone()
                    .filter(|channel| !channel.trim().is_empty())
                    .unwrap_or_else(|| YOUTUBE.to_string()),
                language,
                thumbnail_url,
                description: description_from(&item.snippet.description),
                body_text: None,
                published_at: item
                    .snippet
                    .published_at
                    .as_deref()
                    .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
                    .map(|at| at.with_timezone(&Utc)),
            })
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for VideoAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    async fn search(&self, topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>> {
        let records = match self.api_key.as_deref() {
            Some(api_key) => match self.search_api(api_key, topic, language, limit).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(topic, language = %language, "YouTube API search failed, falling back to channel feeds: {}", e);
                    self.scan_channels(language).await
                }
            },
            None => self.scan_channels(language).await,
        };

        let records = finalize(records, topic, SourceKind::Video, limit, Utc::now());
        info!(topic, language = %language, "Video search returned {} records", records.len());
        Ok(records)
    }
}
