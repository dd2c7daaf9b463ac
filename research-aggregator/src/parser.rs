use crate::types::{ParsedEntry, ParsedFeed, ResearchError, Result};
use feed_rs::model::{Entry, Link, MediaObject};
use feed_rs::parser;
use tracing::debug;

pub struct FeedParser;

impl FeedParser {
    /// Parses RSS 0.9x/2.0, Atom or JSON Feed content.
    pub fn parse_feed(content: &str) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| ResearchError::Parse(format!("Failed to parse feed: {}", e)))?;

        let title = feed.title.map(|t| t.content);
        let logo = feed.logo.map(|image| image.uri).or_else(|| feed.icon.map(|image| image.uri));
        let entries: Vec<ParsedEntry> = feed.entries.into_iter().map(Self::parse_entry).collect();

        debug!("Parsed feed with {} entries", entries.len());

        Ok(ParsedFeed {
            title,
            logo,
            entries,
        })
    }

    fn parse_entry(entry: Entry) -> ParsedEntry {
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let url = primary_link(&entry.links).map(|link| link.href.trim().to_string());

        let image_url = entry.media.iter().find_map(media_image);
        let audio_url = entry.media.iter().find_map(media_audio);
        let duration = entry
            .media
            .iter()
            .find_map(|media| media.duration.or_else(|| media.content.iter().find_map(|c| c.duration)));

        // YouTube channel feeds only describe videos inside media:group
        let summary = entry.summary.map(|s| s.content).or_else(|| {
            entry
                .media
                .iter()
                .find_map(|media| media.description.as_ref().map(|d| d.content.clone()))
        });

        ParsedEntry {
            url,
            title,
            summary,
            content: entry.content.and_then(|c| c.body),
            authors: entry.authors.into_iter().map(|a| a.name).collect(),
            published_at: entry.published,
            updated_at: entry.updated,
            tags: entry.categories.into_iter().map(|c| c.term).collect(),
            image_url,
            audio_url,
            duration,
        }
    }
}

/// The `alternate` link, or the first link when none is marked.
fn primary_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|link| link.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .filter(|link| !link.href.trim().is_empty())
}

fn media_image(media: &MediaObject) -> Option<String> {
    media
        .thumbnails
        .first()
        .map(|thumbnail| thumbnail.image.uri.clone())
        .or_else(|| {
            media.content.iter().find_map(|content| {
                let is_image = content
                    .content_type
                    .as_ref()
                    .is_some_and(|mime| mime.essence_str().starts_with("image/"));
                if is_image {
                    content.url.as_ref().map(|url| url.to_string())
                } else {
                    None
                }
            })
        })
}

fn media_audio(media: &MediaObject) -> Option<String> {
    media.content.iter().find_map(|content| {
        let is_audio = content
            .content_type
            .as_ref()
            .is_some_and(|mime| mime.essence_str().starts_with("audio/"));
        if is_audio {
            content.url.as_ref().map(|url| url.to_string())
        } else {
            None
        }
    })
}
