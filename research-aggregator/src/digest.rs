use crate::types::{ResearchError, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use interfaces::defs::{Analyzer, ContentStore, DigestLine, Language, StoredRecord};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

pub const MIN_DIGEST_SCORE: f64 = 60.0;
pub const MAX_DIGEST_ITEMS: usize = 20;
pub const NO_CONTENT_SENTINEL: &str = "No noteworthy content was collected today.";

#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub text: String,
    pub records: Vec<StoredRecord>,
}

/// Builds the daily narrative over the best records analyzed today.
pub struct DigestBuilder {
    store: Arc<dyn ContentStore>,
    analyzer: Arc<dyn Analyzer>,
    language: Language,
}

impl DigestBuilder {
    pub fn new(store: Arc<dyn ContentStore>, analyzer: Arc<dyn Analyzer>, language: Language) -> Self {
        Self {
            store,
            analyzer,
            language,
        }
    }

    /// Digest for the UTC day `today`. When nothing qualifies the sentinel
    /// text is returned and the analyzer is not called.
    pub async fn build(&self, today: NaiveDate) -> Result<Digest> {
        let midnight = today
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ResearchError::General(format!("no midnight on {}", today)))?;
        let start_of_day = Utc.from_utc_datetime(&midnight);
        let analyzed = self.store.list_analyzed_since(start_of_day).await?;
        debug!("{} records analyzed since {}", analyzed.len(), start_of_day);

        let records = select_digest_records(analyzed, today);
        if records.is_empty() {
            info!(day = %today, "Nothing scored high enough for a digest");
            return Ok(Digest {
                text: NO_CONTENT_SENTINEL.to_string(),
                records,
            });
        }

        let lines: Vec<DigestLine> = records
            .iter()
            .map(|stored| DigestLine {
                source_kind: stored.record.source_kind,
                title: stored.record.title.clone(),
                share_score: stored.share_score().unwrap_or_default(),
            })
            .collect();

        let text = self.analyzer.summarize(&lines, self.language).await?;
        info!(day = %today, items = records.len(), "Digest built");
        Ok(Digest { text, records })
    }
}

/// Analyzed records collected on `day` scoring at least [`MIN_DIGEST_SCORE`],
/// best first, at most [`MAX_DIGEST_ITEMS`].
pub fn select_digest_records(records: Vec<StoredRecord>, day: NaiveDate) -> Vec<StoredRecord> {
    let mut selected: Vec<StoredRecord> = records
        .into_iter()
        .filter(|stored| stored.collected_at.date_naive() == day)
        .filter(|stored| stored.share_score().is_some_and(|score| score >= MIN_DIGEST_SCORE))
        .collect();

    selected.sort_by(|a, b| {
        b.share_score()
            .partial_cmp(&a.share_score())
            .unwrap_or(Ordering::Equal)
    });
    selected.truncate(MAX_DIGEST_ITEMS);
    selected
}
