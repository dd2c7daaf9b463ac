use std::collections::HashSet;

use tracing::debug;

use crate::types::CanonicalRecord;

/// Keeps the first record seen for every URL, preserving order.
pub fn dedup_by_url(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let before = records.len();
    let mut seen_urls = HashSet::with_capacity(before);
    let unique: Vec<CanonicalRecord> = records
        .into_iter()
        .filter(|record| seen_urls.insert(record.url.clone()))
        .collect();

    let removed = before - unique.len();
    if removed > 0 {
        debug!("Removed {} duplicate records", removed);
    }
    unique
}

/// Newest first; undated records go last and keep their relative order.
pub fn sort_newest_first(records: &mut [CanonicalRecord]) {
    records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}
