use crate::types::{CanonicalRecord, Language, Result, SourceKind};
use async_trait::async_trait;

/// Queries one external source family and maps its results to canonical records.
///
/// Failures of individual origins are logged inside the adapter and contribute
/// no records; an `Err` means the adapter as a whole could not run.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Whether this adapter has any origin for `language`.
    fn supports(&self, _language: Language) -> bool {
        true
    }

    /// Records mentioning `topic`, inside the kind's recency window, unique by
    /// URL, newest first, at most `limit`.
    async fn search(&self, topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>>;
}
