use crate::dedup;
use crate::traits::SourceAdapter;
use crate::types::{CanonicalRecord, Language};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub languages: Vec<Language>,
    pub results_per_source: usize,
    pub max_concurrent_searches: usize,
    pub search_timeout: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            languages: vec![Language::Ko, Language::En],
            results_per_source: 10,
            max_concurrent_searches: 4,
            search_timeout: Duration::from_secs(120),
        }
    }
}

/// Records gathered for one topic, unique by URL.
#[derive(Debug, Clone, Default)]
pub struct AggregatedBatch {
    pub records: Vec<CanonicalRecord>,
    pub calls_succeeded: usize,
    pub calls_failed: usize,
}

/// Fans one topic out over every adapter and language.
pub struct ResearchAggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    settings: AggregatorSettings,
}

impl ResearchAggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, settings: AggregatorSettings) -> Self {
        Self { adapters, settings }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Runs every supported (adapter, language) pair with at most
    /// `max_concurrent_searches` in flight. A slot frees as soon as its call
    /// settles. Results are merged in invocation order, so the first-seen copy
    /// of a URL is always the same one.
    pub async fn collect(&self, topic: &str) -> AggregatedBatch {
        let calls: Vec<(Arc<dyn SourceAdapter>, Language)> = self
            .adapters
            .iter()
            .flat_map(|adapter| {
                self.settings
                    .languages
                    .iter()
                    .filter(move |language| adapter.supports(**language))
                    .map(move |language| (adapter.clone(), *language))
            })
            .collect();

        info!(topic, "Collecting from {} adapter calls", calls.len());

        let limit = self.settings.results_per_source;
        let timeout = self.settings.search_timeout;
        let concurrency = self.settings.max_concurrent_searches.max(1);

        let mut outcomes: Vec<(usize, Option<Vec<CanonicalRecord>>)> = stream::iter(calls.into_iter().enumerate())
            .map(|(index, (adapter, language))| {
                let topic = topic.to_string();
                async move { (index, run_call(adapter, topic, language, limit, timeout).await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut batch = AggregatedBatch::default();
        let mut merged = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                Some(records) => {
                    batch.calls_succeeded += 1;
                    merged.extend(records);
                }
                None => batch.calls_failed += 1,
            }
        }
        batch.records = dedup::dedup_by_url(merged);

        info!(
            topic,
            records = batch.records.len(),
            succeeded = batch.calls_succeeded,
            failed = batch.calls_failed,
            "Collection finished"
        );
        batch
    }
}

/// One adapter call on its own task, so a panic stays contained, bounded by `timeout`.
async fn run_call(
    adapter: Arc<dyn SourceAdapter>,
    topic: String,
    language: Language,
    limit: usize,
    timeout: Duration,
) -> Option<Vec<CanonicalRecord>> {
    let kind = adapter.kind();
    let task_topic = topic.clone();
    let mut handle = tokio::spawn(async move { adapter.search(&task_topic, language, limit).await });

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(records))) => {
            debug!(topic, kind = %kind, language = %language, "Adapter returned {} records", records.len());
            Some(records)
        }
        Ok(Ok(Err(e))) => {
            warn!(topic, kind = %kind, language = %language, "Adapter failed: {}", e);
            None
        }
        Ok(Err(e)) => {
            warn!(topic, kind = %kind, language = %language, "Adapter task aborted: {}", e);
            None
        }
        Err(_) => {
            handle.abort();
            warn!(topic, kind = %kind, language = %language, "Adapter timed out after {:?}", timeout);
            None
        }
    }
}
