use crate::aggregator::ResearchAggregator;
use crate::types::{ResearchError, Result};
use crate::utils::text;
use chrono::Utc;
use interfaces::defs::{
    AnalysisRequest, AnalysisResult, Analyzer, ContentStore, GatewayError, ResearchRun, RunOutcome, RunSummary,
    StoredRecord, Topic, TopicId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Bodies longer than this are cut before they are sent for analysis.
pub const MAX_ANALYSIS_BODY_CHARS: usize = 4000;
pub const NO_ACTIVE_TOPICS: &str = "no active topics";

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    found: u64,
    analyzed: u64,
}

/// Drives collection, persistence and analysis over the active topics.
pub struct ResearchOrchestrator {
    aggregator: ResearchAggregator,
    store: Arc<dyn ContentStore>,
    analyzer: Arc<dyn Analyzer>,
    analysis_delay: Duration,
}

impl ResearchOrchestrator {
    pub fn new(
        aggregator: ResearchAggregator,
        store: Arc<dyn ContentStore>,
        analyzer: Arc<dyn Analyzer>,
        analysis_delay: Duration,
    ) -> Self {
        Self {
            aggregator,
            store,
            analyzer,
            analysis_delay,
        }
    }

    /// One full run over every active topic.
    ///
    /// Topics are processed one after another and each topic's records are
    /// committed as they are found, so a failure part way through keeps what
    /// earlier topics stored. Such a failure marks the run `failed` and is
    /// returned as [`ResearchError::RunFailed`].
    pub async fn run_daily_research(&self) -> Result<RunSummary> {
        let mut run = self.store.create_run().await?;
        info!(run_id = run.id, "Research run started");

        let topics = match self.store.list_active_topics().await {
            Ok(topics) => topics,
            Err(e) => return Err(self.fail_run(&mut run, Counters::default(), e.to_string()).await),
        };

        if topics.is_empty() {
            run.complete(Utc::now(), Some(NO_ACTIVE_TOPICS.to_string()));
            if let Err(e) = self.store.record_run(&run).await {
                let message = format!("could not record completed run: {}", e);
                return Err(self.fail_run(&mut run, Counters::default(), message).await);
            }
            info!(run_id = run.id, "No active topics, nothing to do");
            return Ok(RunSummary {
                status: RunOutcome::NoTopics,
                total_found: 0,
                total_analyzed: 0,
                topics_processed: 0,
            });
        }

        let mut counters = Counters::default();
        for topic in &topics {
            if let Err(e) = self.process_topic(topic, &mut counters).await {
                let message = format!("topic '{}' failed: {}", topic.name, e);
                return Err(self.fail_run(&mut run, counters, message).await);
            }
        }

        run.total_found = counters.found;
        run.total_analyzed = counters.analyzed;
        run.complete(Utc::now(), None);
        if let Err(e) = self.store.record_run(&run).await {
            let message = format!("could not record completed run: {}", e);
            return Err(self.fail_run(&mut run, counters, message).await);
        }

        info!(
            run_id = run.id,
            topics = topics.len(),
            found = counters.found,
            analyzed = counters.analyzed,
            "Research run completed"
        );
        Ok(RunSummary {
            status: RunOutcome::Completed,
            total_found: counters.found,
            total_analyzed: counters.analyzed,
            topics_processed: topics.len(),
        })
    }

    /// Processes a single topic, active or not. No run is recorded.
    pub async fn run_for_topic(&self, topic_id: TopicId) -> Result<RunSummary> {
        let topic = self
            .store
            .get_topic(topic_id)
            .await?
            .ok_or(ResearchError::TopicNotFound(topic_id))?;

        let mut counters = Counters::default();
        self.process_topic(&topic, &mut counters).await?;

        Ok(RunSummary {
            status: RunOutcome::Completed,
            total_found: counters.found,
            total_analyzed: counters.analyzed,
            topics_processed: 1,
        })
    }

    async fn process_topic(&self, topic: &Topic, counters: &mut Counters) -> Result<()> {
        info!(topic = %topic.name, topic_id = topic.id, "Processing topic");

        let batch = self.aggregator.collect(&topic.name).await;
        for record in &batch.records {
            if self.store.exists(&record.url).await? {
                debug!(topic = %topic.name, url = %record.url, "Already stored");
                continue;
            }
            match self.store.insert(record, topic.id).await {
                Ok(id) => {
                    counters.found += 1;
                    debug!(topic = %topic.name, record_id = id, "Stored {}", record.url);
                }
                Err(GatewayError::DuplicateUrl(url)) => {
                    warn!(topic = %topic.name, "Skipping {}: stored concurrently", url);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let pending = self.store.list_unanalyzed(topic.id).await?;
        info!(topic = %topic.name, "{} records awaiting analysis", pending.len());

        for (index, stored) in pending.iter().enumerate() {
            if index > 0 && !self.analysis_delay.is_zero() {
                tokio::time::sleep(self.analysis_delay).await;
            }

            let request = analysis_request(stored, &topic.name);
            let analysis = match self.analyzer.analyze(&request).await.and_then(AnalysisResult::sanitized) {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(topic = %topic.name, record_id = stored.id, "Analysis failed, retrying next run: {}", e);
                    continue;
                }
            };

            self.store.mark_analyzed(stored.id, &analysis).await?;
            counters.analyzed += 1;
            debug!(
                topic = %topic.name,
                record_id = stored.id,
                score = analysis.share_score,
                "Analyzed '{}'",
                stored.record.title
            );
        }

        Ok(())
    }

    async fn fail_run(&self, run: &mut ResearchRun, counters: Counters, message: String) -> ResearchError {
        run.total_found = counters.found;
        run.total_analyzed = counters.analyzed;
        run.fail(Utc::now(), message.clone());
        error!(run_id = run.id, "Research run failed: {}", message);

        if let Err(e) = self.store.record_run(run).await {
            error!(run_id = run.id, "Could not record run failure: {}", e);
        }
        ResearchError::RunFailed {
            run_id: run.id,
            message,
        }
    }
}

/// The analyzer input for a stored record: best available body, cut to
/// [`MAX_ANALYSIS_BODY_CHARS`].
pub fn analysis_request(stored: &StoredRecord, topic: &str) -> AnalysisRequest {
    let record = &stored.record;
    AnalysisRequest {
        title: record.title.clone(),
        body: text::truncate_chars(record.best_body(), MAX_ANALYSIS_BODY_CHARS),
        source_kind: record.source_kind,
        topic: topic.to_string(),
        language: record.language,
    }
}
