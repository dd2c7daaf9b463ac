use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::defs::{
    AnalysisResult, CanonicalRecord, ContentStore, GatewayError, GatewayResult, RecordId,
    ResearchRun, RunId, StoredRecord, Topic, TopicId,
};

#[derive(Default)]
struct Tables {
    topics: Vec<Topic>,
    records: Vec<StoredRecord>,
    url_index: HashMap<String, RecordId>,
    runs: Vec<ResearchRun>,
}

/// Process-local [`ContentStore`]. One mutex guards every table, so an
/// insert checks and claims its URL atomically.
#[derive(Default)]
pub struct MemoryContentStore {
    tables: Mutex<Tables>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| GatewayError::Store("memory store lock poisoned".to_string()))
    }

    pub fn add_topic(&self, name: &str, description: Option<&str>) -> GatewayResult<Topic> {
        let mut tables = self.lock()?;
        if tables.topics.iter().any(|t| t.name == name) {
            return Err(GatewayError::Store(format!("topic already exists: {name}")));
        }
        let now = Utc::now();
        let topic = Topic {
            id: tables.topics.len() as TopicId + 1,
            name: name.to_string(),
            description: description.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.topics.push(topic.clone());
        Ok(topic)
    }

    pub fn set_topic_active(&self, id: TopicId, active: bool) -> GatewayResult<()> {
        let mut tables = self.lock()?;
        let topic = tables
            .topics
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(GatewayError::TopicNotFound(id))?;
        topic.is_active = active;
        topic.updated_at = Utc::now();
        Ok(())
    }

    pub fn records(&self) -> GatewayResult<Vec<StoredRecord>> {
        Ok(self.lock()?.records.clone())
    }

    pub fn record_by_url(&self, url: &str) -> GatewayResult<Option<StoredRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .url_index
            .get(url)
            .and_then(|id| tables.records.iter().find(|r| r.id == *id))
            .cloned())
    }

    pub fn runs(&self) -> GatewayResult<Vec<ResearchRun>> {
        Ok(self.lock()?.runs.clone())
    }

    /// Overrides the collection time of a record, for reproducing records from earlier days.
    pub fn set_collected_at(&self, id: RecordId, at: DateTime<Utc>) -> GatewayResult<()> {
        let mut tables = self.lock()?;
        let record = tables
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(GatewayError::RecordNotFound(id))?;
        record.collected_at = at;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn exists(&self, url: &str) -> GatewayResult<bool> {
        Ok(self.lock()?.url_index.contains_key(url))
    }

    async fn insert(&self, record: &CanonicalRecord, topic_id: TopicId) -> GatewayResult<RecordId> {
        let mut tables = self.lock()?;
        if tables.url_index.contains_key(&record.url) {
            return Err(GatewayError::DuplicateUrl(record.url.clone()));
        }
        let id = tables.records.len() as RecordId + 1;
        tables.url_index.insert(record.url.clone(), id);
        tables.records.push(StoredRecord {
            id,
            topic_id,
            record: record.clone(),
            analysis: None,
            collected_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_unanalyzed(&self, topic_id: TopicId) -> GatewayResult<Vec<StoredRecord>> {
        Ok(self
            .lock()?
            .records
            .iter()
            .filter(|r| r.topic_id == topic_id && !r.is_analyzed())
            .cloned()
            .collect())
    }

    async fn mark_analyzed(&self, id: RecordId, analysis: &AnalysisResult) -> GatewayResult<()> {
        let mut tables = self.lock()?;
        let record = tables
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(GatewayError::RecordNotFound(id))?;
        record.analysis = Some(analysis.clone());
        Ok(())
    }

    async fn list_active_topics(&self) -> GatewayResult<Vec<Topic>> {
        Ok(self
            .lock()?
            .topics
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn get_topic(&self, id: TopicId) -> GatewayResult<Option<Topic>> {
        Ok(self.lock()?.topics.iter().find(|t| t.id == id).cloned())
    }

    async fn create_run(&self) -> GatewayResult<ResearchRun> {
        let mut tables = self.lock()?;
        let run = ResearchRun::started(tables.runs.len() as RunId + 1, Utc::now());
        tables.runs.push(run.clone());
        Ok(run)
    }

    async fn record_run(&self, run: &ResearchRun) -> GatewayResult<()> {
        let mut tables = self.lock()?;
        match tables.runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => tables.runs.push(run.clone()),
        }
        Ok(())
    }

    async fn list_analyzed_since(&self, since: DateTime<Utc>) -> GatewayResult<Vec<StoredRecord>> {
        Ok(self
            .lock()?
            .records
            .iter()
            .filter(|r| r.is_analyzed() && r.collected_at >= since)
            .cloned()
            .collect())
    }
}
