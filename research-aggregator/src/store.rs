use crate::types::{ResearchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::defs::{
    AnalysisResult, CanonicalRecord, ContentStore, GatewayError, GatewayResult, Language, RecordId,
    ResearchRun, RunStatus, SourceKind, StoredRecord, Topic, TopicId,
};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        topic_id INTEGER NOT NULL REFERENCES topics(id),
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        source_kind TEXT NOT NULL,
        source_name TEXT NOT NULL,
        language TEXT NOT NULL,
        thumbnail_url TEXT,
        description TEXT,
        body_text TEXT,
        published_at TEXT,
        collected_at TEXT NOT NULL,
        is_analyzed INTEGER NOT NULL DEFAULT 0,
        summary TEXT,
        insights TEXT,
        business_relevance TEXT,
        share_score REAL CHECK (share_score IS NULL OR (share_score >= 0 AND share_score <= 100)),
        share_reason TEXT,
        analyzed_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_contents_topic_analyzed ON contents(topic_id, is_analyzed)",
    "CREATE INDEX IF NOT EXISTS idx_contents_collected_at ON contents(collected_at)",
    r#"
    CREATE TABLE IF NOT EXISTS research_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        status TEXT NOT NULL,
        total_found INTEGER NOT NULL DEFAULT 0,
        total_analyzed INTEGER NOT NULL DEFAULT 0,
        error_message TEXT
    )
    "#,
];

const CONTENT_COLUMNS: &str = "id, topic_id, title, url, source_kind, source_name, language, thumbnail_url, \
     description, body_text, published_at, collected_at, is_analyzed, summary, insights, \
     business_relevance, share_score, share_reason";

const HIGH_SCORE: f64 = 80.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_contents: i64,
    pub analyzed_contents: i64,
    pub high_score_contents: i64,
    pub active_topics: i64,
    pub contents_by_kind: Vec<(SourceKind, i64)>,
}

/// [`ContentStore`] on SQLite. URL uniqueness is a table constraint.
#[derive(Clone)]
pub struct SqliteContentStore {
    db: SqlitePool,
}

fn store_error(e: sqlx::Error) -> GatewayError {
    GatewayError::Store(e.to_string())
}

fn decode_error(column: &str, e: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.to_string().into(),
    }
}

fn record_from_row(row: &SqliteRow) -> std::result::Result<StoredRecord, sqlx::Error> {
    let source_kind: String = row.try_get("source_kind")?;
    let language: String = row.try_get("language")?;
    let is_analyzed: bool = row.try_get("is_analyzed")?;

    let analysis = if is_analyzed {
        let insights: Option<String> = row.try_get("insights")?;
        let insights = match insights {
            Some(json) => serde_json::from_str(&json).map_err(|e| decode_error("insights", e))?,
            None => Vec::new(),
        };
        Some(AnalysisResult {
            summary: row.try_get::<Option<String>, _>("summary")?.unwrap_or_default(),
            insights,
            business_relevance: row.try_get::<Option<String>, _>("business_relevance")?.unwrap_or_default(),
            share_score: row.try_get::<Option<f64>, _>("share_score")?.unwrap_or_default(),
            share_reason: row.try_get::<Option<String>, _>("share_reason")?.unwrap_or_default(),
        })
    } else {
        None
    };

    Ok(StoredRecord {
        id: row.try_get("id")?,
        topic_id: row.try_get("topic_id")?,
        record: CanonicalRecord {
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            source_kind: SourceKind::from_str(&source_kind).map_err(|e| decode_error("source_kind", e))?,
            source_name: row.try_get("source_name")?,
            language: Language::from_str(&language).map_err(|e| decode_error("language", e))?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            description: row.try_get("description")?,
            body_text: row.try_get("body_text")?,
            published_at: row.try_get("published_at")?,
        },
        analysis,
        collected_at: row.try_get("collected_at")?,
    })
}

fn topic_from_row(row: &SqliteRow) -> std::result::Result<Topic, sqlx::Error> {
    Ok(Topic {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn run_from_row(row: &SqliteRow) -> std::result::Result<ResearchRun, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(ResearchRun {
        id: row.try_get("id")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        status: RunStatus::from_str(&status).map_err(|e| decode_error("status", e))?,
        total_found: row.try_get::<i64, _>("total_found")?.max(0) as u64,
        total_analyzed: row.try_get::<i64, _>("total_analyzed")?.max(0) as u64,
        error_message: row.try_get("error_message")?,
    })
}

impl SqliteContentStore {
    /// Opens (creating if missing) the database at `database_url` and applies the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.migrate().await?;
        info!("Content store ready at {}", database_url);
        Ok(store)
    }

    /// A private in-memory database. One connection that never expires, so the
    /// data lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.db).await?;
        }
        debug!("Schema applied");
        Ok(())
    }

    pub async fn add_topic(&self, name: &str, description: Option<&str>) -> Result<Topic> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ResearchError::General("topic name is empty".to_string()));
        }
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO topics (name, description, is_active, created_at, updated_at)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ResearchError::General(format!("topic already exists: {}", name)));
        }

        info!("Added topic '{}'", name);
        Ok(Topic {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            description: description.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query("SELECT * FROM topics ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(topic_from_row).collect::<std::result::Result<_, _>>()?)
    }

    pub async fn set_topic_active(&self, id: TopicId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE topics SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ResearchError::TopicNotFound(id));
        }
        info!("Topic {} is now {}", id, if active { "active" } else { "inactive" });
        Ok(())
    }

    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<ResearchRun>> {
        let rows = sqlx::query("SELECT * FROM research_runs ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(run_from_row).collect::<std::result::Result<_, _>>()?)
    }

    /// Moves a record's collection time, e.g. when backfilling older material.
    pub async fn set_collected_at(&self, id: RecordId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE contents SET collected_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::RecordNotFound(id).into());
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let total_contents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents")
            .fetch_one(&self.db)
            .await?;
        let analyzed_contents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents WHERE is_analyzed = 1")
            .fetch_one(&self.db)
            .await?;
        let high_score_contents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents WHERE share_score >= ?")
            .bind(HIGH_SCORE)
            .fetch_one(&self.db)
            .await?;
        let active_topics: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics WHERE is_active = 1")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query("SELECT source_kind, COUNT(*) AS count FROM contents GROUP BY source_kind ORDER BY source_kind")
            .fetch_all(&self.db)
            .await?;
        let mut contents_by_kind = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind: String = row.try_get("source_kind")?;
            let count: i64 = row.try_get("count")?;
            contents_by_kind.push((SourceKind::from_str(&kind)?, count));
        }

        Ok(StoreStats {
            total_contents,
            analyzed_contents,
            high_score_contents,
            active_topics,
            contents_by_kind,
        })
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn exists(&self, url: &str) -> GatewayResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM contents WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.db)
            .await
            .map_err(store_error)?;
        Ok(found.is_some())
    }

    async fn insert(&self, record: &CanonicalRecord, topic_id: TopicId) -> GatewayResult<RecordId> {
        let result = sqlx::query(
            r#"
            INSERT INTO contents (topic_id, title, url, source_kind, source_name, language,
                                  thumbnail_url, description, body_text, published_at, collected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(topic_id)
        .bind(&record.title)
        .bind(&record.url)
        .bind(record.source_kind.as_str())
        .bind(&record.source_name)
        .bind(record.language.code())
        .bind(&record.thumbnail_url)
        .bind(&record.description)
        .bind(&record.body_text)
        .bind(record.published_at)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::DuplicateUrl(record.url.clone()));
        }
        Ok(result.last_insert_rowid())
    }

    async fn list_unanalyzed(&self, topic_id: TopicId) -> GatewayResult<Vec<StoredRecord>> {
        let query = format!(
            "SELECT {} FROM contents WHERE topic_id = ? AND is_analyzed = 0 ORDER BY id",
            CONTENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(topic_id)
            .fetch_all(&self.db)
            .await
            .map_err(store_error)?;
        rows.iter()
            .map(record_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(store_error)
    }

    async fn mark_analyzed(&self, id: RecordId, analysis: &AnalysisResult) -> GatewayResult<()> {
        let insights = serde_json::to_string(&analysis.insights)
            .map_err(|e| GatewayError::Store(format!("cannot encode insights: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE contents
            SET is_analyzed = 1, summary = ?, insights = ?, business_relevance = ?,
                share_score = ?, share_reason = ?, analyzed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&analysis.summary)
        .bind(insights)
        .bind(&analysis.business_relevance)
        .bind(analysis.share_score)
        .bind(&analysis.share_reason)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn list_active_topics(&self) -> GatewayResult<Vec<Topic>> {
        let rows = sqlx::query("SELECT * FROM topics WHERE is_active = 1 ORDER BY id")
            .fetch_all(&self.db)
            .await
            .map_err(store_error)?;
        rows.iter()
            .map(topic_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(store_error)
    }

    async fn get_topic(&self, id: TopicId) -> GatewayResult<Option<Topic>> {
        let row = sqlx::query("SELECT * FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(store_error)?;
        row.as_ref().map(topic_from_row).transpose().map_err(store_error)
    }

    async fn create_run(&self) -> GatewayResult<ResearchRun> {
        let started_at = Utc::now();
        let result = sqlx::query("INSERT INTO research_runs (started_at, status) VALUES (?, ?)")
            .bind(started_at)
            .bind(RunStatus::Running.as_str())
            .execute(&self.db)
            .await
            .map_err(store_error)?;
        Ok(ResearchRun::started(result.last_insert_rowid(), started_at))
    }

    async fn record_run(&self, run: &ResearchRun) -> GatewayResult<()> {
        sqlx::query(
            r#"
            UPDATE research_runs
            SET completed_at = ?, status = ?, total_found = ?, total_analyzed = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(run.completed_at)
        .bind(run.status.as_str())
        .bind(run.total_found as i64)
        .bind(run.total_analyzed as i64)
        .bind(&run.error_message)
        .bind(run.id)
        .execute(&self.db)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn list_analyzed_since(&self, since: DateTime<Utc>) -> GatewayResult<Vec<StoredRecord>> {
        let query = format!(
            "SELECT {} FROM contents WHERE is_analyzed = 1 AND collected_at >= ? ORDER BY share_score DESC, id",
            CONTENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(since)
            .fetch_all(&self.db)
            .await
            .map_err(store_error)?;
        rows.iter()
            .map(record_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(store_error)
    }
}
