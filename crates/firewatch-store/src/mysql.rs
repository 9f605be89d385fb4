//! MySQL repositories.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use metrics::counter;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, info};

use firewatch_models::{FireLogRecord, NewFireLog, NewVideoLog, VideoLogRecord};

use crate::error::StoreResult;
use crate::repository::{FireLogStore, VideoLogStore};
use crate::schema;

#[derive(Debug, FromRow)]
struct FireLogRow {
    id: i64,
    timestamp: NaiveDateTime,
    confidence: f64,
    image_path: String,
}

impl From<FireLogRow> for FireLogRecord {
    fn from(row: FireLogRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            confidence: row.confidence,
            image_path: row.image_path,
        }
    }
}

#[derive(Debug, FromRow)]
struct VideoLogRow {
    id: i64,
    timestamp: NaiveDateTime,
    video_path: String,
    csv_path: String,
}

impl From<VideoLogRow> for VideoLogRecord {
    fn from(row: VideoLogRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            video_path: row.video_path,
            csv_path: row.csv_path,
        }
    }
}

/// `fire_logs` repository.
#[derive(Clone)]
pub struct MySqlFireLogStore {
    pool: MySqlPool,
}

impl MySqlFireLogStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        schema::ensure_fire_logs(&self.pool).await
    }
}

#[async_trait]
impl FireLogStore for MySqlFireLogStore {
    async fn insert_fire_log(&self, record: &NewFireLog) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO fire_logs (`timestamp`, confidence, image_path) VALUES (?, ?, ?)",
        )
        .bind(record.timestamp)
        .bind(record.confidence)
        .bind(&record.image_path)
        .execute(&self.pool)
        .await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!("firewatch_store_writes_total", "table" => "fire_logs", "outcome" => outcome)
            .increment(1);

        let id = result?.last_insert_id() as i64;
        info!(id, confidence = record.confidence, "Inserted fire log");
        Ok(id)
    }

    async fn list_fire_logs(&self) -> StoreResult<Vec<FireLogRecord>> {
        let rows = sqlx::query_as::<_, FireLogRow>(
            "SELECT id, `timestamp`, confidence, image_path FROM fire_logs \
             ORDER BY `timestamp` DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Fetched fire logs");
        Ok(rows.into_iter().map(FireLogRecord::from).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// `video_logs` repository.
#[derive(Clone)]
pub struct MySqlVideoLogStore {
    pool: MySqlPool,
}

impl MySqlVideoLogStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        schema::ensure_video_logs(&self.pool).await
    }
}

#[async_trait]
impl VideoLogStore for MySqlVideoLogStore {
    async fn insert_video_log(&self, record: &NewVideoLog) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO video_logs (`timestamp`, video_path, csv_path) VALUES (?, ?, ?)",
        )
        .bind(record.timestamp)
        .bind(&record.video_path)
        .bind(&record.csv_path)
        .execute(&self.pool)
        .await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!("firewatch_store_writes_total", "table" => "video_logs", "outcome" => outcome)
            .increment(1);

        let id = result?.last_insert_id() as i64;
        info!(id, video_path = %record.video_path, "Inserted video log");
        Ok(id)
    }

    async fn list_video_logs(&self) -> StoreResult<Vec<VideoLogRecord>> {
        let rows = sqlx::query_as::<_, VideoLogRow>(
            "SELECT id, `timestamp`, video_path, csv_path FROM video_logs \
             ORDER BY `timestamp` DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Fetched video logs");
        Ok(rows.into_iter().map(VideoLogRecord::from).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
