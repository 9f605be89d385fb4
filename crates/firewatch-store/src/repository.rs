//! Repository traits for the two log tables.

use async_trait::async_trait;

use firewatch_models::{FireLogRecord, NewFireLog, NewVideoLog, VideoLogRecord};

use crate::error::StoreResult;

/// Append-only store of realtime fire alerts.
#[async_trait]
pub trait FireLogStore: Send + Sync {
    /// Insert one record, returning its id.
    async fn insert_fire_log(&self, record: &NewFireLog) -> StoreResult<i64>;

    /// All records, newest timestamp first.
    async fn list_fire_logs(&self) -> StoreResult<Vec<FireLogRecord>>;

    /// Connectivity probe for readiness checks.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Append-only store of completed VOD runs.
#[async_trait]
pub trait VideoLogStore: Send + Sync {
    /// Insert one record, returning its id.
    async fn insert_video_log(&self, record: &NewVideoLog) -> StoreResult<i64>;

    /// All records, newest timestamp first.
    async fn list_video_logs(&self) -> StoreResult<Vec<VideoLogRecord>>;

    /// Connectivity probe for readiness checks.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
