//! In-memory repositories for local runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use firewatch_models::{FireLogRecord, NewFireLog, NewVideoLog, VideoLogRecord};

use crate::error::{StoreError, StoreResult};
use crate::repository::{FireLogStore, VideoLogStore};

#[derive(Default)]
struct Tables {
    fire_logs: Vec<FireLogRecord>,
    video_logs: Vec<VideoLogRecord>,
    next_id: i64,
}

/// Both log tables held in process memory.
///
/// [`MemoryLogStore::set_available`] simulates a database outage: every
/// call fails with [`StoreError::Unavailable`] until it is restored.
#[derive(Default)]
pub struct MemoryLogStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of stored fire logs.
    pub fn fire_log_count(&self) -> usize {
        self.lock().fire_logs.len()
    }

    /// Number of stored video logs.
    pub fn video_log_count(&self) -> usize {
        self.lock().video_logs.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("in-memory store marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl FireLogStore for MemoryLogStore {
    async fn insert_fire_log(&self, record: &NewFireLog) -> StoreResult<i64> {
        self.check()?;
        let mut tables = self.lock();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.fire_logs.push(FireLogRecord {
            id,
            timestamp: record.timestamp,
            confidence: record.confidence,
            image_path: record.image_path.clone(),
        });
        Ok(id)
    }

    async fn list_fire_logs(&self) -> StoreResult<Vec<FireLogRecord>> {
        self.check()?;
        let mut records = self.lock().fire_logs.clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}

#[async_trait]
impl VideoLogStore for MemoryLogStore {
    async fn insert_video_log(&self, record: &NewVideoLog) -> StoreResult<i64> {
        self.check()?;
        let mut tables = self.lock();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.video_logs.push(VideoLogRecord {
            id,
            timestamp: record.timestamp,
            video_path: record.video_path.clone(),
            csv_path: record.csv_path.clone(),
        });
        Ok(id)
    }

    async fn list_video_logs(&self) -> StoreResult<Vec<VideoLogRecord>> {
        self.check()?;
        let mut records = self.lock().video_logs.clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn fire(hour: u32, confidence: f64) -> NewFireLog {
        NewFireLog {
            timestamp: at(hour),
            confidence,
            image_path: format!("fire_detect_img/fire_{}.jpg", hour),
        }
    }

    #[tokio::test]
    async fn test_fire_logs_newest_first() {
        let store = MemoryLogStore::new();
        store.insert_fire_log(&fire(9, 0.91)).await.unwrap();
        store.insert_fire_log(&fire(11, 0.95)).await.unwrap();
        store.insert_fire_log(&fire(10, 0.93)).await.unwrap();

        let logs = store.list_fire_logs().await.unwrap();
        let hours: Vec<_> = logs.iter().map(|r| r.timestamp).collect();
        assert_eq!(hours, vec![at(11), at(10), at(9)]);
    }

    #[tokio::test]
    async fn test_video_logs_roundtrip() {
        let store = MemoryLogStore::new();
        let id = store
            .insert_video_log(&NewVideoLog {
                timestamp: at(8),
                video_path: "processed_videos/processed_clip.mp4".into(),
                csv_path: "processed_videos/detection_log_clip.csv".into(),
            })
            .await
            .unwrap();
        let logs = store.list_video_logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, id);
        assert_eq!(store.fire_log_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryLogStore::new();
        store.set_available(false);
        assert!(store.insert_fire_log(&fire(1, 0.95)).await.is_err());
        assert!(store.list_video_logs().await.is_err());
        assert!(FireLogStore::ping(&store).await.is_err());

        store.set_available(true);
        assert!(store.list_fire_logs().await.unwrap().is_empty());
    }
}
