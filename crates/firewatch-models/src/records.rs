//! Persisted log records.
//!
//! Both record kinds are append-only: the service inserts and lists them but
//! never updates or deletes rows.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Normalize path separators for serving (`\` becomes `/`).
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// A realtime fire alert as stored in `fire_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireLogRecord {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub confidence: f64,
    pub image_path: String,
}

impl FireLogRecord {
    /// Copy of this record with web-friendly path separators.
    pub fn normalized(mut self) -> Self {
        self.image_path = normalize_path(&self.image_path);
        self
    }
}

/// Insert payload for `fire_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFireLog {
    pub timestamp: NaiveDateTime,
    pub confidence: f64,
    pub image_path: String,
}

/// A completed VOD processing run as stored in `video_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoLogRecord {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub video_path: String,
    pub csv_path: String,
}

impl VideoLogRecord {
    /// Copy of this record with web-friendly path separators.
    pub fn normalized(mut self) -> Self {
        self.video_path = normalize_path(&self.video_path);
        self.csv_path = normalize_path(&self.csv_path);
        self
    }
}

/// Insert payload for `video_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVideoLog {
    pub timestamp: NaiveDateTime,
    pub video_path: String,
    pub csv_path: String,
}
