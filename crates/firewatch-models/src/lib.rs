//! Shared data models for the Firewatch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Model detections and the fixed fire/smoke/other class table
//! - Fire alert and video processing log records
//! - Upload job identifiers
//! - Webcam session status messages

pub mod detection;
pub mod job;
pub mod records;
pub mod session;

// Re-export common types
pub use detection::{BoundingBox, Detection, FireClass, CLASS_NAMES};
pub use job::JobId;
pub use records::{normalize_path, FireLogRecord, NewFireLog, NewVideoLog, VideoLogRecord};
pub use session::{StartStatus, StatusResponse, StopStatus};
