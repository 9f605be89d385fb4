//! Webcam session status messages.

use serde::{Deserialize, Serialize};

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    Started,
    AlreadyRunning,
}

impl StartStatus {
    pub fn message(&self) -> &'static str {
        match self {
            StartStatus::Started => "Webcam started successfully",
            StartStatus::AlreadyRunning => "Webcam already running",
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    Stopped,
    NotRunning,
}

impl StopStatus {
    pub fn message(&self) -> &'static str {
        match self {
            StopStatus::Stopped => "Webcam stopped successfully",
            StopStatus::NotRunning => "Webcam is not running",
        }
    }
}

/// JSON body for start/stop responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl From<StartStatus> for StatusResponse {
    fn from(s: StartStatus) -> Self {
        Self {
            status: s.message().to_string(),
        }
    }
}

impl From<StopStatus> for StatusResponse {
    fn from(s: StopStatus) -> Self {
        Self {
            status: s.message().to_string(),
        }
    }
}
