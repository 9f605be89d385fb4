//! Upload validation, derived output paths and the staged-upload registry.

use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use firewatch_models::JobId;

use crate::error::{PipelineError, PipelineResult};

/// Accepted container extensions, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

pub const MSG_NO_FILE_PART: &str = "No file part in the request";
pub const MSG_NO_FILE_SELECTED: &str = "No file selected";
pub const MSG_FILE_TYPE_NOT_ALLOWED: &str = "File type not allowed";

/// Whether `filename` has an allowed video extension.
pub fn allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Reduce a client-supplied name to a safe basename.
///
/// Keeps only the final path segment, maps whitespace to `_`, drops every
/// character other than ASCII alphanumerics, `.`, `-` and `_`, and strips
/// leading and trailing dots and underscores.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// `processed_<name>`
pub fn processed_name(filename: &str) -> String {
    format!("processed_{}", filename)
}

/// `detection_log_<stem>.csv`
pub fn detection_log_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    format!("detection_log_{}.csv", stem)
}

/// An accepted upload and the three paths derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedUpload {
    pub job_id: JobId,
    pub original_name: String,
    pub filename: String,
    pub upload_path: PathBuf,
    pub processed_path: PathBuf,
    pub log_path: PathBuf,
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<JobId, StagedUpload>,
    order: VecDeque<JobId>,
    latest: Option<JobId>,
}

/// Staged uploads addressable by job id, plus the most recent one.
///
/// Only the newest `capacity` uploads are remembered.
pub struct UploadRegistry {
    upload_folder: PathBuf,
    processed_folder: PathBuf,
    capacity: usize,
    inner: Mutex<Registry>,
}

impl UploadRegistry {
    pub fn new(
        upload_folder: impl Into<PathBuf>,
        processed_folder: impl Into<PathBuf>,
        capacity: usize,
    ) -> Self {
        Self {
            upload_folder: upload_folder.into(),
            processed_folder: processed_folder.into(),
            capacity: capacity.max(1),
            inner: Mutex::new(Registry::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate a client filename and derive its paths. Nothing is recorded
    /// until [`UploadRegistry::commit`].
    pub fn stage(&self, original_name: &str) -> PipelineResult<StagedUpload> {
        if original_name.trim().is_empty() {
            return Err(PipelineError::invalid_upload(MSG_NO_FILE_SELECTED));
        }
        let filename = sanitize_filename(original_name);
        if filename.is_empty() || !allowed_file(&filename) {
            return Err(PipelineError::invalid_upload(MSG_FILE_TYPE_NOT_ALLOWED));
        }

        Ok(StagedUpload {
            job_id: JobId::new(),
            original_name: original_name.to_string(),
            upload_path: self.upload_folder.join(&filename),
            processed_path: self.processed_folder.join(processed_name(&filename)),
            log_path: self.processed_folder.join(detection_log_name(&filename)),
            filename,
        })
    }

    /// Record a staged upload once its file is on disk; it becomes the latest.
    pub fn commit(&self, upload: StagedUpload) {
        let mut inner = self.lock();
        let job_id = upload.job_id.clone();

        inner.order.push_back(job_id.clone());
        inner.jobs.insert(job_id.clone(), upload);
        inner.latest = Some(job_id.clone());

        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.jobs.remove(&evicted);
                debug!(job_id = %evicted, "Upload evicted from registry");
            }
        }
        info!(job_id = %job_id, "Upload staged");
    }

    pub fn get(&self, job_id: &JobId) -> Option<StagedUpload> {
        self.lock().jobs.get(job_id).cloned()
    }

    pub fn latest(&self) -> Option<StagedUpload> {
        let inner = self.lock();
        inner.latest.as_ref().and_then(|id| inner.jobs.get(id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve a replay path under `data_root`. Absolute paths and parent
/// components are rejected.
pub fn resolve_past_path(data_root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.is_empty() {
        return None;
    }
    let path = Path::new(relative);
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| data_root.join(path))
}

/// Output video and detection log paths for replaying `video`.
pub fn replay_paths(processed_folder: &Path, video: &Path) -> (PathBuf, PathBuf) {
    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    (
        processed_folder.join(processed_name(&name)),
        processed_folder.join(detection_log_name(&name)),
    )
}
