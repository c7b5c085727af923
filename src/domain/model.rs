use std::path::PathBuf;

use super::error::SessionError;
use super::format::{FormatBuckets, FormatDescriptor};
use super::platform::Platform;

/// Which stage of the flow a session is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Analyzing,
    AwaitingSelection,
    Downloading,
    Completed,
    Failed,
}

impl JobStatus {
    /// States from which a download may be (re)started
    pub fn allows_download(self) -> bool {
        matches!(
            self,
            JobStatus::AwaitingSelection
                | JobStatus::Downloading
                | JobStatus::Completed
                | JobStatus::Failed
        )
    }
}

/// Metadata of the analysed media
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub formats: Vec<FormatDescriptor>,
}

impl MediaInfo {
    pub fn has_format(&self, format_id: &str) -> bool {
        self.formats.iter().any(|f| f.format_id == format_id)
    }
}

/// A finished job, ready to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    pub filename: String,
    pub file_size: Option<u64>,
    pub file_url: String,
}

/// Everything the controller knows about the current flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub source_url: String,
    pub platform: Platform,
    pub media_info: Option<MediaInfo>,
    pub buckets: FormatBuckets,
    pub selected_format_id: String,
    pub job_id: String,
    pub job_status: JobStatus,
    /// Last percentage reported by the backend, 0-100
    pub progress: u8,
    pub status_label: String,
    pub completed: Option<CompletedFile>,
    pub last_error: Option<String>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        *self == Session::default()
    }
}

/// Notifications pushed to the host while a session moves along
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged(JobStatus),
    PlatformDetected(Platform),
    MediaInfoReady(MediaInfo),
    FormatSelected(String),
    Progress { percent: u8, label: String },
    Completed(CompletedFile),
    Failed(String),
    /// Rejected input; the session state is untouched
    ValidationError(String),
    /// Bytes of the finished file written locally (0.0 to 1.0 when the size is known)
    RetrievalProgress(Option<f32>),
    RetrievalFinished(PathBuf),
    RetrievalFailed(SessionError),
    Reset,
}
