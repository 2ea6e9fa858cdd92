//! Detection and upload pipeline.
//!
//! The watcher polls the downloads directory and turns each finished video
//! file into an [`UploadTask`]. Tasks cross an unbounded channel to a single
//! worker, which publishes them to Drive one at a time. The worker is the
//! only writer of the shared latest-upload slot; the status endpoint only
//! reads it.

mod dedup;
mod digest;
mod watcher;
mod worker;

pub use dedup::DedupIndex;
pub use digest::{file_digest, HASH_CHUNK_SIZE};
pub use watcher::{FileWatcher, StabilityProbe, VIDEO_EXTENSIONS};
pub use worker::UploadWorker;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::UploadErrorKind;

/// A finished download waiting to be published.
///
/// Immutable once created. Owned by the queue until the worker claims it.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// Local path of the detected file.
    pub path: PathBuf,
    /// Original filename, used for remote naming and duplicate lookup.
    pub display_name: String,
    /// SHA-256 hex digest of the file contents.
    pub content_digest: String,
    /// When the watcher accepted the file.
    pub enqueued_at: DateTime<Utc>,
}

/// Outcome of the most recent upload attempt.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub success: bool,
    pub download_link: Option<String>,
    pub view_link: Option<String>,
    pub remote_file_id: Option<String>,
    pub error_kind: Option<UploadErrorKind>,
    pub timestamp: DateTime<Utc>,
}

impl UploadResult {
    pub fn published(
        download_link: String,
        view_link: Option<String>,
        remote_file_id: String,
    ) -> Self {
        Self {
            success: true,
            download_link: Some(download_link),
            view_link,
            remote_file_id: Some(remote_file_id),
            error_kind: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(kind: UploadErrorKind) -> Self {
        Self {
            success: false,
            download_link: None,
            view_link: None,
            remote_file_id: None,
            error_kind: Some(kind),
            timestamp: Utc::now(),
        }
    }
}

/// State of the latest-upload slot read by the status endpoint.
#[derive(Debug, Clone)]
pub enum LatestUpload {
    /// Nothing detected yet this run.
    Idle,
    /// A file was claimed by the worker and is on its way up.
    Loading { since: DateTime<Utc> },
    /// Terminal outcome of the most recent task.
    Done(UploadResult),
}

/// Shared slot holding the latest upload state.
///
/// Written by the worker, read by the status endpoint. The lock guarantees a
/// reader never observes a half-written result.
pub type SharedLatest = Arc<RwLock<LatestUpload>>;

pub fn shared_latest() -> SharedLatest {
    Arc::new(RwLock::new(LatestUpload::Idle))
}
