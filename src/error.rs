//! Failure taxonomy for the upload pipeline.
//!
//! Remote and local failures are folded into a small set of kinds that end up
//! in the published upload result. Classification matters for retry behavior:
//! transient failures leave the content digest unrecorded, so the same bytes
//! are uploaded again the next time they are detected.

use serde::Serialize;

use crate::auth::AuthFlowError;
use crate::drive::DriveError;

/// Why an upload task failed, as reported in the latest-upload payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadErrorKind {
    /// Network or server-side failure while talking to the storage API.
    TransientUpload,
    /// Credential could not be obtained or was rejected.
    Auth,
    /// The local file vanished or became unreadable before it was sent.
    FilesystemRace,
}

impl UploadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadErrorKind::TransientUpload => "transient_upload",
            UploadErrorKind::Auth => "auth",
            UploadErrorKind::FilesystemRace => "filesystem_race",
        }
    }
}

impl std::fmt::Display for UploadErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&DriveError> for UploadErrorKind {
    fn from(err: &DriveError) -> Self {
        match err {
            DriveError::Auth { .. } => UploadErrorKind::Auth,
            DriveError::Io(_) => UploadErrorKind::FilesystemRace,
            DriveError::Status { .. } | DriveError::Transport(_) | DriveError::NoSessionUri => {
                UploadErrorKind::TransientUpload
            }
        }
    }
}

impl From<&AuthFlowError> for UploadErrorKind {
    fn from(err: &AuthFlowError) -> Self {
        match err {
            // The token endpoint being unreachable is a network problem,
            // not a rejected credential.
            AuthFlowError::Transport(_) => UploadErrorKind::TransientUpload,
            _ => UploadErrorKind::Auth,
        }
    }
}
