//! Request and response shapes for the Drive v3 REST surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata sent when creating a file or folder.
#[derive(Debug, Serialize)]
pub(super) struct FileMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A file or folder as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "webViewLink")]
    pub web_view_link: Option<String>,
}

/// Response of a files.list call.
#[derive(Debug, Deserialize)]
pub(super) struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// Body of a permissions.create call.
#[derive(Debug, Serialize)]
pub(super) struct PermissionRequest {
    #[serde(rename = "type")]
    pub grantee: &'static str,
    pub role: &'static str,
}

impl PermissionRequest {
    pub fn anyone_reader() -> Self {
        Self {
            grantee: "anyone",
            role: "reader",
        }
    }
}

/// The upload folder, resolved once and cached for the process lifetime.
#[derive(Debug, Clone)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

/// Failures talking to the storage API.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The credential was rejected outright.
    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    /// Any other non-success response.
    #[error("drive request failed (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    /// Connection, timeout, or body transfer problems.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The local file could not be read for upload.
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),

    /// The resumable session response lacked a Location header.
    #[error("upload session response carried no session URI")]
    NoSessionUri,
}

impl DriveError {
    /// Build the error for a non-success response, consuming its body.
    pub(super) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            // Drain the body so the connection can be reused.
            let _ = response.text().await;
            return DriveError::Auth { status };
        }

        let body = response.text().await.unwrap_or_default();
        DriveError::Status { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_metadata_skips_empty_fields() {
        let metadata = FileMetadata {
            name: "veo_20240101_120000_clip.mp4".to_string(),
            parents: vec!["folder123".to_string()],
            mime_type: None,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["name"], "veo_20240101_120000_clip.mp4");
        assert_eq!(json["parents"][0], "folder123");
        assert!(json.get("mimeType").is_none());
    }

    #[test]
    fn test_folder_metadata_includes_mime_type() {
        let metadata = FileMetadata {
            name: "Veo_Uploads".to_string(),
            parents: Vec::new(),
            mime_type: Some("application/vnd.google-apps.folder".to_string()),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["mimeType"], "application/vnd.google-apps.folder");
        assert!(json.get("parents").is_none());
    }

    #[test]
    fn test_permission_body() {
        let json = serde_json::to_value(PermissionRequest::anyone_reader()).unwrap();
        assert_eq!(json["type"], "anyone");
        assert_eq!(json["role"], "reader");
    }

    #[test]
    fn test_file_list_parses_partial_fields() {
        let list: FileList = serde_json::from_str(
            r#"{"files": [{"id": "a1", "name": "veo_x_clip.mp4"}, {"id": "b2"}]}"#,
        )
        .unwrap();
        assert_eq!(list.files.len(), 2);
        assert_eq!(list.files[0].name.as_deref(), Some("veo_x_clip.mp4"));
        assert!(list.files[1].web_view_link.is_none());
    }

    #[test]
    fn test_empty_list_response() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
    }
}
