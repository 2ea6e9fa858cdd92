//! HTTP client for the Drive v3 API.
//!
//! Covers exactly the calls the pipeline needs: resolve-or-create the upload
//! folder, upload a file through a resumable session, make an object public,
//! and look up previous uploads by name. Every call takes the bearer token
//! for this request, so a refreshed credential is always picked up.

use std::path::Path;
use std::time::Duration;

use reqwest::header;
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

use super::http::send_with_retry;
use super::types::{DriveError, DriveFile, FileList, FileMetadata, PermissionRequest, RemoteFolder};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3/";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3/";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Timeout for metadata calls.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Timeout for the media transfer itself. Video files can be large.
const MEDIA_UPLOAD_TIMEOUT_SECS: u64 = 3600;

/// Read buffer for the streamed upload body.
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// MIME type for a video filename, falling back to video/mp4.
pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "gif" => "image/gif",
        _ => "video/mp4",
    }
}

/// Direct-download URL for a file id. Built locally, no extra API call.
pub fn direct_download_link(file_id: &str) -> String {
    format!(
        "https://drive.google.com/uc?export=download&id={}&confirm=t",
        file_id
    )
}

/// Browser URL of a folder.
pub fn folder_link(folder_id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{}", folder_id)
}

/// Escape a value for embedding in a files.list query literal.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub struct DriveClient {
    http: reqwest::Client,
    base: Url,
    upload_base: Url,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        let base = Url::parse(DRIVE_API_BASE).expect("Drive API base URL is valid");
        let upload_base = Url::parse(DRIVE_UPLOAD_BASE).expect("Drive upload base URL is valid");

        Self {
            http,
            base,
            upload_base,
        }
    }

    /// Find the named folder, creating it when absent.
    pub async fn ensure_folder(&self, token: &str, name: &str) -> Result<RemoteFolder, DriveError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query(name),
            FOLDER_MIME_TYPE
        );

        let url = self.files_url();
        let response = send_with_retry(|| {
            self.http
                .get(url.clone())
                .bearer_auth(token)
                .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
        })
        .await?;

        let list: FileList = response.json().await?;
        if let Some(found) = list.files.into_iter().next() {
            debug!("found existing folder {} ({})", name, found.id);
            return Ok(RemoteFolder {
                name: found.name.unwrap_or_else(|| name.to_string()),
                id: found.id,
            });
        }

        let metadata = FileMetadata {
            name: name.to_string(),
            parents: Vec::new(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        };

        let url = self.files_url();
        let response = send_with_retry(|| {
            self.http
                .post(url.clone())
                .bearer_auth(token)
                .query(&[("fields", "id")])
                .json(&metadata)
        })
        .await?;

        let created: DriveFile = response.json().await?;
        debug!("created folder {} ({})", name, created.id);

        Ok(RemoteFolder {
            id: created.id,
            name: name.to_string(),
        })
    }

    /// Upload a local file into the folder under the given remote name.
    ///
    /// Opens a resumable session and streams the bytes in one shot; an
    /// interrupted transfer is reported as an error rather than resumed.
    pub async fn upload_file(
        &self,
        token: &str,
        local_path: &Path,
        remote_name: &str,
        folder_id: &str,
    ) -> Result<DriveFile, DriveError> {
        let mime = mime_type_for(remote_name);
        let metadata = FileMetadata {
            name: remote_name.to_string(),
            parents: vec![folder_id.to_string()],
            mime_type: None,
        };

        let mut url = self.upload_base.join("files").expect("valid files path");
        url.query_pairs_mut()
            .append_pair("uploadType", "resumable")
            .append_pair("fields", "id, webViewLink");

        let response = send_with_retry(|| {
            self.http
                .post(url.clone())
                .bearer_auth(token)
                .header("X-Upload-Content-Type", mime)
                .json(&metadata)
        })
        .await?;

        let session_uri = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(DriveError::NoSessionUri)?;

        let (body, content_length) = file_body(local_path).await?;
        debug!(
            "streaming {} bytes to upload session for {}",
            content_length, remote_name
        );

        let response = self
            .http
            .put(&session_uri)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, mime)
            .header(header::CONTENT_LENGTH, content_length)
            .timeout(Duration::from_secs(MEDIA_UPLOAD_TIMEOUT_SECS))
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DriveError::from_response(response).await);
        }

        Ok(response.json().await?)
    }

    /// Grant anyone-with-the-link read access to a file.
    pub async fn share_public(&self, token: &str, file_id: &str) -> Result<(), DriveError> {
        let url = self
            .base
            .join(&format!("files/{}/permissions", file_id))
            .expect("valid permissions path");
        let permission = PermissionRequest::anyone_reader();

        let response = send_with_retry(|| {
            self.http
                .post(url.clone())
                .bearer_auth(token)
                .json(&permission)
        })
        .await?;

        let _ = response.bytes().await;
        Ok(())
    }

    /// First non-trashed file in the folder whose name contains the fragment.
    pub async fn find_in_folder(
        &self,
        token: &str,
        name_fragment: &str,
        folder_id: &str,
    ) -> Result<Option<DriveFile>, DriveError> {
        let query = format!(
            "name contains '{}' and '{}' in parents and trashed = false",
            escape_query(name_fragment),
            escape_query(folder_id)
        );

        let url = self.files_url();
        let response = send_with_retry(|| {
            self.http.get(url.clone()).bearer_auth(token).query(&[
                ("q", query.as_str()),
                ("fields", "files(id, name, webViewLink)"),
            ])
        })
        .await?;

        let list: FileList = response.json().await?;
        Ok(list.files.into_iter().next())
    }

    fn files_url(&self) -> Url {
        self.base.join("files").expect("valid files path")
    }
}

/// Streamed request body for a local file, with its length.
async fn file_body(path: &Path) -> Result<(reqwest::Body, u64), std::io::Error> {
    let file = tokio::fs::File::open(path).await?;
    let content_length = file.metadata().await?.len();

    let stream = futures_util::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            Ok::<_, std::io::Error>(None)
        } else {
            buf.truncate(n);
            Ok(Some((buf, file)))
        }
    });

    Ok((reqwest::Body::wrap_stream(stream), content_length))
}
