//! Google Drive v3 API surface used by the upload pipeline.

mod client;
mod http;
mod types;

pub use client::{direct_download_link, folder_link, mime_type_for, DriveClient};
pub use types::{DriveError, DriveFile, RemoteFolder};
