//! Polling endpoint for the latest upload.
//!
//! A single JSON route, CORS-open so a page on any origin can poll it. The
//! payload shape tells the caller which phase the pipeline is in: an empty
//! object before anything was detected, a loading marker while an upload is
//! in flight, and the link or the failure kind once a task finished.

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::UploadErrorKind;
use crate::pipeline::{LatestUpload, SharedLatest};

/// Wire shape of `/latest_upload.json`. Absent fields are omitted, so the
/// idle state serializes to `{}`.
#[derive(Debug, Default, Serialize)]
pub struct StatusBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "viewLink", skip_serializing_if = "Option::is_none")]
    pub view_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(rename = "errorKind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<UploadErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl From<&LatestUpload> for StatusBody {
    fn from(latest: &LatestUpload) -> Self {
        match latest {
            LatestUpload::Idle => StatusBody::default(),
            LatestUpload::Loading { since } => StatusBody {
                loading: Some(true),
                timestamp: Some(since.to_rfc3339()),
                ..Default::default()
            },
            LatestUpload::Done(result) if result.success => StatusBody {
                link: result.download_link.clone(),
                view_link: result.view_link.clone(),
                timestamp: Some(result.timestamp.to_rfc3339()),
                ..Default::default()
            },
            LatestUpload::Done(result) => StatusBody {
                success: Some(false),
                error_kind: result.error_kind,
                timestamp: Some(result.timestamp.to_rfc3339()),
                ..Default::default()
            },
        }
    }
}

pub fn router(latest: SharedLatest) -> Router {
    Router::new()
        .route("/latest_upload.json", get(latest_upload))
        .layer(CorsLayer::permissive())
        .with_state(latest)
}

async fn latest_upload(State(latest): State<SharedLatest>) -> Json<StatusBody> {
    let snapshot = latest.read().await.clone();
    Json(StatusBody::from(&snapshot))
}

/// Serve the status endpoint on the loopback interface until shutdown.
pub async fn serve(
    latest: SharedLatest,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding the status endpoint on {addr}"))?;

    info!("status endpoint listening on http://{addr}/latest_upload.json");
    axum::serve(listener, router(latest))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .context("status endpoint server")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{shared_latest, UploadResult};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    async fn get_status(latest: SharedLatest) -> (StatusCode, serde_json::Value) {
        let response = router(latest)
            .oneshot(
                Request::builder()
                    .uri("/latest_upload.json")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let allow_origin = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned();
        assert_eq!(allow_origin.unwrap(), "*");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_idle_is_an_empty_object() {
        let (status, json) = get_status(shared_latest()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_loading_marker() {
        let latest = shared_latest();
        *latest.write().await = LatestUpload::Loading { since: Utc::now() };

        let (status, json) = get_status(latest).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["loading"], serde_json::json!(true));
        assert!(json.get("timestamp").is_some());
        assert!(json.get("link").is_none());
    }

    #[tokio::test]
    async fn test_published_payload_has_link_only() {
        let latest = shared_latest();
        *latest.write().await = LatestUpload::Done(UploadResult::published(
            "https://drive.google.com/uc?export=download&id=abc&confirm=t".to_string(),
            Some("https://drive.google.com/file/d/abc/view".to_string()),
            "abc".to_string(),
        ));

        let (status, json) = get_status(latest).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["link"],
            serde_json::json!("https://drive.google.com/uc?export=download&id=abc&confirm=t")
        );
        assert!(json.get("loading").is_none());
        assert!(json.get("success").is_none());
        assert!(json.get("errorKind").is_none());
    }

    #[tokio::test]
    async fn test_failure_payload_names_the_kind() {
        let latest = shared_latest();
        *latest.write().await =
            LatestUpload::Done(UploadResult::failed(UploadErrorKind::FilesystemRace));

        let (status, json) = get_status(latest).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], serde_json::json!(false));
        assert_eq!(json["errorKind"], serde_json::json!("filesystem_race"));
        assert!(json.get("link").is_none());
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let response = router(shared_latest())
            .oneshot(
                Request::builder()
                    .uri("/something_else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
