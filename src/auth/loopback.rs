//! Loopback listener for the OAuth authorization code.
//!
//! Serves exactly one successful callback request. Requests on other paths
//! get the router's 404, and a callback without a `code` parameter gets a
//! 400 while the listener keeps waiting for the browser to come back with
//! a real code.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

const CONSENT_PAGE: &str = "<html><head><title>Authorization complete</title></head>\
<body><h2>Authorization complete</h2>\
<p>You can close this tab and return to the terminal.</p></body></html>";

struct CallbackState {
    code: Mutex<Option<String>>,
    done: Mutex<Option<oneshot::Sender<()>>>,
}

/// Serve `listener` until one request on `callback_path` carries a `code`
/// query parameter, then shut down and return the code.
pub async fn capture_code(listener: TcpListener, callback_path: &str) -> std::io::Result<String> {
    let (done_tx, done_rx) = oneshot::channel();
    let state = Arc::new(CallbackState {
        code: Mutex::new(None),
        done: Mutex::new(Some(done_tx)),
    });

    let app = Router::new()
        .route(callback_path, get(callback))
        .with_state(state.clone());

    debug!("waiting for the OAuth callback on {}", callback_path);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = done_rx.await;
        })
        .await?;

    let code = state.code.lock().await.take();
    code.ok_or_else(|| {
        std::io::Error::other("consent listener closed before a code arrived")
    })
}

async fn callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        if let Some(error) = params.get("error") {
            warn!("authorization was refused: {}", error);
        }
        return StatusCode::BAD_REQUEST.into_response();
    };

    *state.code.lock().await = Some(code.clone());
    if let Some(done) = state.done.lock().await.take() {
        let _ = done.send(());
    }

    Html(CONSENT_PAGE).into_response()
}
