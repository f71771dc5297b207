//! HTTP routes
//!
//! `/` serves the landing page, `/stream` and `/stream.mp3` attach a new
//! listener session, and `/stats` reports the hub counters as JSON.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::hub::BroadcastHub;
use crate::server::config::ServerConfig;

const LANDING_PAGE: &str = include_str!("../../assets/index.html");

#[derive(Clone)]
struct AppState {
    hub: Arc<BroadcastHub>,
    pipe_capacity: usize,
    content_type: &'static str,
}

pub(crate) fn router(config: &ServerConfig, hub: Arc<BroadcastHub>) -> Router {
    let state = AppState {
        hub,
        pipe_capacity: config.pipe_capacity,
        content_type: config.content_type,
    };

    let router = Router::new()
        .route("/stream", get(handle_stream))
        .route("/stream.mp3", get(handle_stream))
        .route("/stats", get(handle_stats));

    let router = match config.landing_page {
        Some(ref path) => router.route_service("/", ServeFile::new(path)),
        None => router.route("/", get(handle_landing)),
    };

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn handle_landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// One listener: register, drain into a pipe, stream the pipe out
async fn handle_stream(State(state): State<AppState>) -> Response {
    let handle = match state.hub.register() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Stream request rejected");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    let session_id = handle.id();
    let guard = handle.close_guard();
    let (writer, reader) = tokio::io::duplex(state.pipe_capacity);

    tokio::spawn(handle.drain(writer));

    // The guard lives as long as the body; hyper drops the body on disconnect
    let stream = ReaderStream::new(reader).map(move |chunk| {
        let _guard = &guard;
        chunk
    });

    tracing::debug!(session_id = %session_id, "Streaming to listener");

    (
        [
            (header::CONTENT_TYPE, state.content_type),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn handle_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.stats())
}
