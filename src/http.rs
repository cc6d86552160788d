//! HTTP/WebSocket front end: serves the static viewer bundle and
//! upgrades `/ws` with a 60s idle timeout. Static assets come from either
//! the embedded bundle (`embed-ui` feature, the default) or a filesystem
//! directory in development mode (`-web <dir>`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use jgd_hub::{Hub, Outbound};
use tracing::debug;

/// Idle timeout for a viewer WebSocket connection.
const WS_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg(feature = "embed-ui")]
#[derive(rust_embed::Embed)]
#[folder = "web/"]
struct EmbeddedUi;

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub verbose: bool,
    pub web_dir: Option<PathBuf>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .fallback(serve_static)
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer_socket(socket, state))
}

/// Per-WebSocket viewer loop: drains the Hub's outbound channel for
/// this client while dispatching inbound text frames by message type.
/// Non-text frames are ignored; the connection is dropped after
/// `WS_IDLE_TIMEOUT` with no inbound activity.
async fn handle_viewer_socket(mut socket: WebSocket, state: AppState) {
    let (client_id, mut rx) = state.hub.register_client().await;

    loop {
        tokio::select! {
            biased;
            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Line(line)) => {
                        if socket.send(Message::Text(line.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            incoming = tokio::time::timeout(WS_IDLE_TIMEOUT, socket.recv()) => {
                match incoming {
                    Ok(Some(Ok(Message::Text(text)))) => dispatch_viewer_message(&state, &text).await,
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(_))) => break,
                    Err(_) => break,
                }
            }
        }
    }

    state.hub.unregister_client(client_id).await;
}

async fn dispatch_viewer_message(state: &AppState, text: &str) {
    let message_type = jgd_protocol::wire::Frame::parse(text)
        .ok()
        .and_then(|frame| frame.message_type().map(str::to_owned));

    match message_type.as_deref() {
        Some("resize") => state.hub.handle_resize(text).await,
        Some("metrics_response") => state.hub.handle_metrics_response(text).await,
        Some(other) => {
            if state.verbose {
                tracing::info!(kind = other, "unknown viewer message type, dropping");
            } else {
                debug!(kind = other, "unknown viewer message type, dropping");
            }
        }
        None => debug!("viewer message missing type field or invalid json, dropping"),
    }
}

async fn serve_static(State(state): State<AppState>, uri: Uri) -> Response {
    match &state.web_dir {
        Some(dir) => serve_from_directory(dir, uri.path()),
        None => serve_embedded(uri.path()),
    }
}

#[cfg(feature = "embed-ui")]
fn serve_embedded(raw_path: &str) -> Response {
    let path = raw_path.trim_start_matches('/');
    if let Some(file) = EmbeddedUi::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return (StatusCode::OK, [(header::CONTENT_TYPE, mime.as_ref())], Bytes::from(file.data.into_owned()))
            .into_response();
    }
    if Path::new(path).extension().is_none() {
        if let Some(index) = EmbeddedUi::get("index.html") {
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html")],
                Bytes::from(index.data.into_owned()),
            )
                .into_response();
        }
    }
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(not(feature = "embed-ui"))]
fn serve_embedded(_raw_path: &str) -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// Development-mode asset serving from a filesystem directory. The joined
/// path is normalized lexically and must land exactly on `dir` or one of
/// its descendants — anything else (`..`, absolute-looking segments) is a
/// traversal attempt and gets 403, not 404.
fn serve_from_directory(dir: &Path, raw_path: &str) -> Response {
    let joined = match resolve_within(dir, raw_path) {
        Ok(path) => path,
        Err(()) => return StatusCode::FORBIDDEN.into_response(),
    };

    let candidate = if joined.is_dir() {
        joined.join("index.html")
    } else {
        joined
    };

    match std::fs::read(&candidate) {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&candidate).first_or_octet_stream();
            (StatusCode::OK, [(header::CONTENT_TYPE, mime.as_ref())], bytes).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn resolve_within(base: &Path, request_path: &str) -> Result<PathBuf, ()> {
    let relative = request_path.trim_start_matches('/');
    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            std::path::Component::Normal(part) => normalized.push(part),
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir | std::path::Component::RootDir | std::path::Component::Prefix(_) => {
                return Err(());
            }
        }
    }
    let joined = base.join(&normalized);
    let base_with_sep = format!("{}/", base.to_string_lossy());
    if joined == base || joined.to_string_lossy().starts_with(&base_with_sep) {
        Ok(joined)
    } else {
        Err(())
    }
}
