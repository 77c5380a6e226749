//! The development server.
//!
//! An axum router wiring the bundle/map endpoints, the HMR WebSocket, the
//! symbolication endpoint, asset and raw-source serving, and the small
//! control endpoints mobile clients poke at. File-change notifications from
//! the watcher drive the delta pipeline and fan out protocol frames to
//! connected clients.

pub mod bundle;
pub mod hot;
pub mod multipart;
pub mod state;
pub mod symbolicate;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{CliError, Result};
use crate::server::bundle::plain_response;
use crate::server::state::SharedState;
use crate::watcher::FileChange;

/// Build the router over shared state.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/reload", post(handle_reload))
        .route("/devmenu", post(handle_devmenu))
        .route("/open-url", post(handle_open_url))
        .route("/symbolicate", post(symbolicate::handle_symbolicate))
        .route("/hot", get(hot::handle_hot_upgrade))
        .route("/assets/{*path}", get(handle_asset))
        .route("/node_modules/{*path}", get(handle_node_modules))
        .route("/[project]/{*path}", get(handle_project_source))
        .route("/[watch-folders]/{*path}", get(handle_watch_folder_source))
        .fallback(bundle::handle_bundle_request)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// How long in-flight responses may drain after the shutdown signal.
const SHUTDOWN_DRAIN: std::time::Duration = std::time::Duration::from_secs(10);

/// Serve until shutdown. Ctrl-c stops accepting connections; in-flight
/// responses get a bounded drain window before the server gives up on them.
pub async fn serve(state: SharedState, addr: SocketAddr) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::Server(format!("failed to bind {addr}: {e}")))?;
    tracing::info!("dev server listening on http://{addr}");

    let shutdown = std::sync::Arc::new(tokio::sync::Notify::new());
    let signal_notify = std::sync::Arc::clone(&shutdown);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
        signal_notify.notify_waiters();
    });

    let graceful_notify = std::sync::Arc::clone(&shutdown);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful_notify.notified().await });

    tokio::select! {
        result = server => result.map_err(|e| CliError::Server(e.to_string()))?,
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(SHUTDOWN_DRAIN).await;
        } => {
            tracing::warn!("drain window elapsed; dropping remaining connections");
        }
    }
    Ok(())
}

/// Drain watcher events: invalidate session caches, run the delta pipeline,
/// and broadcast the resulting update sequences.
pub async fn pump_file_changes(
    state: SharedState,
    mut rx: tokio::sync::mpsc::Receiver<FileChange>,
) {
    while let Some(change) = rx.recv().await {
        let mut changed = vec![change.path().to_path_buf()];
        // Collapse whatever else is already queued into one delta round.
        while let Ok(change) = rx.try_recv() {
            let path = change.path().to_path_buf();
            if !changed.contains(&path) {
                changed.push(path);
            }
        }
        tracing::debug!(count = changed.len(), "applying file changes");

        let apply_state = state.clone();
        let changed_for_apply = changed.clone();
        let updates = tokio::task::spawn_blocking(move || {
            apply_state.apply_file_changes_sync(&changed_for_apply)
        })
        .await
        .unwrap_or_default();

        for update in updates {
            hot::broadcast_update(&state, update);
        }
    }
}

// -- control endpoints --

async fn handle_status() -> Response {
    plain_response(StatusCode::OK, "text/plain", "packager-status:running")
}

async fn handle_reload(State(state): State<SharedState>) -> Response {
    state.broadcast_raw(&serde_json::json!({"type": "reload"}).to_string());
    plain_response(StatusCode::OK, "text/plain", "OK")
}

async fn handle_devmenu(State(state): State<SharedState>) -> Response {
    state.broadcast_raw(&serde_json::json!({"type": "devMenu"}).to_string());
    plain_response(StatusCode::OK, "text/plain", "OK")
}

#[derive(Debug, serde::Deserialize)]
struct OpenUrlRequest {
    url: String,
}

async fn handle_open_url(
    State(state): State<SharedState>,
    Json(request): Json<OpenUrlRequest>,
) -> Response {
    state.broadcast_raw(
        &serde_json::json!({"type": "open-url", "url": request.url}).to_string(),
    );
    plain_response(StatusCode::OK, "text/plain", "OK")
}

// -- static serving --

async fn handle_asset(
    State(state): State<SharedState>,
    AxumPath(path): AxumPath<String>,
) -> Response {
    serve_file(&state.config.root, &path, true).await
}

async fn handle_node_modules(
    State(state): State<SharedState>,
    AxumPath(path): AxumPath<String>,
) -> Response {
    serve_file(&state.config.root.join("node_modules"), &path, true).await
}

async fn handle_project_source(
    State(state): State<SharedState>,
    AxumPath(path): AxumPath<String>,
) -> Response {
    serve_file(&state.config.root, &path, false).await
}

/// `/[watch-folders]/<N>/rest` serves from the N-th configured watch folder.
async fn handle_watch_folder_source(
    State(state): State<SharedState>,
    AxumPath(path): AxumPath<String>,
) -> Response {
    let Some((index, rest)) = path.split_once('/') else {
        return plain_response(StatusCode::NOT_FOUND, "text/plain", "Not found");
    };
    let Ok(index) = index.parse::<usize>() else {
        return plain_response(StatusCode::NOT_FOUND, "text/plain", "Not found");
    };
    let Some(folder) = state.config.watch_folders.get(index).cloned() else {
        return plain_response(StatusCode::NOT_FOUND, "text/plain", "Not found");
    };
    let folder = state.config.absolute(&folder);
    serve_file(&folder, rest, false).await
}

/// Read a file under `root`, rejecting traversal outside of it. Assets get
/// long-term caching; raw sources are served uncached for DevTools.
async fn serve_file(root: &Path, relative: &str, long_term_cache: bool) -> Response {
    let Some(full) = safe_join(root, relative) else {
        return plain_response(StatusCode::FORBIDDEN, "text/plain", "Forbidden");
    };
    match tokio::fs::read(&full).await {
        Ok(bytes) => {
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type_for(&full));
            if long_term_cache {
                builder = builder.header(header::CACHE_CONTROL, "public, max-age=31536000");
            }
            builder
                .body(Body::from(bytes))
                .expect("static response parts are valid")
        }
        Err(_) => plain_response(StatusCode::NOT_FOUND, "text/plain", "Not found"),
    }
}

/// Lexically join, rejecting `..` components so requests stay under `root`.
fn safe_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let has_traversal = relative
        .split(['/', '\\'])
        .any(|component| component == "..");
    if has_traversal {
        return None;
    }
    Some(root.join(relative))
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => "application/javascript; charset=UTF-8",
        "json" | "map" => "application/json; charset=UTF-8",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_join_blocks_traversal() {
        let root = Path::new("/project");
        assert!(safe_join(root, "img/logo.png").is_some());
        assert!(safe_join(root, "../etc/passwd").is_none());
        assert!(safe_join(root, "img/../../etc/passwd").is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(
            content_type_for(Path::new("/a/b.js")),
            "application/javascript; charset=UTF-8"
        );
        assert_eq!(content_type_for(Path::new("/a/b.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("/a/b.unknown")),
            "application/octet-stream"
        );
    }
}
