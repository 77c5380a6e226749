//! The `POST /symbolicate` endpoint.
//!
//! Receives a stack of bundle-coordinate frames, locates the owning session
//! by parsing the bundle URL's query parameters, and maps each frame back to
//! original source coordinates through the session's cached bundle map. A
//! code frame around the first resolved position is attached when the source
//! file is readable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use bungae_bundler::{code_frame, symbolicate_frame, CodeFrame, StackFrame};
use bungae_config::BundleParams;

use crate::server::bundle::{plain_response, BundleQuery};
use crate::server::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct SymbolicateRequest {
    #[serde(default)]
    pub stack: Vec<StackFrame>,
    #[serde(default, rename = "extraData")]
    pub extra_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SymbolicateResponse {
    pub stack: Vec<StackFrame>,
    #[serde(rename = "codeFrame")]
    pub code_frame: Option<CodeFrame>,
}

pub async fn handle_symbolicate(
    State(state): State<SharedState>,
    Json(request): Json<SymbolicateRequest>,
) -> Response {
    if let Some(extra) = &request.extra_data {
        tracing::debug!(?extra, "symbolicate extra data");
    }
    let mut resolved_stack = Vec::with_capacity(request.stack.len());
    let mut frame_slice: Option<CodeFrame> = None;

    for frame in &request.stack {
        let resolved = symbolicate_one(&state, frame).await;
        if frame_slice.is_none() {
            if let Some(resolved) = &resolved {
                if let (Some(file), Some(line)) = (&resolved.file, resolved.line_number) {
                    frame_slice =
                        code_frame(std::path::Path::new(file), line, resolved.column.unwrap_or(0));
                }
            }
        }
        resolved_stack.push(resolved.unwrap_or_else(|| frame.clone()));
    }

    match serde_json::to_string(&SymbolicateResponse {
        stack: resolved_stack,
        code_frame: frame_slice,
    }) {
        Ok(body) => plain_response(StatusCode::OK, "application/json; charset=UTF-8", &body),
        Err(err) => plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            &err.to_string(),
        ),
    }
}

/// Resolve one frame, or `None` to pass it through unchanged (non-bundle
/// files, sessions that have not built yet, unmapped positions).
async fn symbolicate_one(state: &SharedState, frame: &StackFrame) -> Option<StackFrame> {
    let file = frame.file.as_deref()?;
    let params = session_params_from_frame_url(file)?;

    let session_arc = state.session(params);
    let map_json = {
        let session = session_arc.lock().await;
        session.cached.as_ref()?.map_json.clone()
    };
    let consumer = state.consumer(params, &map_json).ok()?;
    let resolved = symbolicate_frame(&consumer, frame, &state.config);
    // Lookup misses return the frame unchanged; treat that as a pass-through
    // so the bundle URL stays visible.
    if resolved.file == frame.file {
        None
    } else {
        Some(resolved)
    }
}

/// Extract the session tuple from a frame's bundle URL.
pub fn session_params_from_frame_url(file: &str) -> Option<BundleParams> {
    if !file.contains(".bundle") {
        return None;
    }
    let parsed = url::Url::parse(file).ok()?;
    let mut query = BundleQuery::default();
    for (key, value) in parsed.query_pairs() {
        let value = value.into_owned();
        match key.as_ref() {
            "platform" => query.platform = Some(value),
            "dev" => query.dev = Some(value),
            "minify" => query.minify = Some(value),
            "excludeSource" => query.exclude_source = Some(value),
            "modulesOnly" => query.modules_only = Some(value),
            "runModule" => query.run_module = Some(value),
            "sourcePaths" => query.source_paths = Some(value),
            _ => {}
        }
    }
    query.to_params().ok()
}
