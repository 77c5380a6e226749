//! Bundle and source-map endpoints.
//!
//! `GET /<name>.bundle[.js]` serves the serialized bundle for the requested
//! configuration tuple; with `Accept: multipart/mixed` the response streams
//! JSON progress parts while the build runs and finishes with the bundle
//! part carrying the delta headers. `GET /<name>.map` serves the composed
//! map for the same tuple.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;

use bungae_bundler::inline_map_comment;
use bungae_config::{BundleParams, Platform, SourcePathMode};

use crate::error::{CliError, Result};
use crate::server::multipart;
use crate::server::state::SharedState;

/// Raw query parameters of a bundle request. Values arrive as strings
/// (`dev=true`), matching what mobile clients send.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleQuery {
    pub platform: Option<String>,
    pub dev: Option<String>,
    pub minify: Option<String>,
    pub exclude_source: Option<String>,
    pub modules_only: Option<String>,
    pub run_module: Option<String>,
    pub inline_source_map: Option<String>,
    pub source_paths: Option<String>,
}

impl BundleQuery {
    pub fn to_params(&self) -> Result<BundleParams> {
        let platform: Platform = self
            .platform
            .as_deref()
            .unwrap_or("ios")
            .parse()
            .map_err(|e: bungae_config::ConfigError| CliError::InvalidArgument(e.to_string()))?;
        let source_paths = match self.source_paths.as_deref() {
            Some(raw) => raw
                .parse::<SourcePathMode>()
                .map_err(|e| CliError::InvalidArgument(e.to_string()))?,
            None => SourcePathMode::default(),
        };
        Ok(BundleParams {
            platform,
            dev: parse_bool(self.dev.as_deref(), true)?,
            minify: parse_bool(self.minify.as_deref(), false)?,
            source_paths,
            run_module: parse_bool(self.run_module.as_deref(), true)?,
            modules_only: parse_bool(self.modules_only.as_deref(), false)?,
            exclude_source: parse_bool(self.exclude_source.as_deref(), false)?,
        })
    }

    pub fn wants_inline_source_map(&self) -> bool {
        matches!(self.inline_source_map.as_deref(), Some("true") | Some("1"))
    }
}

fn parse_bool(raw: Option<&str>, default: bool) -> Result<bool> {
    match raw {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(CliError::InvalidArgument(format!(
            "expected a boolean, received \"{other}\""
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleRequestKind {
    Bundle,
    Map,
}

/// Classify a request path as a bundle or map request and extract the entry
/// name (`/src/main.bundle` -> `src/main`).
pub fn parse_bundle_path(path: &str) -> Option<(String, BundleRequestKind)> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if let Some(name) = trimmed.strip_suffix(".bundle.js") {
        return Some((name.to_string(), BundleRequestKind::Bundle));
    }
    if let Some(name) = trimmed.strip_suffix(".bundle") {
        return Some((name.to_string(), BundleRequestKind::Bundle));
    }
    if let Some(name) = trimmed.strip_suffix(".map") {
        let name = name.strip_suffix(".bundle").unwrap_or(name);
        return Some((name.to_string(), BundleRequestKind::Map));
    }
    None
}

/// Fallback handler covering bundle and map paths.
pub async fn handle_bundle_request(
    State(state): State<SharedState>,
    Query(query): Query<BundleQuery>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let Some((name, kind)) = parse_bundle_path(uri.path()) else {
        return plain_response(StatusCode::NOT_FOUND, "text/plain", "Not found");
    };
    let params = match query.to_params() {
        Ok(params) => params,
        Err(err) => return plain_response(StatusCode::BAD_REQUEST, "text/plain", &err.to_string()),
    };
    let entry = match state.resolve_entry(&name, &params) {
        Ok(entry) => entry,
        Err(err) => return build_error_response(&err),
    };

    match kind {
        BundleRequestKind::Map => {
            let outcome = match run_build(&state, params, entry, None).await {
                Ok(outcome) => outcome,
                Err(err) => return build_error_response(&err),
            };
            plain_response(
                StatusCode::OK,
                "application/json; charset=UTF-8",
                &outcome.map_json,
            )
        }
        BundleRequestKind::Bundle => {
            let wants_multipart = headers
                .get(header::ACCEPT)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|accept| accept.contains("multipart/mixed"));
            let raw_query = uri.query().unwrap_or("").to_string();
            if wants_multipart {
                multipart_bundle_response(state, params, entry, name, raw_query, query).await
            } else {
                let outcome = match run_build(&state, params, entry, None).await {
                    Ok(outcome) => outcome,
                    Err(err) => return build_error_response(&err),
                };
                let code = decorate_bundle(&outcome.code, &outcome.map_json, &name, &raw_query, &query);
                plain_response(StatusCode::OK, "application/javascript; charset=UTF-8", &code)
            }
        }
    }
}

async fn run_build(
    state: &SharedState,
    params: BundleParams,
    entry: std::path::PathBuf,
    progress: Option<mpsc::UnboundedSender<crate::server::state::ProgressTick>>,
) -> Result<crate::server::state::BuildOutcome> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.build_bundle_sync(params, &entry, progress))
        .await
        .map_err(|e| CliError::Server(format!("build task failed: {e}")))?
}

async fn multipart_bundle_response(
    state: SharedState,
    params: BundleParams,
    entry: std::path::PathBuf,
    name: String,
    raw_query: String,
    query: BundleQuery,
) -> Response {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let build_state = state.clone();
    let build_entry = entry.clone();
    let build_task = tokio::task::spawn_blocking(move || {
        build_state.build_bundle_sync(params, &build_entry, Some(tx))
    });

    let stream = async_stream::stream! {
        while let Some(tick) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(Bytes::from(multipart::progress_part(
                tick.done, tick.total,
            )));
        }
        match build_task.await {
            Ok(Ok(outcome)) => {
                let code =
                    decorate_bundle(&outcome.code, &outcome.map_json, &name, &raw_query, &query);
                yield Ok(Bytes::from(multipart::bundle_part(
                    &code,
                    outcome.files_changed,
                    &outcome.revision_hex,
                )));
            }
            Ok(Err(err)) => {
                tracing::error!(%err, "bundle build failed");
                let body = serde_json::json!({
                    "type": "error",
                    "message": err.to_string(),
                })
                .to_string();
                yield Ok(Bytes::from(multipart::part(
                    &[("Content-Type", "application/json".to_string())],
                    &body,
                )));
            }
            Err(join_err) => {
                tracing::error!(%join_err, "bundle build task panicked");
            }
        }
        yield Ok(Bytes::from(multipart::terminator()));
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, multipart::content_type())
        .body(Body::from_stream(stream))
        .expect("static response parts are valid")
}

/// Append map/source URL comments to cached bundle bytes for delivery.
fn decorate_bundle(
    code: &str,
    map_json: &str,
    name: &str,
    raw_query: &str,
    query: &BundleQuery,
) -> String {
    let mut out = code.to_string();
    if query.wants_inline_source_map() {
        out.push('\n');
        out.push_str(&inline_map_comment(map_json));
    } else {
        let suffix = if raw_query.is_empty() {
            String::new()
        } else {
            format!("?{raw_query}")
        };
        out.push('\n');
        out.push_str(&format!("//# sourceMappingURL=/{name}.map{suffix}"));
        out.push('\n');
        out.push_str(&format!("//# sourceURL=/{name}.bundle{suffix}"));
    }
    out
}

/// Builder failures surface as 500s with a JavaScript comment body.
pub fn build_error_response(err: &CliError) -> Response {
    let message = err.to_string().replace('\n', " ");
    plain_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "application/javascript; charset=UTF-8",
        &format!("// Build failed: {message}\n"),
    )
}

pub fn plain_response(status: StatusCode, content_type: &str, body: &str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .expect("static response parts are valid")
}
