// Copyright (c) 2026 Truthcrawl
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Peer-facing HTTP API.
//!
//! A dumb transport: every body is the canonical bytes already on disk.
//!
//! - `GET /info`                      node descriptor
//! - `GET /batches`                   one batch id per line
//! - `GET /batches/:id/manifest`      raw canonical bytes
//! - `GET /batches/:id/chain-link`    raw canonical bytes
//! - `GET /batches/:id/signature`     raw canonical bytes
//! - `GET /records/:hash`             canonical full observation record
//! - `GET /metrics`                   Prometheus text format
//!
//! Request signatures (`X-Node-Id` / `X-Timestamp` / `X-Signature`) are
//! advisory peer identity; the server logs them and serves regardless.

use crate::core::batch::is_valid_batch_id;
use crate::core::codec::is_hex32;
use crate::core::publish::BatchPublisher;
use crate::core::store::RecordStore;
use crate::monitoring::metrics::Metrics;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state behind the API handlers.
pub struct ApiState {
    /// This node's id (key fingerprint).
    pub node_id: String,
    /// Record store (read side).
    pub store: RecordStore,
    /// Published batches directory.
    pub batches_dir: PathBuf,
    /// Metrics registry.
    pub metrics: Arc<Metrics>,
}

/// Build the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/info", get(info_handler))
        .route("/batches", get(batches_handler))
        .route("/batches/:id/manifest", get(manifest_handler))
        .route("/batches/:id/chain-link", get(chain_link_handler))
        .route("/batches/:id/signature", get(signature_handler))
        .route("/records/:hash", get(record_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Bind and serve the API until the daemon shuts down.
pub async fn serve(state: Arc<ApiState>, port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "api listening");
    axum::serve(listener, router(state)).await
}

fn note_request(state: &ApiState, headers: &HeaderMap, path: &str) {
    state.metrics.http_requests_total.inc();
    if let Some(peer) = headers.get("x-node-id").and_then(|v| v.to_str().ok()) {
        debug!(peer = %peer, path = %path, "signed peer request");
    }
}

type TextResponse = (StatusCode, String);

fn ok(body: String) -> TextResponse {
    (StatusCode::OK, body)
}

fn not_found() -> TextResponse {
    (StatusCode::NOT_FOUND, String::new())
}

fn bad_request() -> TextResponse {
    (StatusCode::BAD_REQUEST, String::new())
}

async fn info_handler(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> TextResponse {
    note_request(&state, &headers, "/info");
    let records = state.store.size().unwrap_or(0);
    let batches = BatchPublisher::new(&state.batches_dir)
        .list_batch_ids()
        .map(|ids| ids.len())
        .unwrap_or(0);
    ok(format!(
        "node_id:{}\nversion:{}\nrecords:{records}\nbatches:{batches}\n",
        state.node_id,
        env!("CARGO_PKG_VERSION"),
    ))
}

async fn batches_handler(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> TextResponse {
    note_request(&state, &headers, "/batches");
    match BatchPublisher::new(&state.batches_dir).list_batch_ids() {
        Ok(ids) => {
            let mut body = String::new();
            for id in ids {
                body.push_str(&id);
                body.push('\n');
            }
            ok(body)
        }
        Err(_) => not_found(),
    }
}

async fn batch_file(state: &ApiState, id: &str, file: &str) -> TextResponse {
    if !is_valid_batch_id(id) {
        return bad_request();
    }
    let path = state.batches_dir.join(format!("batch-{id}")).join(file);
    match tokio::fs::read_to_string(path).await {
        Ok(body) => ok(body),
        Err(_) => not_found(),
    }
}

async fn manifest_handler(
    State(state): State<Arc<ApiState>>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
) -> TextResponse {
    note_request(&state, &headers, "/batches/manifest");
    batch_file(&state, &id, "manifest.txt").await
}

async fn chain_link_handler(
    State(state): State<Arc<ApiState>>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
) -> TextResponse {
    note_request(&state, &headers, "/batches/chain-link");
    batch_file(&state, &id, "chain-link.txt").await
}

async fn signature_handler(
    State(state): State<Arc<ApiState>>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
) -> TextResponse {
    note_request(&state, &headers, "/batches/signature");
    batch_file(&state, &id, "signature.txt").await
}

async fn record_handler(
    State(state): State<Arc<ApiState>>,
    UrlPath(hash): UrlPath<String>,
    headers: HeaderMap,
) -> TextResponse {
    note_request(&state, &headers, "/records");
    if !is_hex32(&hash) {
        return bad_request();
    }
    match state.store.load(&hash) {
        Ok(Some(record)) => ok(record.full_text()),
        _ => not_found(),
    }
}

async fn metrics_handler(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> TextResponse {
    note_request(&state, &headers, "/metrics");
    match state.metrics.render() {
        Ok(body) => ok(body),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
    }
}
