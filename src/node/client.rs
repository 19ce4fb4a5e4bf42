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

//! Signed HTTP client for peer APIs.
//!
//! Requests carry advisory identity headers: `X-Node-Id`, `X-Timestamp`,
//! and `X-Signature`, where the signature covers
//! `METHOD " " PATH " " TIMESTAMP` under the node key.

use crate::core::codec::{decode_base64, encode_base64, format_timestamp, now_utc};
use crate::core::crypto::{self, NodeKey, PUBLIC_KEY_LEN};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Peer-client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Client construction failed.
    #[error("client build")]
    Build,
    /// Request failed or timed out.
    #[error("request failed: {0}")]
    Request(String),
    /// Peer answered with a non-success status.
    #[error("peer returned status {0}")]
    Status(u16),
}

/// Signs `(method, path, timestamp)` triples with the node key.
#[derive(Clone)]
pub struct RequestSigner {
    key: Arc<NodeKey>,
}

impl RequestSigner {
    /// Signer over `key`.
    pub fn new(key: Arc<NodeKey>) -> Self {
        Self { key }
    }

    /// This node's id.
    pub fn node_id(&self) -> String {
        self.key.fingerprint()
    }

    /// The signed payload for a request.
    pub fn payload(method: &str, path: &str, timestamp: &str) -> String {
        format!("{method} {path} {timestamp}")
    }

    /// Sign a request, returning the Base64 signature.
    pub fn sign(&self, method: &str, path: &str, timestamp: &str) -> String {
        encode_base64(&self.key.sign(Self::payload(method, path, timestamp).as_bytes()))
    }

    /// Verify a request signature under a peer's public key.
    pub fn verify(
        public_key: &[u8; PUBLIC_KEY_LEN],
        method: &str,
        path: &str,
        timestamp: &str,
        signature_b64: &str,
    ) -> bool {
        let Ok(sig) = decode_base64(signature_b64) else {
            return false;
        };
        crypto::verify(public_key, Self::payload(method, path, timestamp).as_bytes(), &sig).is_ok()
    }
}

/// HTTP client for peer APIs, 30-second request timeout.
pub struct PeerClient {
    http: reqwest::Client,
    signer: RequestSigner,
}

impl PeerClient {
    /// Client signing as `key`.
    pub fn new(key: Arc<NodeKey>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|_| ClientError::Build)?;
        Ok(Self { http, signer: RequestSigner::new(key) })
    }

    async fn get_text(&self, base_url: &str, path: &str) -> Result<String, ClientError> {
        let timestamp = format_timestamp(now_utc());
        let signature = self.signer.sign("GET", path, &timestamp);
        let url = format!("{}{path}", base_url.trim_end_matches('/'));

        let resp = self
            .http
            .get(&url)
            .header("X-Node-Id", self.signer.node_id())
            .header("X-Timestamp", timestamp)
            .header("X-Signature", signature)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status().as_u16()));
        }
        resp.text().await.map_err(|e| ClientError::Request(e.to_string()))
    }

    /// `GET /info`.
    pub async fn info(&self, base_url: &str) -> Result<String, ClientError> {
        self.get_text(base_url, "/info").await
    }

    /// `GET /batches`: one batch id per line.
    pub async fn list_batches(&self, base_url: &str) -> Result<Vec<String>, ClientError> {
        let body = self.get_text(base_url, "/batches").await?;
        Ok(body.lines().map(String::from).collect())
    }

    /// `GET /batches/<id>/manifest`.
    pub async fn manifest(&self, base_url: &str, batch_id: &str) -> Result<String, ClientError> {
        self.get_text(base_url, &format!("/batches/{batch_id}/manifest")).await
    }

    /// `GET /batches/<id>/chain-link`.
    pub async fn chain_link(&self, base_url: &str, batch_id: &str) -> Result<String, ClientError> {
        self.get_text(base_url, &format!("/batches/{batch_id}/chain-link")).await
    }

    /// `GET /batches/<id>/signature`.
    pub async fn signature(&self, base_url: &str, batch_id: &str) -> Result<String, ClientError> {
        self.get_text(base_url, &format!("/batches/{batch_id}/signature")).await
    }

    /// `GET /records/<hash>`.
    pub async fn record(&self, base_url: &str, hash: &str) -> Result<String, ClientError> {
        self.get_text(base_url, &format!("/records/{hash}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_signature_verifies() {
        let key = Arc::new(NodeKey::generate().unwrap());
        let signer = RequestSigner::new(key.clone());
        let sig = signer.sign("GET", "/batches", "2024-01-15T10:30:00Z");
        assert!(RequestSigner::verify(
            &key.public_key(),
            "GET",
            "/batches",
            "2024-01-15T10:30:00Z",
            &sig
        ));
        assert!(!RequestSigner::verify(
            &key.public_key(),
            "GET",
            "/records/x",
            "2024-01-15T10:30:00Z",
            &sig
        ));
    }
}
