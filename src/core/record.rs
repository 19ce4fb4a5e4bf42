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

//! Observation records: one observation of one URL by one node.
//!
//! ## Canonical form
//!
//! ```text
//! version:1
//! observed_at:<ISO-8601 UTC>
//! url:<url>
//! final_url:<url>
//! status_code:<100..=599>
//! fetch_ms:<int>
//! content_hash:<64-hex>
//! header:<name>:<value>          (whitelisted names, strictly sorted)
//! directive:canonical:<v>
//! directive:robots_meta:<v>
//! directive:robots_header:<v>
//! link:<url>                     (strictly sorted, deduplicated)
//! node_id:<64-hex>
//! node_signature:<base64>
//! ```
//!
//! The *record hash* is SHA-256 of the canonical text up to and including
//! the `node_id` line. The signature covers the same bytes. `node_id` is
//! the fingerprint of the signing key.

use crate::core::codec::{
    decode_base64, encode_base64, format_timestamp, is_hex32, parse_timestamp, CanonicalReader,
    CanonicalWriter, CodecError,
};
use crate::core::crypto::{self, fingerprint_hex, sha256_hex, NodeKey, PUBLIC_KEY_LEN};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Current record format version.
pub const RECORD_VERSION: u64 = 1;

/// Response headers retained in a record, in canonical order.
pub const HEADER_WHITELIST: [&str; 6] = [
    "cache-control",
    "content-language",
    "content-type",
    "etag",
    "last-modified",
    "server",
];

/// Record errors beyond canonical-form failures.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A field violates a record invariant.
    #[error("invalid record: {0}")]
    Invalid(&'static str),
    /// `node_id` is not the fingerprint of the presented key.
    #[error("node id does not match public key")]
    NodeIdMismatch,
    /// The node signature does not verify.
    #[error("bad signature")]
    SignatureInvalid,
}

/// Observation fields prior to signing.
///
/// The draft carries what the fetcher saw; `sign` binds it to a node key,
/// producing the immutable [`ObservationRecord`]. Headers and links are
/// normalized (whitelisted, sorted, deduplicated) at signing time.
#[derive(Clone, Debug)]
pub struct RecordDraft {
    /// Time of observation (UTC, second precision).
    pub observed_at: DateTime<Utc>,
    /// Requested URL.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status_code: u16,
    /// Fetch duration in milliseconds.
    pub fetch_ms: u64,
    /// SHA-256 of the response body, lowercase hex.
    pub content_hash: String,
    /// Response headers (any case, any order; filtered on sign).
    pub headers: Vec<(String, String)>,
    /// `<link rel="canonical">` target, or empty.
    pub canonical: String,
    /// Robots meta-tag directive, or empty.
    pub robots_meta: String,
    /// `X-Robots-Tag` header directive, or empty.
    pub robots_header: String,
    /// Outgoing links (deduplicated and sorted on sign).
    pub links: Vec<String>,
}

impl RecordDraft {
    /// Sign the draft, binding it to `key`.
    pub fn sign(self, key: &NodeKey) -> Result<ObservationRecord, RecordError> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.to_ascii_lowercase();
                HEADER_WHITELIST.contains(&name.as_str()).then_some((name, value))
            })
            .collect();
        headers.sort();
        headers.dedup_by(|a, b| a.0 == b.0);

        let mut links = self.links;
        links.sort();
        links.dedup();

        let mut record = ObservationRecord {
            observed_at: self.observed_at,
            url: self.url,
            final_url: self.final_url,
            status_code: self.status_code,
            fetch_ms: self.fetch_ms,
            content_hash: self.content_hash,
            headers,
            canonical: self.canonical,
            robots_meta: self.robots_meta,
            robots_header: self.robots_header,
            links,
            node_id: key.fingerprint(),
            signature: String::new(),
        };
        record.check_invariants()?;
        record.signature = encode_base64(&key.sign(record.signing_text().as_bytes()));
        Ok(record)
    }
}

/// A signed observation of one URL by one node. Append-only once stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservationRecord {
    /// Time of observation.
    pub observed_at: DateTime<Utc>,
    /// Requested URL.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status code, 100..=599.
    pub status_code: u16,
    /// Fetch duration in milliseconds.
    pub fetch_ms: u64,
    /// SHA-256 of the response body, 64-hex.
    pub content_hash: String,
    /// Whitelisted headers, sorted by name.
    pub headers: Vec<(String, String)>,
    /// Canonical-link directive value (may be empty).
    pub canonical: String,
    /// Robots meta directive value (may be empty).
    pub robots_meta: String,
    /// Robots header directive value (may be empty).
    pub robots_header: String,
    /// Outgoing links, sorted and deduplicated.
    pub links: Vec<String>,
    /// Fingerprint of the signing key.
    pub node_id: String,
    /// Base64 Ed25519 signature over the signing text.
    pub signature: String,
}

impl ObservationRecord {
    /// Canonical bytes covered by the record hash and signature: every
    /// field up to and including the `node_id` line.
    pub fn signing_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("version", &RECORD_VERSION.to_string());
        w.field("observed_at", &format_timestamp(self.observed_at));
        w.field("url", &self.url);
        w.field("final_url", &self.final_url);
        w.field("status_code", &self.status_code.to_string());
        w.field("fetch_ms", &self.fetch_ms.to_string());
        w.field("content_hash", &self.content_hash);
        for (name, value) in &self.headers {
            w.field("header", &format!("{name}:{value}"));
        }
        w.field("directive:canonical", &self.canonical);
        w.field("directive:robots_meta", &self.robots_meta);
        w.field("directive:robots_header", &self.robots_header);
        for link in &self.links {
            w.field("link", link);
        }
        w.field("node_id", &self.node_id);
        w.finish()
    }

    /// Record hash: SHA-256 of the signing text, 64-hex.
    pub fn record_hash(&self) -> String {
        sha256_hex(self.signing_text().as_bytes())
    }

    /// Full canonical text, signature line included.
    pub fn full_text(&self) -> String {
        let mut text = self.signing_text();
        text.push_str("node_signature:");
        text.push_str(&self.signature);
        text.push('\n');
        text
    }

    /// Strict parse of the full canonical text.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;

        let version = r.expect_u64("version")?;
        if version != RECORD_VERSION {
            return Err(CodecError::InvalidCanonicalForm("unsupported version".to_string()));
        }
        let observed_at = parse_timestamp(r.expect("observed_at")?)?;
        let url = r.expect("url")?.to_string();
        let final_url = r.expect("final_url")?.to_string();
        let status_code = r.expect_u64("status_code")?;
        let fetch_ms = r.expect_u64("fetch_ms")?;
        let content_hash = r.expect("content_hash")?.to_string();

        let mut headers = Vec::new();
        for raw in r.take_repeated("header") {
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| CodecError::InvalidCanonicalForm("bad header line".to_string()))?;
            headers.push((name.to_string(), value.to_string()));
        }

        let canonical = r.expect("directive:canonical")?.to_string();
        let robots_meta = r.expect("directive:robots_meta")?.to_string();
        let robots_header = r.expect("directive:robots_header")?.to_string();

        let links: Vec<String> = r.take_repeated("link").into_iter().map(String::from).collect();

        let node_id = r.expect("node_id")?.to_string();
        let signature = r.expect("node_signature")?.to_string();
        r.finish()?;

        if decode_base64(&signature)?.len() != crypto::SIGNATURE_LEN {
            return Err(CodecError::InvalidCanonicalForm("bad signature length".to_string()));
        }

        let record = Self {
            observed_at,
            url,
            final_url,
            status_code: u16::try_from(status_code)
                .map_err(|_| CodecError::InvalidCanonicalForm("status_code out of range".to_string()))?,
            fetch_ms,
            content_hash,
            headers,
            canonical,
            robots_meta,
            robots_header,
            links,
            node_id,
            signature,
        };
        record
            .check_invariants()
            .map_err(|e| CodecError::InvalidCanonicalForm(e.to_string()))?;
        Ok(record)
    }

    /// Structural invariants: hex widths, status range, header whitelist
    /// and ordering, link ordering and deduplication.
    pub fn check_invariants(&self) -> Result<(), RecordError> {
        if !is_hex32(&self.content_hash) {
            return Err(RecordError::Invalid("content_hash is not 64-hex"));
        }
        if !is_hex32(&self.node_id) {
            return Err(RecordError::Invalid("node_id is not 64-hex"));
        }
        if !(100..=599).contains(&self.status_code) {
            return Err(RecordError::Invalid("status_code out of range"));
        }
        for (name, _) in &self.headers {
            if !HEADER_WHITELIST.contains(&name.as_str()) {
                return Err(RecordError::Invalid("header not in whitelist"));
            }
        }
        if !self.headers.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(RecordError::Invalid("headers not sorted by name"));
        }
        if !self.links.windows(2).all(|w| w[0] < w[1]) {
            return Err(RecordError::Invalid("links not sorted/deduplicated"));
        }
        Ok(())
    }

    /// Verify that `node_id` is the fingerprint of `public_key` and that
    /// the signature verifies over the signing text.
    pub fn verify_signature(&self, public_key: &[u8; PUBLIC_KEY_LEN]) -> Result<(), RecordError> {
        if self.node_id != fingerprint_hex(public_key) {
            return Err(RecordError::NodeIdMismatch);
        }
        let sig = decode_base64(&self.signature).map_err(|_| RecordError::SignatureInvalid)?;
        crypto::verify(public_key, self.signing_text().as_bytes(), &sig)
            .map_err(|_| RecordError::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::now_utc;

    fn draft() -> RecordDraft {
        RecordDraft {
            observed_at: now_utc(),
            url: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            status_code: 200,
            fetch_ms: 42,
            content_hash: sha256_hex(b"<html></html>"),
            headers: vec![
                ("Server".to_string(), "nginx".to_string()),
                ("X-Internal".to_string(), "dropped".to_string()),
                ("Content-Type".to_string(), "text/html".to_string()),
            ],
            canonical: "https://example.com/".to_string(),
            robots_meta: String::new(),
            robots_header: "noindex".to_string(),
            links: vec![
                "https://example.com/b".to_string(),
                "https://example.com/a".to_string(),
                "https://example.com/a".to_string(),
            ],
        }
    }

    #[test]
    fn sign_normalizes_headers_and_links() {
        let key = NodeKey::generate().unwrap();
        let record = draft().sign(&key).unwrap();
        assert_eq!(
            record.headers,
            vec![
                ("content-type".to_string(), "text/html".to_string()),
                ("server".to_string(), "nginx".to_string()),
            ]
        );
        assert_eq!(
            record.links,
            vec!["https://example.com/a".to_string(), "https://example.com/b".to_string()]
        );
        record.verify_signature(&key.public_key()).unwrap();
    }

    #[test]
    fn parse_emit_roundtrip() {
        let key = NodeKey::generate().unwrap();
        let record = draft().sign(&key).unwrap();
        let parsed = ObservationRecord::parse(&record.full_text()).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.record_hash(), record.record_hash());
    }

    #[test]
    fn record_hash_excludes_signature() {
        let key = NodeKey::generate().unwrap();
        let record = draft().sign(&key).unwrap();
        assert_eq!(record.record_hash(), sha256_hex(record.signing_text().as_bytes()));
        assert!(!record.signing_text().contains("node_signature"));
    }

    #[test]
    fn parse_rejects_deviations() {
        let key = NodeKey::generate().unwrap();
        let record = draft().sign(&key).unwrap();
        let text = record.full_text();

        // Reordered fields.
        let swapped = text.replacen("url:", "xrl:", 1);
        assert!(ObservationRecord::parse(&swapped).is_err());

        // Upper-case hex.
        let upper = text.replacen(&record.content_hash, &record.content_hash.to_uppercase(), 1);
        assert!(ObservationRecord::parse(&upper).is_err());

        // Extra whitespace.
        let padded = text.replacen("status_code:200", "status_code: 200", 1);
        assert!(ObservationRecord::parse(&padded).is_err());

        // Trailing garbage.
        let mut extra = text.clone();
        extra.push_str("junk:1\n");
        assert!(ObservationRecord::parse(&extra).is_err());
    }

    #[test]
    fn verify_rejects_foreign_key() {
        let key = NodeKey::generate().unwrap();
        let other = NodeKey::generate().unwrap();
        let record = draft().sign(&key).unwrap();
        assert!(matches!(
            record.verify_signature(&other.public_key()),
            Err(RecordError::NodeIdMismatch)
        ));
    }

    #[test]
    fn status_code_bounds() {
        let key = NodeKey::generate().unwrap();
        let mut d = draft();
        d.status_code = 600;
        assert!(d.sign(&key).is_err());
    }
}
