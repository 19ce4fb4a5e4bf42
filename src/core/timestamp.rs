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

//! Timestamp authority tokens.
//!
//! A token binds (data_hash, issued_at, issuer) and nothing more: it
//! proves existence by a time, not ordering.

use crate::core::codec::{
    decode_base64, encode_base64, format_timestamp, is_hex32, parse_timestamp, CanonicalReader,
    CanonicalWriter, CodecError,
};
use crate::core::crypto::{self, fingerprint_hex, NodeKey, PUBLIC_KEY_LEN};
use crate::core::publish::VerifyReport;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Timestamp errors.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// Filesystem failure.
    #[error("io")]
    Io,
    /// Caller passed a malformed data hash.
    #[error("invalid data hash")]
    InvalidDataHash,
    /// Token file failed to parse.
    #[error("canonical form: {0}")]
    Codec(#[from] CodecError),
}

/// A signed existence attestation for one 32-byte digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampToken {
    /// The attested digest, 64-hex.
    pub data_hash: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Fingerprint of the TSA key.
    pub tsa_key_id: String,
    /// Base64 signature over the canonical text minus this line.
    pub tsa_signature: String,
}

impl TimestampToken {
    /// Canonical bytes minus the signature line.
    pub fn signing_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("data_hash", &self.data_hash);
        w.field("issued_at", &format_timestamp(self.issued_at));
        w.field("tsa_key_id", &self.tsa_key_id);
        w.finish()
    }

    /// Full canonical text.
    pub fn canonical_text(&self) -> String {
        let mut text = self.signing_text();
        text.push_str("tsa_signature:");
        text.push_str(&self.tsa_signature);
        text.push('\n');
        text
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let token = Self {
            data_hash: r.expect("data_hash")?.to_string(),
            issued_at: parse_timestamp(r.expect("issued_at")?)?,
            tsa_key_id: r.expect("tsa_key_id")?.to_string(),
            tsa_signature: r.expect("tsa_signature")?.to_string(),
        };
        r.finish()?;
        if !is_hex32(&token.data_hash) || !is_hex32(&token.tsa_key_id) {
            return Err(CodecError::InvalidCanonicalForm("bad token hash field".to_string()));
        }
        Ok(token)
    }
}

/// Issues timestamp tokens under one key. The key is read-only after load.
pub struct TimestampAuthority {
    key: NodeKey,
}

impl TimestampAuthority {
    /// Authority signing with `key`.
    pub fn new(key: NodeKey) -> Self {
        Self { key }
    }

    /// The authority's key fingerprint.
    pub fn key_id(&self) -> String {
        self.key.fingerprint()
    }

    /// Issue a token for `data_hash` at `now`.
    pub fn issue(
        &self,
        data_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<TimestampToken, TimestampError> {
        if !is_hex32(data_hash) {
            return Err(TimestampError::InvalidDataHash);
        }
        let mut token = TimestampToken {
            data_hash: data_hash.to_string(),
            issued_at: now,
            tsa_key_id: self.key.fingerprint(),
            tsa_signature: String::new(),
        };
        token.tsa_signature = encode_base64(&self.key.sign(token.signing_text().as_bytes()));
        Ok(token)
    }
}

/// Token files under `timestamps/`.
pub struct TimestampStore {
    dir: PathBuf,
}

impl TimestampStore {
    /// Store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist at `<dir>/<data_hash>.txt`. Idempotent for identical
    /// content: an existing file is left in place.
    pub fn store(&self, token: &TimestampToken) -> Result<PathBuf, TimestampError> {
        fs::create_dir_all(&self.dir).map_err(|_| TimestampError::Io)?;
        let path = self.dir.join(format!("{}.txt", token.data_hash));
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                f.write_all(token.canonical_text().as_bytes()).map_err(|_| TimestampError::Io)?;
                Ok(path)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(path),
            Err(_) => Err(TimestampError::Io),
        }
    }

    /// Load the token for `data_hash`, or `None`.
    pub fn load(&self, data_hash: &str) -> Result<Option<TimestampToken>, TimestampError> {
        if !is_hex32(data_hash) {
            return Err(TimestampError::InvalidDataHash);
        }
        let path = self.dir.join(format!("{data_hash}.txt"));
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(_) => return Err(TimestampError::Io),
        };
        Ok(Some(TimestampToken::parse(&text)?))
    }
}

/// Verifies tokens against a TSA public key.
pub struct TimestampVerifier;

impl TimestampVerifier {
    /// Recompute the key id from `public_key`, require equality with the
    /// token's, and verify the signature. Both checks are reported.
    pub fn verify(token: &TimestampToken, public_key: &[u8; PUBLIC_KEY_LEN]) -> VerifyReport {
        let mut report = VerifyReport::default();
        if token.tsa_key_id != fingerprint_hex(public_key) {
            report.errors.push("tsa key id mismatch".to_string());
        }
        match decode_base64(&token.tsa_signature) {
            Ok(sig) => {
                if crypto::verify(public_key, token.signing_text().as_bytes(), &sig).is_err() {
                    report.errors.push("signature invalid".to_string());
                }
            }
            Err(_) => report.errors.push("signature not decodable".to_string()),
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::now_utc;
    use crate::core::crypto::sha256_hex;

    #[test]
    fn issue_verify_roundtrip() {
        let tsa = TimestampAuthority::new(NodeKey::generate().unwrap());
        let token = tsa.issue(&sha256_hex(b"data"), now_utc()).unwrap();
        let parsed = TimestampToken::parse(&token.canonical_text()).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn verifier_reports_wrong_key() {
        let tsa = TimestampAuthority::new(NodeKey::generate().unwrap());
        let other = NodeKey::generate().unwrap();
        let token = tsa.issue(&sha256_hex(b"data"), now_utc()).unwrap();
        assert!(!TimestampVerifier::verify(&token, &other.public_key()).valid());
    }

    #[test]
    fn store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimestampStore::new(dir.path());
        let tsa = TimestampAuthority::new(NodeKey::generate().unwrap());
        let token = tsa.issue(&sha256_hex(b"data"), now_utc()).unwrap();

        store.store(&token).unwrap();
        store.store(&token).unwrap();
        let loaded = store.load(&token.data_hash).unwrap().unwrap();
        assert_eq!(loaded, token);
    }
}
