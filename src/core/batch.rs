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

//! Batched commitments: manifest, metadata, and the back-referenced chain
//! link. A batch is sealed at publish time; its manifest order is part of
//! its identity.

use crate::core::codec::{is_hex32, CanonicalReader, CanonicalWriter, CodecError};
use crate::core::crypto::sha256_hex;
use crate::core::merkle;
use thiserror::Error;

/// `previous_root` of a chain's first link: the all-zero 64-hex string.
pub const GENESIS_ROOT: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Batch errors.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Manifest contains a non-64-hex line.
    #[error("invalid manifest entry")]
    InvalidEntry,
    /// Manifest has no entries.
    #[error("empty manifest")]
    Empty,
    /// Batch id does not match `YYYY-MM-DD` or `YYYY-MM-DD-NNN`.
    #[error("invalid batch id")]
    InvalidBatchId,
}

/// True iff `s` matches `YYYY-MM-DD` or `YYYY-MM-DD-NNN`.
pub fn is_valid_batch_id(s: &str) -> bool {
    let (date, seq) = match s.len() {
        10 => (s, None),
        14 => match s.as_bytes()[10] {
            b'-' => (&s[..10], Some(&s[11..])),
            _ => return false,
        },
        _ => return false,
    };
    if let Some(seq) = seq {
        if seq.len() != 3 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

/// Ordered list of record hashes committed as one batch.
///
/// Order is preserved exactly as given; the manifest is *not* sorted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchManifest {
    hashes: Vec<String>,
}

impl BatchManifest {
    /// Build from ordered record hashes, validating each entry.
    pub fn new(hashes: Vec<String>) -> Result<Self, BatchError> {
        if hashes.is_empty() {
            return Err(BatchError::Empty);
        }
        if !hashes.iter().all(|h| is_hex32(h)) {
            return Err(BatchError::InvalidEntry);
        }
        Ok(Self { hashes })
    }

    /// Strict parse: one 64-hex hash per line.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let body = text.strip_suffix('\n').unwrap_or(text);
        if body.is_empty() {
            return Err(CodecError::InvalidCanonicalForm("empty manifest".to_string()));
        }
        let mut hashes = Vec::new();
        for line in body.split('\n') {
            if !is_hex32(line) {
                return Err(CodecError::InvalidCanonicalForm("bad manifest line".to_string()));
            }
            hashes.push(line.to_string());
        }
        Ok(Self { hashes })
    }

    /// Canonical bytes: each hash followed by LF.
    pub fn canonical_text(&self) -> String {
        let mut out = String::with_capacity(self.hashes.len() * 65);
        for h in &self.hashes {
            out.push_str(h);
            out.push('\n');
        }
        out
    }

    /// SHA-256 of the canonical manifest bytes.
    pub fn manifest_hash(&self) -> String {
        sha256_hex(self.canonical_text().as_bytes())
    }

    /// Merkle root over the ordered leaves.
    pub fn merkle_root(&self) -> Result<String, merkle::MerkleError> {
        merkle::compute_root(&self.hashes)
    }

    /// The ordered record hashes.
    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Always false: an empty manifest cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Sealed batch commitment: id, merkle root, manifest hash, record count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchMetadata {
    /// Batch id (`YYYY-MM-DD` or `YYYY-MM-DD-NNN`).
    pub batch_id: String,
    /// Merkle root over the manifest leaves, 64-hex.
    pub merkle_root: String,
    /// SHA-256 of the canonical manifest bytes, 64-hex.
    pub manifest_hash: String,
    /// Number of manifest entries.
    pub record_count: u64,
}

impl BatchMetadata {
    /// Compute metadata for a manifest.
    pub fn from_manifest(batch_id: &str, manifest: &BatchManifest) -> Result<Self, BatchError> {
        if !is_valid_batch_id(batch_id) {
            return Err(BatchError::InvalidBatchId);
        }
        let merkle_root = manifest.merkle_root().map_err(|_| BatchError::Empty)?;
        Ok(Self {
            batch_id: batch_id.to_string(),
            merkle_root,
            manifest_hash: manifest.manifest_hash(),
            record_count: manifest.len() as u64,
        })
    }

    /// Canonical bytes; also the signing input.
    pub fn canonical_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("batch_id", &self.batch_id);
        w.field("merkle_root", &self.merkle_root);
        w.field("manifest_hash", &self.manifest_hash);
        w.field("record_count", &self.record_count.to_string());
        w.finish()
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let meta = Self {
            batch_id: r.expect("batch_id")?.to_string(),
            merkle_root: r.expect("merkle_root")?.to_string(),
            manifest_hash: r.expect("manifest_hash")?.to_string(),
            record_count: r.expect_u64("record_count")?,
        };
        r.finish()?;
        meta.validate().map_err(|e| CodecError::InvalidCanonicalForm(e.to_string()))?;
        Ok(meta)
    }

    fn validate(&self) -> Result<(), BatchError> {
        if !is_valid_batch_id(&self.batch_id) {
            return Err(BatchError::InvalidBatchId);
        }
        if !is_hex32(&self.merkle_root) || !is_hex32(&self.manifest_hash) {
            return Err(BatchError::InvalidEntry);
        }
        Ok(())
    }
}

/// Batch metadata plus the back-reference to the previous batch's root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainLink {
    /// Batch id.
    pub batch_id: String,
    /// Merkle root of this batch.
    pub merkle_root: String,
    /// Manifest hash of this batch.
    pub manifest_hash: String,
    /// Number of manifest entries.
    pub record_count: u64,
    /// Previous link's merkle root, or [`GENESIS_ROOT`].
    pub previous_root: String,
}

impl ChainLink {
    /// Compute a chain link for a manifest.
    pub fn from_manifest(
        batch_id: &str,
        manifest: &BatchManifest,
        previous_root: &str,
    ) -> Result<Self, BatchError> {
        if !is_hex32(previous_root) {
            return Err(BatchError::InvalidEntry);
        }
        let meta = BatchMetadata::from_manifest(batch_id, manifest)?;
        Ok(Self {
            batch_id: meta.batch_id,
            merkle_root: meta.merkle_root,
            manifest_hash: meta.manifest_hash,
            record_count: meta.record_count,
            previous_root: previous_root.to_string(),
        })
    }

    /// The metadata view of this link.
    pub fn metadata(&self) -> BatchMetadata {
        BatchMetadata {
            batch_id: self.batch_id.clone(),
            merkle_root: self.merkle_root.clone(),
            manifest_hash: self.manifest_hash.clone(),
            record_count: self.record_count,
        }
    }

    /// Canonical bytes; also the signing input.
    pub fn canonical_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("batch_id", &self.batch_id);
        w.field("merkle_root", &self.merkle_root);
        w.field("manifest_hash", &self.manifest_hash);
        w.field("record_count", &self.record_count.to_string());
        w.field("previous_root", &self.previous_root);
        w.finish()
    }

    /// Link hash: SHA-256 of the canonical chain-link bytes.
    pub fn link_hash(&self) -> String {
        sha256_hex(self.canonical_text().as_bytes())
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let link = Self {
            batch_id: r.expect("batch_id")?.to_string(),
            merkle_root: r.expect("merkle_root")?.to_string(),
            manifest_hash: r.expect("manifest_hash")?.to_string(),
            record_count: r.expect_u64("record_count")?,
            previous_root: r.expect("previous_root")?.to_string(),
        };
        r.finish()?;
        if !is_valid_batch_id(&link.batch_id)
            || !is_hex32(&link.merkle_root)
            || !is_hex32(&link.manifest_hash)
            || !is_hex32(&link.previous_root)
        {
            return Err(CodecError::InvalidCanonicalForm("bad chain link".to_string()));
        }
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::sha256_hex;

    #[test]
    fn batch_id_grammar() {
        assert!(is_valid_batch_id("2024-01-15"));
        assert!(is_valid_batch_id("2024-01-15-001"));
        assert!(!is_valid_batch_id("2024-01-15-1"));
        assert!(!is_valid_batch_id("2024-13-01"));
        assert!(!is_valid_batch_id("2024-01-15-abc"));
        assert!(!is_valid_batch_id("20240115"));
    }

    #[test]
    fn manifest_preserves_order() {
        let a = sha256_hex(b"a");
        let b = sha256_hex(b"b");
        let m1 = BatchManifest::new(vec![a.clone(), b.clone()]).unwrap();
        let m2 = BatchManifest::new(vec![b, a]).unwrap();
        assert_ne!(m1.manifest_hash(), m2.manifest_hash());
        assert_ne!(m1.merkle_root().unwrap(), m2.merkle_root().unwrap());

        let parsed = BatchManifest::parse(&m1.canonical_text()).unwrap();
        assert_eq!(parsed, m1);
    }

    #[test]
    fn metadata_and_link_roundtrip() {
        let manifest = BatchManifest::new(vec![sha256_hex(b"x")]).unwrap();
        let meta = BatchMetadata::from_manifest("2024-01-15", &manifest).unwrap();
        assert_eq!(BatchMetadata::parse(&meta.canonical_text()).unwrap(), meta);

        let link = ChainLink::from_manifest("2024-01-15", &manifest, GENESIS_ROOT).unwrap();
        assert_eq!(ChainLink::parse(&link.canonical_text()).unwrap(), link);
        assert_eq!(link.metadata(), meta);
        assert_eq!(link.link_hash(), sha256_hex(link.canonical_text().as_bytes()));
    }

    #[test]
    fn empty_manifest_rejected() {
        assert!(matches!(BatchManifest::new(vec![]), Err(BatchError::Empty)));
        assert!(BatchManifest::parse("").is_err());
        assert!(BatchManifest::parse("\n").is_err());
    }
}
