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

//! Deterministic audit: sampler, verification pipeline, persisted status.
//!
//! The sampler derives its seed as SHA-256(merkle_root || user_seed) and
//! drives a Fisher-Yates permutation of the manifest's leaf indices with a
//! SHA-256 counter stream, so the same (manifest, root, seed, max) always
//! yields the same ordered sample on every machine.

use crate::core::batch::BatchManifest;
use crate::core::codec::{
    format_timestamp, is_hex32, parse_timestamp, CanonicalReader, CanonicalWriter, CodecError,
};
use crate::core::crypto::sha256;
use crate::core::store::{RecordStore, StoreError};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default sample ceiling per audit.
pub const DEFAULT_MAX_SAMPLE: usize = 8;

/// Audit errors (unexpected failures only; findings are data, not errors).
#[derive(Debug, Error)]
pub enum AuditError {
    /// Store failure while fetching sampled records.
    #[error("store: {0}")]
    Store(#[from] StoreError),
    /// Status file I/O failure.
    #[error("io")]
    Io,
    /// Status file failed to parse.
    #[error("canonical form: {0}")]
    Codec(#[from] CodecError),
}

/// Deterministic byte stream: SHA-256(seed || counter) blocks.
struct SeedStream {
    seed: [u8; 32],
    counter: u64,
    block: [u8; 32],
    offset: usize,
}

impl SeedStream {
    fn new(seed: [u8; 32]) -> Self {
        Self { seed, counter: 0, block: [0u8; 32], offset: 32 }
    }

    fn next_u64(&mut self) -> u64 {
        if self.offset + 8 > 32 {
            let mut input = [0u8; 40];
            input[..32].copy_from_slice(&self.seed);
            input[32..].copy_from_slice(&self.counter.to_be_bytes());
            self.block = sha256(&input);
            self.counter += 1;
            self.offset = 0;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.block[self.offset..self.offset + 8]);
        self.offset += 8;
        u64::from_be_bytes(buf)
    }
}

/// Draw the audit sample: the first `min(max_sample, n)` record hashes of
/// the seeded permutation, in sampled order. Pure in all four inputs.
pub fn sample(
    manifest: &BatchManifest,
    merkle_root: &str,
    user_seed: &str,
    max_sample: usize,
) -> Vec<String> {
    let mut input = Vec::with_capacity(merkle_root.len() + user_seed.len());
    input.extend_from_slice(merkle_root.as_bytes());
    input.extend_from_slice(user_seed.as_bytes());
    let mut stream = SeedStream::new(sha256(&input));

    let n = manifest.len();
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = (stream.next_u64() % (i as u64 + 1)) as usize;
        indices.swap(i, j);
    }

    indices
        .into_iter()
        .take(max_sample.min(n))
        .map(|i| manifest.hashes()[i].clone())
        .collect()
}

/// Outcome of one pipeline run.
#[derive(Clone, Debug, Default)]
pub struct PipelineResult {
    /// True iff the recomputed merkle root equals the expected one.
    pub root_ok: bool,
    /// Sampled hashes present and re-hashing to their manifest entry.
    pub matched: Vec<String>,
    /// Sampled hashes whose stored record re-hashes differently.
    pub mismatched: Vec<String>,
    /// Sampled hashes absent from the store.
    pub missing: Vec<String>,
    /// The full sample, in sampled order.
    pub sampled: Vec<String>,
}

/// Audits a batch against a record store.
pub struct VerificationPipeline;

impl VerificationPipeline {
    /// Run the audit: recompute the root, draw the sample, and check each
    /// sampled record's presence and hash.
    pub fn run(
        manifest: &BatchManifest,
        merkle_root: &str,
        user_seed: &str,
        max_sample: usize,
        store: &RecordStore,
    ) -> Result<PipelineResult, AuditError> {
        let mut result = PipelineResult {
            root_ok: manifest.merkle_root().map(|r| r == merkle_root).unwrap_or(false),
            ..PipelineResult::default()
        };

        result.sampled = sample(manifest, merkle_root, user_seed, max_sample);

        for hash in &result.sampled {
            match store.load(hash) {
                Ok(Some(record)) => {
                    if record.record_hash() == *hash {
                        result.matched.push(hash.clone());
                    } else {
                        result.mismatched.push(hash.clone());
                    }
                }
                Ok(None) => result.missing.push(hash.clone()),
                // A record that exists but does not parse cannot match its
                // manifest entry.
                Err(StoreError::Corrupt(_)) => result.mismatched.push(hash.clone()),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(result)
    }
}

/// Terminal audit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditStatus {
    /// Root matched and every sampled record checked out.
    VerifiedClean,
    /// Root matched but some sampled record was missing or mismatched.
    VerifiedWithFindings,
    /// The recomputed merkle root differed.
    RootMismatch,
}

impl AuditStatus {
    fn as_str(self) -> &'static str {
        match self {
            AuditStatus::VerifiedClean => "VERIFIED_CLEAN",
            AuditStatus::VerifiedWithFindings => "VERIFIED_WITH_FINDINGS",
            AuditStatus::RootMismatch => "ROOT_MISMATCH",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "VERIFIED_CLEAN" => Some(AuditStatus::VerifiedClean),
            "VERIFIED_WITH_FINDINGS" => Some(AuditStatus::VerifiedWithFindings),
            "ROOT_MISMATCH" => Some(AuditStatus::RootMismatch),
            _ => None,
        }
    }
}

/// One adverse finding from a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finding {
    /// Stored record re-hashes differently from its manifest entry.
    HashMismatch(String),
    /// Sampled record absent from the store.
    RecordMissing(String),
}

/// Persisted audit outcome for one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationStatus {
    /// Audited batch id.
    pub batch_id: String,
    /// Terminal status.
    pub status: AuditStatus,
    /// Wall-clock time of the audit.
    pub checked_at: DateTime<Utc>,
    /// Sample size drawn.
    pub sampled: u64,
    /// Records that checked out.
    pub matched: u64,
    /// Records that re-hashed differently.
    pub mismatched: u64,
    /// Records absent from the store.
    pub missing: u64,
    /// Adverse findings, mismatches first, in sampled order.
    pub findings: Vec<Finding>,
}

impl VerificationStatus {
    /// Wrap a pipeline result with a timestamp and terminal status.
    pub fn from_result(batch_id: &str, result: &PipelineResult, now: DateTime<Utc>) -> Self {
        let status = if !result.root_ok {
            AuditStatus::RootMismatch
        } else if result.mismatched.is_empty() && result.missing.is_empty() {
            AuditStatus::VerifiedClean
        } else {
            AuditStatus::VerifiedWithFindings
        };

        let mut findings = Vec::new();
        findings.extend(result.mismatched.iter().cloned().map(Finding::HashMismatch));
        findings.extend(result.missing.iter().cloned().map(Finding::RecordMissing));

        Self {
            batch_id: batch_id.to_string(),
            status,
            checked_at: now,
            sampled: result.sampled.len() as u64,
            matched: result.matched.len() as u64,
            mismatched: result.mismatched.len() as u64,
            missing: result.missing.len() as u64,
            findings,
        }
    }

    /// Canonical bytes.
    pub fn canonical_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("batch_id", &self.batch_id);
        w.field("status", self.status.as_str());
        w.field("checked_at", &format_timestamp(self.checked_at));
        w.field("sampled", &self.sampled.to_string());
        w.field("matched", &self.matched.to_string());
        w.field("mismatched", &self.mismatched.to_string());
        w.field("missing", &self.missing.to_string());
        for finding in &self.findings {
            match finding {
                Finding::HashMismatch(h) => w.field("finding", &format!("HASH_MISMATCH:{h}")),
                Finding::RecordMissing(h) => w.field("finding", &format!("RECORD_MISSING:{h}")),
            };
        }
        w.finish()
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let batch_id = r.expect("batch_id")?.to_string();
        let status = AuditStatus::from_str(r.expect("status")?)
            .ok_or_else(|| CodecError::InvalidCanonicalForm("bad status".to_string()))?;
        let checked_at = parse_timestamp(r.expect("checked_at")?)?;
        let sampled = r.expect_u64("sampled")?;
        let matched = r.expect_u64("matched")?;
        let mismatched = r.expect_u64("mismatched")?;
        let missing = r.expect_u64("missing")?;

        let mut findings = Vec::new();
        for raw in r.take_repeated("finding") {
            let (kind, hash) = raw
                .split_once(':')
                .ok_or_else(|| CodecError::InvalidCanonicalForm("bad finding".to_string()))?;
            if !is_hex32(hash) {
                return Err(CodecError::InvalidCanonicalForm("bad finding hash".to_string()));
            }
            let finding = match kind {
                "HASH_MISMATCH" => Finding::HashMismatch(hash.to_string()),
                "RECORD_MISSING" => Finding::RecordMissing(hash.to_string()),
                _ => return Err(CodecError::InvalidCanonicalForm("bad finding kind".to_string())),
            };
            findings.push(finding);
        }
        r.finish()?;

        Ok(Self { batch_id, status, checked_at, sampled, matched, mismatched, missing, findings })
    }

    /// Path of the persisted status for `batch_id` under `dir`.
    pub fn path_in(dir: &Path, batch_id: &str) -> PathBuf {
        dir.join(format!("batch-{batch_id}.txt"))
    }

    /// Persist at `<dir>/batch-<id>.txt`. A previous status for the same
    /// batch is overwritten: re-verification supersedes older findings.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, AuditError> {
        fs::create_dir_all(dir).map_err(|_| AuditError::Io)?;
        let path = Self::path_in(dir, &self.batch_id);
        fs::write(&path, self.canonical_text()).map_err(|_| AuditError::Io)?;
        Ok(path)
    }

    /// Load a persisted status, or `None` if absent.
    pub fn load(dir: &Path, batch_id: &str) -> Result<Option<Self>, AuditError> {
        let path = Self::path_in(dir, batch_id);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(_) => return Err(AuditError::Io),
        };
        Ok(Some(Self::parse(&text)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::now_utc;
    use crate::core::crypto::sha256_hex;

    fn manifest(n: u8) -> BatchManifest {
        BatchManifest::new((0..n).map(|i| sha256_hex(&[i])).collect()).unwrap()
    }

    #[test]
    fn sample_is_deterministic_and_bounded() {
        let m = manifest(12);
        let root = m.merkle_root().unwrap();
        let a = sample(&m, &root, "seed", 5);
        let b = sample(&m, &root, "seed", 5);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);

        let all = sample(&m, &root, "seed", 100);
        assert_eq!(all.len(), 12);

        let other = sample(&m, &root, "other-seed", 5);
        assert_ne!(a, other);
    }

    #[test]
    fn sample_prefix_stability() {
        // A smaller max draws a prefix of the same permutation.
        let m = manifest(9);
        let root = m.merkle_root().unwrap();
        let long = sample(&m, &root, "s", 9);
        let short = sample(&m, &root, "s", 3);
        assert_eq!(&long[..3], &short[..]);
    }

    #[test]
    fn status_roundtrip() {
        let result = PipelineResult {
            root_ok: true,
            matched: vec![sha256_hex(b"m")],
            mismatched: vec![sha256_hex(b"x")],
            missing: vec![sha256_hex(b"gone")],
            sampled: vec![sha256_hex(b"m"), sha256_hex(b"x"), sha256_hex(b"gone")],
        };
        let status = VerificationStatus::from_result("2024-01-15", &result, now_utc());
        assert_eq!(status.status, AuditStatus::VerifiedWithFindings);

        let parsed = VerificationStatus::parse(&status.canonical_text()).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn save_overwrites_previous_status() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineResult { root_ok: true, ..PipelineResult::default() };
        let first = VerificationStatus::from_result("2024-01-15", &result, now_utc());
        first.save(dir.path()).unwrap();

        let result = PipelineResult { root_ok: false, ..PipelineResult::default() };
        let second = VerificationStatus::from_result("2024-01-15", &result, now_utc());
        second.save(dir.path()).unwrap();

        let loaded = VerificationStatus::load(dir.path(), "2024-01-15").unwrap().unwrap();
        assert_eq!(loaded.status, AuditStatus::RootMismatch);
        assert!(VerificationStatus::load(dir.path(), "2024-01-16").unwrap().is_none());
    }
}
