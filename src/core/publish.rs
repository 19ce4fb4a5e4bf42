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

//! Batch publication and verification.
//!
//! A published batch is a directory `batches/batch-<id>/` holding
//! `manifest.txt`, `chain-link.txt` (or `metadata.txt` for an unchained
//! batch), and `signature.txt`. Publication writes into a sibling temp
//! directory and renames it into place so readers never observe a partial
//! batch.
//!
//! Verifiers never error on expected verification failures: they return a
//! [`VerifyReport`] enumerating every broken check.

use crate::core::batch::{BatchManifest, BatchMetadata, ChainLink, GENESIS_ROOT};
use crate::core::codec::{decode_base64, encode_base64};
use crate::core::crypto::{self, NodeKey, PUBLIC_KEY_LEN};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Publication errors.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Filesystem failure.
    #[error("io")]
    Io,
    /// Target batch directory already exists.
    #[error("batch {0} already published")]
    AlreadyPublished(String),
    /// Manifest or batch id rejected.
    #[error("batch: {0}")]
    Batch(#[from] crate::core::batch::BatchError),
    /// A batch file on disk failed to parse.
    #[error("canonical form: {0}")]
    Codec(#[from] crate::core::codec::CodecError),
}

/// Outcome of a verification: valid iff `errors` is empty. Checks are
/// independent; every failed check is listed.
#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    /// Human-readable failure per broken check.
    pub errors: Vec<String>,
}

impl VerifyReport {
    /// True iff nothing failed.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn fail(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn merge_prefixed(&mut self, prefix: &str, other: VerifyReport) {
        for e in other.errors {
            self.errors.push(format!("{prefix}: {e}"));
        }
    }
}

/// The files of one published batch as read from disk.
#[derive(Clone, Debug)]
pub struct BatchFiles {
    /// The commitment: chained or plain.
    pub commitment: Commitment,
    /// The manifest.
    pub manifest: BatchManifest,
    /// Base64 signature over the commitment's canonical bytes.
    pub signature: String,
}

/// A batch commitment: plain metadata or a chain link.
#[derive(Clone, Debug)]
pub enum Commitment {
    /// `metadata.txt` was present.
    Metadata(BatchMetadata),
    /// `chain-link.txt` was present.
    Link(ChainLink),
}

impl Commitment {
    /// Canonical signing input of the commitment.
    pub fn canonical_text(&self) -> String {
        match self {
            Commitment::Metadata(m) => m.canonical_text(),
            Commitment::Link(l) => l.canonical_text(),
        }
    }

    /// The metadata view (chain links project away `previous_root`).
    pub fn metadata(&self) -> BatchMetadata {
        match self {
            Commitment::Metadata(m) => m.clone(),
            Commitment::Link(l) => l.metadata(),
        }
    }
}

/// Signs and publishes batches under a batches directory.
pub struct BatchPublisher {
    batches_dir: PathBuf,
}

impl BatchPublisher {
    /// Publisher writing under `batches_dir`.
    pub fn new(batches_dir: impl Into<PathBuf>) -> Self {
        Self { batches_dir: batches_dir.into() }
    }

    /// Directory of a published batch.
    pub fn batch_dir(&self, batch_id: &str) -> PathBuf {
        self.batches_dir.join(format!("batch-{batch_id}"))
    }

    /// Batch ids published so far, sorted (which for date-based ids is
    /// chain order).
    pub fn list_batch_ids(&self) -> Result<Vec<String>, PublishError> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.batches_dir) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(_) => return Err(PublishError::Io),
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_prefix("batch-") {
                if crate::core::batch::is_valid_batch_id(id) {
                    out.push(id.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Merkle root of the chain tail, or [`GENESIS_ROOT`] for an empty
    /// chain. The tail is the lexicographically-last published batch.
    pub fn latest_root(&self) -> Result<String, PublishError> {
        let ids = self.list_batch_ids()?;
        let Some(tail) = ids.last() else {
            return Ok(GENESIS_ROOT.to_string());
        };
        let link_path = self.batch_dir(tail).join("chain-link.txt");
        let text = fs::read_to_string(link_path).map_err(|_| PublishError::Io)?;
        Ok(ChainLink::parse(&text)?.merkle_root)
    }

    /// First unused batch id for `date`: `YYYY-MM-DD`, then
    /// `YYYY-MM-DD-001` upward.
    pub fn next_batch_id(&self, date: chrono::NaiveDate) -> Result<String, PublishError> {
        let base = date.format("%Y-%m-%d").to_string();
        if !self.batch_dir(&base).exists() {
            return Ok(base);
        }
        for seq in 1..1000u32 {
            let id = format!("{base}-{seq:03}");
            if !self.batch_dir(&id).exists() {
                return Ok(id);
            }
        }
        Err(PublishError::AlreadyPublished(base))
    }

    /// Publish a chained batch: computes the link, signs it, and writes
    /// `manifest.txt` + `chain-link.txt` + `signature.txt` atomically.
    ///
    /// The caller is responsible for serializing publications per key so
    /// `previous_root` references the true tail (see the daemon's chain
    /// mutex).
    pub fn publish_link(
        &self,
        key: &NodeKey,
        batch_id: &str,
        manifest: &BatchManifest,
        previous_root: &str,
    ) -> Result<ChainLink, PublishError> {
        let link = ChainLink::from_manifest(batch_id, manifest, previous_root)?;
        let signature = encode_base64(&key.sign(link.canonical_text().as_bytes()));
        self.write_batch_dir(batch_id, "chain-link.txt", &link.canonical_text(), manifest, &signature)?;
        Ok(link)
    }

    /// Publish an unchained batch (`metadata.txt` instead of a link).
    pub fn publish_metadata(
        &self,
        key: &NodeKey,
        batch_id: &str,
        manifest: &BatchManifest,
    ) -> Result<BatchMetadata, PublishError> {
        let meta = BatchMetadata::from_manifest(batch_id, manifest)?;
        let signature = encode_base64(&key.sign(meta.canonical_text().as_bytes()));
        self.write_batch_dir(batch_id, "metadata.txt", &meta.canonical_text(), manifest, &signature)?;
        Ok(meta)
    }

    fn write_batch_dir(
        &self,
        batch_id: &str,
        commitment_file: &str,
        commitment_text: &str,
        manifest: &BatchManifest,
        signature: &str,
    ) -> Result<(), PublishError> {
        let final_dir = self.batch_dir(batch_id);
        if final_dir.exists() {
            return Err(PublishError::AlreadyPublished(batch_id.to_string()));
        }
        fs::create_dir_all(&self.batches_dir).map_err(|_| PublishError::Io)?;

        let tmp_dir = self.batches_dir.join(format!(".tmp-batch-{batch_id}"));
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir).map_err(|_| PublishError::Io)?;
        }
        fs::create_dir_all(&tmp_dir).map_err(|_| PublishError::Io)?;

        fs::write(tmp_dir.join("manifest.txt"), manifest.canonical_text())
            .map_err(|_| PublishError::Io)?;
        fs::write(tmp_dir.join(commitment_file), commitment_text).map_err(|_| PublishError::Io)?;
        fs::write(tmp_dir.join("signature.txt"), format!("{signature}\n"))
            .map_err(|_| PublishError::Io)?;

        fs::rename(&tmp_dir, &final_dir).map_err(|_| PublishError::Io)
    }
}

/// Read one batch directory (published or exported).
pub fn read_batch_dir(dir: &Path) -> Result<BatchFiles, PublishError> {
    let manifest_text =
        fs::read_to_string(dir.join("manifest.txt")).map_err(|_| PublishError::Io)?;
    let manifest = BatchManifest::parse(&manifest_text)?;

    let link_path = dir.join("chain-link.txt");
    let commitment = if link_path.exists() {
        let text = fs::read_to_string(link_path).map_err(|_| PublishError::Io)?;
        Commitment::Link(ChainLink::parse(&text)?)
    } else {
        let text =
            fs::read_to_string(dir.join("metadata.txt")).map_err(|_| PublishError::Io)?;
        Commitment::Metadata(BatchMetadata::parse(&text)?)
    };

    let signature_text =
        fs::read_to_string(dir.join("signature.txt")).map_err(|_| PublishError::Io)?;
    let signature = signature_text.trim_end_matches('\n').to_string();

    Ok(BatchFiles { commitment, manifest, signature })
}

/// Verifies a single batch against its manifest and signature.
pub struct BatchVerifier;

impl BatchVerifier {
    /// Check manifest hash, record count, merkle root, and signature.
    /// All checks run; every failure is reported.
    pub fn verify(
        metadata: &BatchMetadata,
        manifest: &BatchManifest,
        signature_b64: &str,
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> VerifyReport {
        let mut report = Self::data_checks(metadata, manifest);
        Self::check_signature(
            &mut report,
            metadata.canonical_text().as_bytes(),
            signature_b64,
            public_key,
        );
        report
    }

    /// Like [`BatchVerifier::verify`] but for a chained batch, where the
    /// signing input is the chain-link bytes.
    pub fn verify_link(
        link: &ChainLink,
        manifest: &BatchManifest,
        signature_b64: &str,
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> VerifyReport {
        let mut report = Self::data_checks(&link.metadata(), manifest);
        Self::check_signature(
            &mut report,
            link.canonical_text().as_bytes(),
            signature_b64,
            public_key,
        );
        report
    }

    fn data_checks(metadata: &BatchMetadata, manifest: &BatchManifest) -> VerifyReport {
        let mut report = VerifyReport::default();
        if metadata.manifest_hash != manifest.manifest_hash() {
            report.fail("manifest hash mismatch");
        }
        if metadata.record_count != manifest.len() as u64 {
            report.fail("record count mismatch");
        }
        match manifest.merkle_root() {
            Ok(root) if root == metadata.merkle_root => {}
            Ok(_) => report.fail("merkle root mismatch"),
            Err(_) => report.fail("merkle root not computable"),
        }
        report
    }

    fn check_signature(
        report: &mut VerifyReport,
        signing_input: &[u8],
        signature_b64: &str,
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) {
        match decode_base64(signature_b64) {
            Ok(sig) => {
                if crypto::verify(public_key, signing_input, &sig).is_err() {
                    report.fail("signature invalid");
                }
            }
            Err(_) => report.fail("signature not decodable"),
        }
    }
}

/// Verifies a chain of batches presented in chain order.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify every link (as a batch) plus the back-references: the first
    /// link's `previous_root` must be [`GENESIS_ROOT`], and each later
    /// link's must equal the previous link's `merkle_root`. An
    /// out-of-order chain is a verification failure, not an input error.
    pub fn verify(
        links: &[ChainLink],
        manifests: &[BatchManifest],
        signatures: &[String],
        publisher_key: &[u8; PUBLIC_KEY_LEN],
    ) -> VerifyReport {
        let mut report = VerifyReport::default();

        if links.len() != manifests.len() || links.len() != signatures.len() {
            report.fail("links, manifests, and signatures differ in length");
            return report;
        }
        if links.is_empty() {
            report.fail("empty chain");
            return report;
        }

        for (i, link) in links.iter().enumerate() {
            let batch_report =
                BatchVerifier::verify_link(link, &manifests[i], &signatures[i], publisher_key);
            report.merge_prefixed(&format!("link {i}"), batch_report);
        }

        if links[0].previous_root != GENESIS_ROOT {
            report.fail("link 0: previous_root is not the genesis root");
        }
        for i in 1..links.len() {
            if links[i].previous_root != links[i - 1].merkle_root {
                report.fail(format!(
                    "link {i}: previous_root does not match previous merkle_root"
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::sha256_hex;

    #[test]
    fn next_batch_id_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = BatchPublisher::new(dir.path().join("batches"));
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(publisher.next_batch_id(date).unwrap(), "2024-01-15");

        fs::create_dir_all(publisher.batch_dir("2024-01-15")).unwrap();
        assert_eq!(publisher.next_batch_id(date).unwrap(), "2024-01-15-001");
    }

    #[test]
    fn latest_root_starts_at_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = BatchPublisher::new(dir.path().join("batches"));
        assert_eq!(publisher.latest_root().unwrap(), GENESIS_ROOT);
    }

    #[test]
    fn double_publish_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = BatchPublisher::new(dir.path().join("batches"));
        let key = NodeKey::generate().unwrap();
        let manifest = BatchManifest::new(vec![sha256_hex(b"r")]).unwrap();

        publisher.publish_link(&key, "2024-01-15", &manifest, GENESIS_ROOT).unwrap();
        assert!(matches!(
            publisher.publish_link(&key, "2024-01-15", &manifest, GENESIS_ROOT),
            Err(PublishError::AlreadyPublished(_))
        ));
    }
}
