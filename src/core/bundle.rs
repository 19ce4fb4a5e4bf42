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

//! Self-contained batch bundles for cross-node exchange.
//!
//! An export directory carries everything a third party needs to verify a
//! batch offline: the commitment (`chain-link.txt` or `metadata.txt`), the
//! manifest, the signature, and `records/<hash>.txt` for every manifest
//! entry. Import re-verifies before admitting records to the local store;
//! the store stays append-only, so records written before a failure are
//! left in place.

use crate::core::codec::{CanonicalReader, CanonicalWriter, CodecError};
use crate::core::crypto::PUBLIC_KEY_LEN;
use crate::core::publish::{read_batch_dir, BatchVerifier, Commitment, PublishError};
use crate::core::record::ObservationRecord;
use crate::core::store::RecordStore;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Bundle errors (unexpected failures; verification failures are data).
#[derive(Debug, Error)]
pub enum BundleError {
    /// Filesystem failure.
    #[error("io")]
    Io,
    /// Batch files failed to load or parse.
    #[error("batch: {0}")]
    Publish(#[from] PublishError),
    /// A record required by the manifest is absent from the local store.
    #[error("record missing from store: {0}")]
    RecordMissing(String),
    /// Store failure.
    #[error("store: {0}")]
    Store(#[from] crate::core::store::StoreError),
}

/// Writes export bundles.
pub struct BatchExporter;

impl BatchExporter {
    /// Export the published batch at `batch_dir` plus every manifest
    /// record from `store` into `out_dir`. Returns the record count.
    pub fn export(
        batch_dir: &Path,
        store: &RecordStore,
        out_dir: &Path,
    ) -> Result<usize, BundleError> {
        let files = read_batch_dir(batch_dir)?;

        fs::create_dir_all(out_dir).map_err(|_| BundleError::Io)?;
        let commitment_file = match &files.commitment {
            Commitment::Link(_) => "chain-link.txt",
            Commitment::Metadata(_) => "metadata.txt",
        };
        fs::write(out_dir.join(commitment_file), files.commitment.canonical_text())
            .map_err(|_| BundleError::Io)?;
        fs::write(out_dir.join("manifest.txt"), files.manifest.canonical_text())
            .map_err(|_| BundleError::Io)?;
        fs::write(out_dir.join("signature.txt"), format!("{}\n", files.signature))
            .map_err(|_| BundleError::Io)?;

        let records_dir = out_dir.join("records");
        fs::create_dir_all(&records_dir).map_err(|_| BundleError::Io)?;
        for hash in files.manifest.hashes() {
            let record = store
                .load(hash)?
                .ok_or_else(|| BundleError::RecordMissing(hash.clone()))?;
            fs::write(records_dir.join(format!("{hash}.txt")), record.full_text())
                .map_err(|_| BundleError::Io)?;
        }

        Ok(files.manifest.len())
    }
}

/// Outcome of one import, as canonical text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReceipt {
    /// Imported batch id.
    pub batch_id: String,
    /// True iff the batch verified and every record imported cleanly.
    pub valid: bool,
    /// Records admitted to the local store.
    pub records_imported: u64,
    /// Every failure encountered.
    pub errors: Vec<String>,
}

impl ImportReceipt {
    /// Canonical bytes.
    pub fn canonical_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("batch_id", &self.batch_id);
        w.field("valid", if self.valid { "true" } else { "false" });
        w.field("records_imported", &self.records_imported.to_string());
        for e in &self.errors {
            w.field("error", e);
        }
        w.finish()
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let batch_id = r.expect("batch_id")?.to_string();
        let valid = match r.expect("valid")? {
            "true" => true,
            "false" => false,
            _ => return Err(CodecError::InvalidCanonicalForm("bad valid flag".to_string())),
        };
        let records_imported = r.expect_u64("records_imported")?;
        let errors = r.take_repeated("error").into_iter().map(String::from).collect();
        r.finish()?;
        Ok(Self { batch_id, valid, records_imported, errors })
    }
}

/// Imports export bundles into a local store.
pub struct BatchImporter;

impl BatchImporter {
    /// Re-verify the bundle at `dir` under `publisher_key`, then parse,
    /// re-hash, and store every listed record. Each mismatching, missing,
    /// or unparseable record marks the receipt invalid but does not undo
    /// records already admitted.
    pub fn import_batch(
        dir: &Path,
        store: &RecordStore,
        publisher_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Result<ImportReceipt, BundleError> {
        let files = read_batch_dir(dir)?;
        let metadata = files.commitment.metadata();

        let report = match &files.commitment {
            Commitment::Link(link) => {
                BatchVerifier::verify_link(link, &files.manifest, &files.signature, publisher_key)
            }
            Commitment::Metadata(meta) => {
                BatchVerifier::verify(meta, &files.manifest, &files.signature, publisher_key)
            }
        };

        let mut errors = report.errors;
        let mut imported = 0u64;
        let records_dir = dir.join("records");

        for hash in files.manifest.hashes() {
            let path = records_dir.join(format!("{hash}.txt"));
            let text = match fs::read_to_string(&path) {
                Ok(t) => t,
                Err(_) => {
                    errors.push(format!("record file missing: {hash}"));
                    continue;
                }
            };
            let record = match ObservationRecord::parse(&text) {
                Ok(r) => r,
                Err(_) => {
                    errors.push(format!("record unparseable: {hash}"));
                    continue;
                }
            };
            if record.record_hash() != *hash {
                errors.push(format!("record hash mismatch: {hash}"));
                continue;
            }
            store.store(&record)?;
            imported += 1;
        }

        Ok(ImportReceipt {
            batch_id: metadata.batch_id,
            valid: errors.is_empty(),
            records_imported: imported,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_roundtrip() {
        let receipt = ImportReceipt {
            batch_id: "2024-01-15".to_string(),
            valid: false,
            records_imported: 2,
            errors: vec!["record hash mismatch: abc".to_string()],
        };
        let parsed = ImportReceipt::parse(&receipt.canonical_text()).unwrap();
        assert_eq!(parsed, receipt);
    }
}
