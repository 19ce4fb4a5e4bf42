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

//! Content-addressed record store.
//!
//! Records live at `<root>/<hh>/<hash>.txt` where `hh` is the first two hex
//! chars of the record hash (256 shards). Writes are create-if-absent, so
//! storing an already-present record is a no-op and concurrent stores of
//! the same record are safe. A non-existent root is a valid empty store.
//!
//! Indices are rebuilt from the files on disk; nothing else is persisted.

use crate::core::codec::is_hex32;
use crate::core::record::ObservationRecord;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("io")]
    Io,
    /// A stored file is not a valid canonical record.
    #[error("corrupt record {0}")]
    Corrupt(String),
    /// Caller passed a malformed record hash.
    #[error("invalid record hash")]
    InvalidHash,
}

/// Content-addressed file store for observation records.
#[derive(Clone, Debug)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    /// Store rooted at `root`. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a record with `hash` lives at.
    pub fn path_for(&self, hash: &str) -> Result<PathBuf, StoreError> {
        if !is_hex32(hash) {
            return Err(StoreError::InvalidHash);
        }
        Ok(self.root.join(&hash[..2]).join(format!("{hash}.txt")))
    }

    /// Persist a record. Idempotent: an already-present record is left
    /// untouched and its hash returned.
    pub fn store(&self, record: &ObservationRecord) -> Result<String, StoreError> {
        let hash = record.record_hash();
        let path = self.path_for(&hash)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| StoreError::Io)?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                f.write_all(record.full_text().as_bytes()).map_err(|_| StoreError::Io)?;
                Ok(hash)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(hash),
            Err(_) => Err(StoreError::Io),
        }
    }

    /// Load and parse a record, or `None` if absent.
    pub fn load(&self, hash: &str) -> Result<Option<ObservationRecord>, StoreError> {
        let path = self.path_for(hash)?;
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(_) => return Err(StoreError::Io),
        };
        let record =
            ObservationRecord::parse(&text).map_err(|_| StoreError::Corrupt(hash.to_string()))?;
        Ok(Some(record))
    }

    /// True iff a record with `hash` is present.
    pub fn contains(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(hash)?.exists())
    }

    /// All stored record hashes, sorted lexicographically.
    pub fn list_hashes(&self) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        let shards = match fs::read_dir(&self.root) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
            Err(_) => return Err(StoreError::Io),
        };
        for shard in shards {
            let shard = match shard {
                Ok(s) => s,
                Err(_) => continue,
            };
            let entries = match fs::read_dir(shard.path()) {
                Ok(d) => d,
                // Concurrent creation/cleanup races resolve to "skip".
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(hash) = name.strip_suffix(".txt") {
                    if is_hex32(hash) {
                        out.push(hash.to_string());
                    }
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Number of stored records.
    pub fn size(&self) -> Result<usize, StoreError> {
        Ok(self.list_hashes()?.len())
    }
}

/// In-memory indices derived from a store scan.
#[derive(Clone, Debug, Default)]
pub struct StoreIndex {
    /// URL -> sorted record hashes.
    pub by_url: BTreeMap<String, Vec<String>>,
    /// node_id -> sorted record hashes.
    pub by_node: BTreeMap<String, Vec<String>>,
}

/// Builds [`StoreIndex`] from the files on disk in one scan.
pub struct IndexBuilder;

impl IndexBuilder {
    /// Scan the store and build both indices. Unparseable files fail the
    /// scan; transiently-missing files (concurrent creation) are skipped.
    pub fn build(store: &RecordStore) -> Result<StoreIndex, StoreError> {
        let mut index = StoreIndex::default();
        for hash in store.list_hashes()? {
            let Some(record) = store.load(&hash)? else {
                continue;
            };
            index.by_url.entry(record.url.clone()).or_default().push(hash.clone());
            index.by_node.entry(record.node_id.clone()).or_default().push(hash);
        }
        for hashes in index.by_url.values_mut() {
            hashes.sort();
        }
        for hashes in index.by_node.values_mut() {
            hashes.sort();
        }
        Ok(index)
    }
}
