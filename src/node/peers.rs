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

//! Peer endpoint directory.
//!
//! One canonical [`PeerInfo`] file per peer at `peers/<node_id>.txt`.
//! Reads take no locks and tolerate concurrent file creation: an entry
//! that vanishes or fails to parse mid-scan is skipped, not fatal.

use crate::core::codec::is_hex32;
use crate::core::profile::PeerInfo;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Peer registry errors.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Filesystem failure.
    #[error("io")]
    Io,
    /// Caller passed a malformed node id.
    #[error("invalid node id")]
    InvalidNodeId,
}

/// Directory-backed peer registry.
#[derive(Clone, Debug)]
pub struct PeerRegistry {
    dir: PathBuf,
}

impl PeerRegistry {
    /// Registry rooted at `dir`. The directory need not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Add or refresh a peer entry.
    pub fn add(&self, peer: &PeerInfo) -> Result<(), PeerError> {
        fs::create_dir_all(&self.dir).map_err(|_| PeerError::Io)?;
        let path = self.dir.join(format!("{}.txt", peer.node_id));
        fs::write(path, peer.canonical_text()).map_err(|_| PeerError::Io)
    }

    /// Look up one peer.
    pub fn get(&self, node_id: &str) -> Result<Option<PeerInfo>, PeerError> {
        if !is_hex32(node_id) {
            return Err(PeerError::InvalidNodeId);
        }
        let path = self.dir.join(format!("{node_id}.txt"));
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(_) => return Err(PeerError::Io),
        };
        match PeerInfo::parse(&text) {
            Ok(peer) => Ok(Some(peer)),
            Err(e) => {
                warn!(node_id, err = %e, "unparseable peer entry");
                Ok(None)
            }
        }
    }

    /// All known peers, sorted by node id. A missing registry directory
    /// is an empty registry.
    pub fn list(&self) -> Result<Vec<PeerInfo>, PeerError> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
            Err(_) => return Err(PeerError::Io),
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(node_id) = name.strip_suffix(".txt") else {
                continue;
            };
            if !is_hex32(node_id) {
                continue;
            }
            // Entries appearing or vanishing mid-scan are skipped.
            let text = match fs::read_to_string(entry.path()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            match PeerInfo::parse(&text) {
                Ok(peer) => out.push(peer),
                Err(e) => warn!(node_id = %node_id, err = %e, "skipping unparseable peer entry"),
            }
        }
        out.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        Ok(out)
    }

    /// Number of known peers.
    pub fn len(&self) -> Result<usize, PeerError> {
        Ok(self.list()?.len())
    }

    /// True iff no peers are known.
    pub fn is_empty(&self) -> Result<bool, PeerError> {
        Ok(self.list()?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::NodeKey;

    fn peer(url: &str) -> PeerInfo {
        let key = NodeKey::generate().unwrap();
        PeerInfo {
            node_id: key.fingerprint(),
            endpoint_url: url.to_string(),
            public_key: key.public_key(),
        }
    }

    #[test]
    fn add_list_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PeerRegistry::new(dir.path().join("peers"));
        assert!(registry.list().unwrap().is_empty());

        let a = peer("http://127.0.0.1:8081");
        let b = peer("http://127.0.0.1:8082");
        registry.add(&a).unwrap();
        registry.add(&b).unwrap();

        let listed = registry.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(registry.get(&a.node_id).unwrap().unwrap(), a);
        assert!(registry.get(&"0".repeat(64)).unwrap().is_none());
    }

    #[test]
    fn corrupt_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PeerRegistry::new(dir.path());
        registry.add(&peer("http://127.0.0.1:8081")).unwrap();
        fs::write(dir.path().join(format!("{}.txt", "a".repeat(64))), "garbage\n").unwrap();
        assert_eq!(registry.list().unwrap().len(), 1);
    }
}
