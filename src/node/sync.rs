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

//! Sync cycle: pull unseen batches from peers.
//!
//! For every peer, list its batches; for every batch we do not hold,
//! fetch the chain link, manifest, and signature, verify under the peer's
//! key, pull the records we are missing, and mirror the batch directory
//! (temp dir + rename) so it can be served onward as the same bytes. One
//! bad peer never stops the round.

use crate::core::batch::{is_valid_batch_id, BatchManifest, ChainLink};
use crate::core::crypto::NodeKey;
use crate::core::publish::{BatchPublisher, BatchVerifier};
use crate::core::record::ObservationRecord;
use crate::core::store::RecordStore;
use crate::monitoring::metrics::Metrics;
use crate::node::client::PeerClient;
use crate::node::config::NodeConfig;
use crate::node::peers::PeerRegistry;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one sync round.
#[derive(Clone, Debug, Default)]
pub struct SyncSummary {
    /// Peers contacted.
    pub peers: usize,
    /// Batches imported this round.
    pub batches_imported: usize,
    /// Records admitted this round.
    pub records_imported: usize,
    /// Per-peer or per-batch failures.
    pub failures: usize,
}

/// Run one sync round against every known peer.
pub async fn sync_once(
    cfg: &NodeConfig,
    key: Arc<NodeKey>,
    store: &RecordStore,
    registry: &PeerRegistry,
    metrics: &Metrics,
) -> SyncSummary {
    let mut summary = SyncSummary::default();

    let peers = match registry.list() {
        Ok(p) => p,
        Err(e) => {
            warn!(err = %e, "peer registry unreadable; skipping sync round");
            return summary;
        }
    };
    metrics.peers.set(peers.len() as i64);
    if peers.is_empty() {
        return summary;
    }

    let client = match PeerClient::new(key) {
        Ok(c) => c,
        Err(e) => {
            warn!(err = %e, "peer client unavailable; skipping sync round");
            return summary;
        }
    };

    let publisher = BatchPublisher::new(cfg.batches_dir());
    let local: BTreeSet<String> = match publisher.list_batch_ids() {
        Ok(ids) => ids.into_iter().collect(),
        Err(e) => {
            warn!(err = %e, "batches dir unreadable; skipping sync round");
            return summary;
        }
    };

    for peer in peers {
        summary.peers += 1;
        let remote = match client.list_batches(&peer.endpoint_url).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(peer = %peer.node_id, err = %e, "batch listing failed");
                metrics.sync_errors_total.inc();
                summary.failures += 1;
                continue;
            }
        };

        for batch_id in remote {
            if !is_valid_batch_id(&batch_id) || local.contains(&batch_id) {
                continue;
            }
            match pull_batch(cfg, &client, &peer.endpoint_url, &peer.public_key, &batch_id, store)
                .await
            {
                Ok(records) => {
                    metrics.batches_imported_total.inc();
                    summary.batches_imported += 1;
                    summary.records_imported += records;
                    info!(peer = %peer.node_id, batch = %batch_id, records, "batch imported");
                }
                Err(e) => {
                    warn!(peer = %peer.node_id, batch = %batch_id, err = %e, "batch import failed");
                    metrics.sync_errors_total.inc();
                    summary.failures += 1;
                }
            }
        }
    }

    metrics.sync_rounds_total.inc();
    summary
}

/// Fetch, verify, and mirror one batch from a peer. Returns the number of
/// records admitted to the local store.
async fn pull_batch(
    cfg: &NodeConfig,
    client: &PeerClient,
    endpoint: &str,
    peer_key: &[u8; 32],
    batch_id: &str,
    store: &RecordStore,
) -> anyhow::Result<usize> {
    let link_text = client.chain_link(endpoint, batch_id).await?;
    let manifest_text = client.manifest(endpoint, batch_id).await?;
    let signature_text = client.signature(endpoint, batch_id).await?;

    let link = ChainLink::parse(&link_text)?;
    let manifest = BatchManifest::parse(&manifest_text)?;
    let signature = signature_text.trim_end_matches('\n').to_string();

    let report = BatchVerifier::verify_link(&link, &manifest, &signature, peer_key);
    if !report.valid() {
        anyhow::bail!("batch rejected: {}", report.errors.join("; "));
    }

    let mut imported = 0usize;
    for hash in manifest.hashes() {
        if store.contains(hash)? {
            continue;
        }
        let text = client.record(endpoint, hash).await?;
        let record = ObservationRecord::parse(&text)?;
        if record.record_hash() != *hash {
            anyhow::bail!("record hash mismatch: {hash}");
        }
        store.store(&record)?;
        imported += 1;
    }

    // Mirror the batch dir byte-for-byte so peers can sync it from us.
    let batches_dir = cfg.batches_dir();
    tokio::fs::create_dir_all(&batches_dir).await?;
    let tmp_dir = batches_dir.join(format!(".tmp-sync-{batch_id}"));
    if tokio::fs::metadata(&tmp_dir).await.is_ok() {
        tokio::fs::remove_dir_all(&tmp_dir).await?;
    }
    tokio::fs::create_dir_all(&tmp_dir).await?;
    tokio::fs::write(tmp_dir.join("chain-link.txt"), &link_text).await?;
    tokio::fs::write(tmp_dir.join("manifest.txt"), &manifest_text).await?;
    tokio::fs::write(tmp_dir.join("signature.txt"), &signature_text).await?;
    let final_dir = batches_dir.join(format!("batch-{batch_id}"));
    match tokio::fs::rename(&tmp_dir, &final_dir).await {
        Ok(()) => {}
        // Lost a race with another import of the same batch; same bytes.
        Err(_) if tokio::fs::metadata(&final_dir).await.is_ok() => {
            let _ = tokio::fs::remove_dir_all(&tmp_dir).await;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(imported)
}
