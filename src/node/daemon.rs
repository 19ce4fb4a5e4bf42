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

//! The long-running node: API pool, sync loop, crawl loop.
//!
//! All three share one store, one peer registry, and the batches
//! directory. The only mutable global is the publisher's chain tail,
//! guarded by a process-local mutex held across "scan tail + publish".
//! Loops stop at the next sleep boundary on interruption; per-iteration
//! errors are logged, never fatal.

use crate::core::keys::load_or_create_keypair;
use crate::core::store::RecordStore;
use crate::monitoring::metrics::Metrics;
use crate::node::config::NodeConfig;
use crate::node::crawl::crawl_once;
use crate::node::peers::PeerRegistry;
use crate::node::server::{serve, ApiState};
use crate::node::sync::sync_once;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Run the node until interrupted.
pub async fn run(cfg: NodeConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(cfg.data_dir()).context("create data dir")?;
    let key = Arc::new(load_or_create_keypair(&cfg.data_dir()).context("load node key")?);
    let node_id = key.fingerprint();

    let store = RecordStore::new(cfg.store_dir());
    let registry = PeerRegistry::new(cfg.peers_dir());
    let metrics = Arc::new(Metrics::new().context("init metrics")?);

    info!(node_id = %node_id, data_dir = %cfg.data_dir, port = cfg.port, "node starting");

    let api_state = Arc::new(ApiState {
        node_id,
        store: store.clone(),
        batches_dir: cfg.batches_dir(),
        metrics: metrics.clone(),
    });
    let port = cfg.port;
    let server_task = tokio::spawn(async move {
        if let Err(e) = serve(api_state, port).await {
            warn!(err = %e, "api server stopped");
        }
    });

    let chain_lock = Mutex::new(());
    let mut sync_timer = tokio::time::interval(Duration::from_secs(cfg.sync_interval_secs.max(1)));
    let mut crawl_timer =
        tokio::time::interval(Duration::from_secs(cfg.crawl_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping loops");
                break;
            }
            _ = sync_timer.tick() => {
                let summary = sync_once(&cfg, key.clone(), &store, &registry, &metrics).await;
                if summary.peers > 0 {
                    info!(
                        peers = summary.peers,
                        batches = summary.batches_imported,
                        records = summary.records_imported,
                        failures = summary.failures,
                        "sync round done"
                    );
                }
            }
            _ = crawl_timer.tick() => {
                let summary = crawl_once(&cfg, key.clone(), &store, &metrics, &chain_lock).await;
                if summary.records_stored > 0 || summary.failures > 0 {
                    info!(
                        records = summary.records_stored,
                        failures = summary.failures,
                        batch = summary.published_batch.as_deref().unwrap_or("-"),
                        "crawl cycle done"
                    );
                }
            }
        }
    }

    server_task.abort();
    Ok(())
}
