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

//! Crawl cycle: fetch, sign, store, publish, timestamp.
//!
//! One cycle reads `urls.txt`, observes every URL, and seals the new
//! records into one chain-linked batch. A failing URL is logged and
//! skipped; partial work is harmless because the store is append-only and
//! the next cycle picks unpublished records up again only if re-observed.

use crate::core::batch::BatchManifest;
use crate::core::codec::now_utc;
use crate::core::crypto::NodeKey;
use crate::core::publish::BatchPublisher;
use crate::core::store::RecordStore;
use crate::core::timestamp::{TimestampAuthority, TimestampStore};
use crate::monitoring::metrics::Metrics;
use crate::node::config::{parse_url_list, NodeConfig};
use crate::node::fetch::{draft_from_page, Fetcher};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Result of one crawl cycle.
#[derive(Clone, Debug, Default)]
pub struct CrawlSummary {
    /// URLs observed and stored.
    pub records_stored: usize,
    /// URLs that failed to fetch or sign.
    pub failures: usize,
    /// Batch id published, if any records were stored.
    pub published_batch: Option<String>,
}

/// Run one crawl cycle.
///
/// `chain_lock` serializes "scan latest root + publish" so the new link's
/// `previous_root` always references the true chain tail.
pub async fn crawl_once(
    cfg: &NodeConfig,
    key: Arc<NodeKey>,
    store: &RecordStore,
    metrics: &Metrics,
    chain_lock: &Mutex<()>,
) -> CrawlSummary {
    let mut summary = CrawlSummary::default();

    let urls = match tokio::fs::read_to_string(cfg.urls_file()).await {
        Ok(text) => parse_url_list(&text),
        Err(_) => {
            info!("no urls.txt; crawl cycle idle");
            return summary;
        }
    };
    if urls.is_empty() {
        return summary;
    }

    let fetcher = match Fetcher::new() {
        Ok(f) => f,
        Err(e) => {
            warn!(err = %e, "fetcher unavailable; skipping crawl cycle");
            return summary;
        }
    };

    let mut hashes = Vec::new();
    for url in &urls {
        metrics.crawl_fetch_total.inc();
        let page = match fetcher.fetch(url).await {
            Ok(p) => p,
            Err(e) => {
                warn!(url = %url, err = %e, "fetch failed");
                metrics.crawl_errors_total.inc();
                summary.failures += 1;
                continue;
            }
        };
        let record = match draft_from_page(&page).sign(&key) {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, err = %e, "record rejected");
                metrics.crawl_errors_total.inc();
                summary.failures += 1;
                continue;
            }
        };
        match store.store(&record) {
            Ok(hash) => {
                metrics.records_stored_total.inc();
                summary.records_stored += 1;
                hashes.push(hash);
            }
            Err(e) => {
                warn!(url = %url, err = %e, "store failed");
                summary.failures += 1;
            }
        }
    }

    if hashes.is_empty() {
        return summary;
    }

    match publish_cycle(cfg, &key, hashes, chain_lock).await {
        Ok(batch_id) => {
            metrics.batches_published_total.inc();
            info!(batch = %batch_id, records = summary.records_stored, "batch published");
            summary.published_batch = Some(batch_id);
        }
        Err(e) => warn!(err = %e, "batch publication failed"),
    }

    summary
}

/// Seal this cycle's record hashes into one chain-linked batch and
/// timestamp the new link. Holds the chain lock across tail scan + write.
async fn publish_cycle(
    cfg: &NodeConfig,
    key: &NodeKey,
    hashes: Vec<String>,
    chain_lock: &Mutex<()>,
) -> anyhow::Result<String> {
    let manifest = BatchManifest::new(hashes)?;
    let publisher = BatchPublisher::new(cfg.batches_dir());

    let _guard = chain_lock.lock().await;
    let previous_root = publisher.latest_root()?;
    let batch_id = publisher.next_batch_id(now_utc().date_naive())?;
    let link = publisher.publish_link(key, &batch_id, &manifest, &previous_root)?;

    // Self-attested existence token for the sealed link.
    let tsa = TimestampAuthority::new(NodeKey::from_pkcs8(key.pkcs8())?);
    let token = tsa.issue(&link.link_hash(), now_utc())?;
    TimestampStore::new(cfg.timestamps_dir()).store(&token)?;

    Ok(batch_id)
}
