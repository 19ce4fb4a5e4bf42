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

use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Prometheus registration or encoding failed.
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Records admitted to the store.
    pub records_stored_total: IntCounter,
    /// Chain links published.
    pub batches_published_total: IntCounter,
    /// Batches imported from peers.
    pub batches_imported_total: IntCounter,
    /// Completed sync rounds.
    pub sync_rounds_total: IntCounter,
    /// Per-peer sync failures.
    pub sync_errors_total: IntCounter,
    /// URLs fetched by the crawl loop.
    pub crawl_fetch_total: IntCounter,
    /// Crawl fetch failures.
    pub crawl_errors_total: IntCounter,
    /// API requests served.
    pub http_requests_total: IntCounter,
    /// Known peers gauge.
    pub peers: IntGauge,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let records_stored_total =
            IntCounter::new("truthcrawl_records_stored_total", "Records admitted to the store")
                .map_err(|_| MetricsError::Prom)?;
        let batches_published_total =
            IntCounter::new("truthcrawl_batches_published_total", "Chain links published")
                .map_err(|_| MetricsError::Prom)?;
        let batches_imported_total =
            IntCounter::new("truthcrawl_batches_imported_total", "Batches imported from peers")
                .map_err(|_| MetricsError::Prom)?;
        let sync_rounds_total =
            IntCounter::new("truthcrawl_sync_rounds_total", "Completed sync rounds")
                .map_err(|_| MetricsError::Prom)?;
        let sync_errors_total =
            IntCounter::new("truthcrawl_sync_errors_total", "Per-peer sync failures")
                .map_err(|_| MetricsError::Prom)?;
        let crawl_fetch_total =
            IntCounter::new("truthcrawl_crawl_fetch_total", "URLs fetched by the crawl loop")
                .map_err(|_| MetricsError::Prom)?;
        let crawl_errors_total =
            IntCounter::new("truthcrawl_crawl_errors_total", "Crawl fetch failures")
                .map_err(|_| MetricsError::Prom)?;
        let http_requests_total =
            IntCounter::new("truthcrawl_http_requests_total", "API requests served")
                .map_err(|_| MetricsError::Prom)?;
        let peers =
            IntGauge::new("truthcrawl_peers", "Known peers").map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(records_stored_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(batches_published_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(batches_imported_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(sync_rounds_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(sync_errors_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(crawl_fetch_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(crawl_errors_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(peers.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            records_stored_total,
            batches_published_total,
            batches_imported_total,
            sync_rounds_total,
            sync_errors_total,
            crawl_fetch_total,
            crawl_errors_total,
            http_requests_total,
            peers,
        })
    }

    /// Render the registry in Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|_| MetricsError::Prom)
    }
}
