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

//! Truthcrawl - a decentralized, verifiable web-observation log.
//!
//! This crate provides:
//! - Canonical text serialization and strict parsing for every persisted entity
//! - SHA-256 / Ed25519 primitives and key fingerprints
//! - A Merkle commitment over batched observation records, with inclusion proofs
//! - A content-addressed record store with rebuildable indices
//! - Signed, back-referenced batch chains plus batch/chain verifiers
//! - A deterministic audit sampler and verification pipeline
//! - Dispute resolution by majority consensus and derived node reputation
//! - Signed timestamp-authority tokens
//! - A node daemon (HTTP API, peer sync loop, crawl loop)

/// Core protocol primitives (codec, crypto, merkle, records, batches, audits).
pub mod core;
/// Observability (Prometheus metrics).
pub mod monitoring;
/// Node shell (config, HTTP server/client, peer registry, daemon loops).
pub mod node;
