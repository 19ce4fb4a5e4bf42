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

//! Truthcrawl command-line front-end.
//!
//! Exit codes, uniform across subcommands: 0 success, 1 usage error,
//! 2 I/O or parse error, 3 verification failed.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use truthcrawl::core::audit::{VerificationPipeline, VerificationStatus, DEFAULT_MAX_SAMPLE};
use truthcrawl::core::batch::BatchManifest;
use truthcrawl::core::bundle::{BatchExporter, BatchImporter};
use truthcrawl::core::codec::now_utc;
use truthcrawl::core::dispute::{DisputeRecord, DisputeResolver, ObservationSet};
use truthcrawl::core::keys::{load_keypair, load_or_create_keypair, load_own_public_key, load_public_key};
use truthcrawl::core::profile::{CrawlAttestation, NodeProfile, NodeRegistration, PeerInfo};
use truthcrawl::core::publish::{read_batch_dir, BatchPublisher, BatchVerifier, ChainVerifier, Commitment};
use truthcrawl::core::record::ObservationRecord;
use truthcrawl::core::store::{IndexBuilder, RecordStore};
use truthcrawl::monitoring::metrics::Metrics;
use truthcrawl::node::config::NodeConfig;
use truthcrawl::node::crawl::crawl_once;
use truthcrawl::node::daemon;
use truthcrawl::node::peers::PeerRegistry;
use truthcrawl::node::sync::sync_once;

#[derive(Parser)]
#[command(name = "truthcrawl", version, about = "Decentralized verifiable web-observation log")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate node keys under the data directory.
    Keygen,
    /// Run one crawl cycle: fetch urls.txt, sign, store, publish a batch.
    Crawl,
    /// Run one sync round against the peer registry.
    Sync,
    /// Publish a batch from a manifest file as a new chain link.
    PublishBatch {
        /// Manifest file (one 64-hex record hash per line).
        #[arg(long)]
        manifest: PathBuf,
        /// Batch id; defaults to the next free id for today.
        #[arg(long)]
        batch_id: Option<String>,
    },
    /// Verify one published batch directory.
    VerifyBatch {
        /// Batch id under the batches directory.
        #[arg(long)]
        batch_id: String,
        /// Publisher public-key file; defaults to this node's key.
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Verify the whole chain under the batches directory.
    VerifyChain {
        /// Publisher public-key file; defaults to this node's key.
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Audit one batch against the local store.
    VerifyPipeline {
        /// Batch id under the batches directory.
        #[arg(long)]
        batch_id: String,
        /// Auditor seed.
        #[arg(long, default_value = "")]
        seed: String,
        /// Sample ceiling.
        #[arg(long, default_value_t = DEFAULT_MAX_SAMPLE)]
        max_sample: usize,
    },
    /// Export a batch plus its records as a self-contained bundle.
    ExportBatch {
        /// Batch id under the batches directory.
        #[arg(long)]
        batch_id: String,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
    },
    /// Import an exported bundle into the local store.
    ImportBatch {
        /// Bundle directory.
        #[arg(long)]
        dir: PathBuf,
        /// Publisher public-key file.
        #[arg(long)]
        key: PathBuf,
    },
    /// Create (or extend) this node's signed profile.
    Register {
        /// Operator display name.
        #[arg(long)]
        operator: String,
        /// Operator organization.
        #[arg(long, default_value = "")]
        organization: String,
        /// Contact address.
        #[arg(long, default_value = "")]
        email: String,
        /// Domains to attest crawling for (repeatable).
        #[arg(long)]
        domain: Vec<String>,
    },
    /// Add a peer to the registry.
    AddPeer {
        /// Peer endpoint base URL.
        #[arg(long)]
        endpoint: String,
        /// Peer public-key file (Base64 one-per-file).
        #[arg(long)]
        key: PathBuf,
    },
    /// Resolve a dispute against the local store's observations.
    ResolveDispute {
        /// Canonical dispute file.
        #[arg(long)]
        dispute: PathBuf,
    },
    /// Run the long-lived node (API + sync loop + crawl loop).
    Node,
}

enum CmdError {
    Io(String),
    Verify(String),
}

impl From<anyhow::Error> for CmdError {
    fn from(e: anyhow::Error) -> Self {
        CmdError::Io(format!("{e:#}"))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "truthcrawl=info".to_string()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap renders --help/--version through the same path.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let cfg = NodeConfig::from_env();
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("runtime: {e}");
            std::process::exit(2);
        }
    };

    let result = rt.block_on(dispatch(cli.command, cfg));
    match result {
        Ok(()) => {}
        Err(CmdError::Io(msg)) => {
            eprintln!("error: {msg}");
            std::process::exit(2);
        }
        Err(CmdError::Verify(msg)) => {
            eprintln!("FAIL: {msg}");
            std::process::exit(3);
        }
    }
}

async fn dispatch(command: Command, cfg: NodeConfig) -> Result<(), CmdError> {
    match command {
        Command::Keygen => {
            let key = load_or_create_keypair(&cfg.data_dir())
                .map_err(|e| CmdError::Io(e.to_string()))?;
            println!("{}", key.fingerprint());
            Ok(())
        }

        Command::Crawl => {
            let key = Arc::new(
                load_or_create_keypair(&cfg.data_dir()).map_err(|e| CmdError::Io(e.to_string()))?,
            );
            let store = RecordStore::new(cfg.store_dir());
            let metrics = Metrics::new().map_err(|e| CmdError::Io(e.to_string()))?;
            let chain_lock = tokio::sync::Mutex::new(());
            let summary = crawl_once(&cfg, key, &store, &metrics, &chain_lock).await;
            println!(
                "stored:{} failures:{} batch:{}",
                summary.records_stored,
                summary.failures,
                summary.published_batch.as_deref().unwrap_or("-")
            );
            Ok(())
        }

        Command::Sync => {
            let key = Arc::new(
                load_or_create_keypair(&cfg.data_dir()).map_err(|e| CmdError::Io(e.to_string()))?,
            );
            let store = RecordStore::new(cfg.store_dir());
            let registry = PeerRegistry::new(cfg.peers_dir());
            let metrics = Metrics::new().map_err(|e| CmdError::Io(e.to_string()))?;
            let summary = sync_once(&cfg, key, &store, &registry, &metrics).await;
            println!(
                "peers:{} batches:{} records:{} failures:{}",
                summary.peers, summary.batches_imported, summary.records_imported, summary.failures
            );
            Ok(())
        }

        Command::PublishBatch { manifest, batch_id } => {
            let key =
                load_keypair(&cfg.data_dir()).map_err(|e| CmdError::Io(e.to_string()))?;
            let text = std::fs::read_to_string(&manifest)
                .map_err(|e| CmdError::Io(format!("read manifest: {e}")))?;
            let manifest =
                BatchManifest::parse(&text).map_err(|e| CmdError::Io(e.to_string()))?;

            let publisher = BatchPublisher::new(cfg.batches_dir());
            let previous_root =
                publisher.latest_root().map_err(|e| CmdError::Io(e.to_string()))?;
            let batch_id = match batch_id {
                Some(id) => id,
                None => publisher
                    .next_batch_id(now_utc().date_naive())
                    .map_err(|e| CmdError::Io(e.to_string()))?,
            };
            let link = publisher
                .publish_link(&key, &batch_id, &manifest, &previous_root)
                .map_err(|e| CmdError::Io(e.to_string()))?;
            println!("published batch {batch_id} merkle_root:{}", link.merkle_root);
            Ok(())
        }

        Command::VerifyBatch { batch_id, key } => {
            let public_key = load_verify_key(&cfg, key)?;
            let dir = BatchPublisher::new(cfg.batches_dir()).batch_dir(&batch_id);
            let files = read_batch_dir(&dir).map_err(|e| CmdError::Io(e.to_string()))?;
            let report = match &files.commitment {
                Commitment::Link(link) => BatchVerifier::verify_link(
                    link,
                    &files.manifest,
                    &files.signature,
                    &public_key,
                ),
                Commitment::Metadata(meta) => {
                    BatchVerifier::verify(meta, &files.manifest, &files.signature, &public_key)
                }
            };
            if report.valid() {
                println!("PASS {batch_id}");
                Ok(())
            } else {
                Err(CmdError::Verify(report.errors.join("; ")))
            }
        }

        Command::VerifyChain { key } => {
            let public_key = load_verify_key(&cfg, key)?;
            let publisher = BatchPublisher::new(cfg.batches_dir());
            let ids = publisher.list_batch_ids().map_err(|e| CmdError::Io(e.to_string()))?;

            let mut links = Vec::new();
            let mut manifests = Vec::new();
            let mut signatures = Vec::new();
            for id in &ids {
                let files = read_batch_dir(&publisher.batch_dir(id))
                    .map_err(|e| CmdError::Io(e.to_string()))?;
                let Commitment::Link(link) = files.commitment else {
                    return Err(CmdError::Io(format!("batch {id} has no chain link")));
                };
                links.push(link);
                manifests.push(files.manifest);
                signatures.push(files.signature);
            }

            let report = ChainVerifier::verify(&links, &manifests, &signatures, &public_key);
            if report.valid() {
                println!("PASS chain of {} links", links.len());
                Ok(())
            } else {
                Err(CmdError::Verify(report.errors.join("; ")))
            }
        }

        Command::VerifyPipeline { batch_id, seed, max_sample } => {
            let publisher = BatchPublisher::new(cfg.batches_dir());
            let files = read_batch_dir(&publisher.batch_dir(&batch_id))
                .map_err(|e| CmdError::Io(e.to_string()))?;
            let metadata = files.commitment.metadata();
            let store = RecordStore::new(cfg.store_dir());

            let result = VerificationPipeline::run(
                &files.manifest,
                &metadata.merkle_root,
                &seed,
                max_sample,
                &store,
            )
            .map_err(|e| CmdError::Io(e.to_string()))?;
            let status = VerificationStatus::from_result(&batch_id, &result, now_utc());
            status
                .save(&cfg.verification_dir())
                .map_err(|e| CmdError::Io(e.to_string()))?;

            print!("{}", status.canonical_text());
            if matches!(status.status, truthcrawl::core::audit::AuditStatus::VerifiedClean) {
                Ok(())
            } else {
                Err(CmdError::Verify(format!("status {:?}", status.status)))
            }
        }

        Command::ExportBatch { batch_id, out } => {
            let dir = BatchPublisher::new(cfg.batches_dir()).batch_dir(&batch_id);
            let store = RecordStore::new(cfg.store_dir());
            let count = BatchExporter::export(&dir, &store, &out)
                .map_err(|e| CmdError::Io(e.to_string()))?;
            println!("exported batch {batch_id} ({count} records)");
            Ok(())
        }

        Command::ImportBatch { dir, key } => {
            let public_key =
                load_public_key(&key).map_err(|e| CmdError::Io(e.to_string()))?;
            let store = RecordStore::new(cfg.store_dir());
            let receipt = BatchImporter::import_batch(&dir, &store, &public_key)
                .map_err(|e| CmdError::Io(e.to_string()))?;
            print!("{}", receipt.canonical_text());
            if receipt.valid {
                Ok(())
            } else {
                Err(CmdError::Verify(receipt.errors.join("; ")))
            }
        }

        Command::Register { operator, organization, email, domain } => {
            let key = load_or_create_keypair(&cfg.data_dir())
                .map_err(|e| CmdError::Io(e.to_string()))?;
            let registration =
                NodeRegistration::create(&operator, &organization, &email, now_utc(), &key);
            let attestation =
                (!domain.is_empty()).then(|| CrawlAttestation::create(domain, now_utc(), &key));
            let profile = NodeProfile { registration, attestation };

            let dir = cfg.profiles_dir();
            std::fs::create_dir_all(&dir).map_err(|e| CmdError::Io(e.to_string()))?;
            let path = dir.join(format!("{}.txt", key.fingerprint()));
            std::fs::write(&path, profile.canonical_text())
                .map_err(|e| CmdError::Io(e.to_string()))?;
            println!("profile written: {}", path.display());
            Ok(())
        }

        Command::AddPeer { endpoint, key } => {
            let public_key =
                load_public_key(&key).map_err(|e| CmdError::Io(e.to_string()))?;
            let peer = PeerInfo {
                node_id: truthcrawl::core::crypto::fingerprint_hex(&public_key),
                endpoint_url: endpoint,
                public_key,
            };
            PeerRegistry::new(cfg.peers_dir())
                .add(&peer)
                .map_err(|e| CmdError::Io(e.to_string()))?;
            println!("peer added: {}", peer.node_id);
            Ok(())
        }

        Command::ResolveDispute { dispute } => {
            let text = std::fs::read_to_string(&dispute)
                .map_err(|e| CmdError::Io(format!("read dispute: {e}")))?;
            let dispute =
                DisputeRecord::parse(&text).map_err(|e| CmdError::Io(e.to_string()))?;

            let store = RecordStore::new(cfg.store_dir());
            let index =
                IndexBuilder::build(&store).map_err(|e| CmdError::Io(e.to_string()))?;
            let hashes = index.by_url.get(&dispute.url).cloned().unwrap_or_default();

            // One observation per node: the disputed records themselves
            // where present, otherwise the node's latest.
            let mut by_node: std::collections::BTreeMap<String, (ObservationRecord, bool)> =
                std::collections::BTreeMap::new();
            for hash in &hashes {
                let Some(record) =
                    store.load(hash).map_err(|e| CmdError::Io(e.to_string()))?
                else {
                    continue;
                };
                let pinned = *hash == dispute.challenged_record_hash
                    || *hash == dispute.challenger_record_hash;
                let replace = match by_node.get(&record.node_id) {
                    None => true,
                    Some((_, true)) => false,
                    Some((kept, false)) => pinned || record.observed_at > kept.observed_at,
                };
                if replace {
                    by_node.insert(record.node_id.clone(), (record, pinned));
                }
            }
            let records: Vec<ObservationRecord> =
                by_node.into_values().map(|(record, _)| record).collect();

            let set = ObservationSet::of(records)
                .map_err(|e| CmdError::Verify(e.to_string()))?;
            let resolution = DisputeResolver::resolve(&dispute, &set, now_utc())
                .map_err(|e| CmdError::Verify(e.to_string()))?;
            print!("{}", resolution.canonical_text());
            Ok(())
        }

        Command::Node => daemon::run(cfg).await.map_err(CmdError::from),
    }
}

fn load_verify_key(
    cfg: &NodeConfig,
    key: Option<PathBuf>,
) -> Result<[u8; 32], CmdError> {
    match key {
        Some(path) => load_public_key(&path).map_err(|e| CmdError::Io(e.to_string())),
        None => load_own_public_key(&cfg.data_dir()).map_err(|e| CmdError::Io(e.to_string())),
    }
}
