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

use truthcrawl::core::audit::{
    sample, AuditStatus, Finding, VerificationPipeline, VerificationStatus, DEFAULT_MAX_SAMPLE,
};
use truthcrawl::core::batch::{BatchManifest, GENESIS_ROOT};
use truthcrawl::core::codec::now_utc;
use truthcrawl::core::crypto::{sha256_hex, NodeKey};
use truthcrawl::core::publish::BatchPublisher;
use truthcrawl::core::record::{ObservationRecord, RecordDraft};
use truthcrawl::core::store::RecordStore;

fn observe(key: &NodeKey, url: &str) -> ObservationRecord {
    RecordDraft {
        observed_at: now_utc(),
        url: url.to_string(),
        final_url: url.to_string(),
        status_code: 200,
        fetch_ms: 7,
        content_hash: sha256_hex(url.as_bytes()),
        headers: Vec::new(),
        canonical: String::new(),
        robots_meta: String::new(),
        robots_header: String::new(),
        links: Vec::new(),
    }
    .sign(key)
    .unwrap()
}

#[test]
fn test_clean_pipeline_then_missing_record() {
    let dir = tempfile::tempdir().unwrap();
    let key = NodeKey::generate().unwrap();
    let store = RecordStore::new(dir.path().join("store"));

    // Store one record, commit it as a chained batch.
    let record = observe(&key, "https://example.com");
    let hash = store.store(&record).unwrap();
    let manifest = BatchManifest::new(vec![hash.clone()]).unwrap();
    let publisher = BatchPublisher::new(dir.path().join("batches"));
    let link = publisher.publish_link(&key, "2024-01-15", &manifest, GENESIS_ROOT).unwrap();

    let result = VerificationPipeline::run(
        &manifest,
        &link.merkle_root,
        "any-seed",
        DEFAULT_MAX_SAMPLE,
        &store,
    )
    .unwrap();
    let status = VerificationStatus::from_result("2024-01-15", &result, now_utc());
    assert_eq!(status.status, AuditStatus::VerifiedClean);
    assert_eq!(status.matched, 1);

    let verification_dir = dir.path().join("verification");
    status.save(&verification_dir).unwrap();

    // Delete the stored record file; re-run.
    std::fs::remove_file(store.path_for(&hash).unwrap()).unwrap();
    let result = VerificationPipeline::run(
        &manifest,
        &link.merkle_root,
        "any-seed",
        DEFAULT_MAX_SAMPLE,
        &store,
    )
    .unwrap();
    let status = VerificationStatus::from_result("2024-01-15", &result, now_utc());
    assert_eq!(status.status, AuditStatus::VerifiedWithFindings);
    assert_eq!(status.findings, vec![Finding::RecordMissing(hash)]);

    // Re-verification overwrites the persisted status.
    status.save(&verification_dir).unwrap();
    let loaded = VerificationStatus::load(&verification_dir, "2024-01-15").unwrap().unwrap();
    assert_eq!(loaded.status, AuditStatus::VerifiedWithFindings);
}

#[test]
fn test_root_mismatch_status() {
    let dir = tempfile::tempdir().unwrap();
    let key = NodeKey::generate().unwrap();
    let store = RecordStore::new(dir.path().join("store"));
    let hash = store.store(&observe(&key, "https://example.com")).unwrap();
    let manifest = BatchManifest::new(vec![hash]).unwrap();

    let result =
        VerificationPipeline::run(&manifest, &"f".repeat(64), "seed", DEFAULT_MAX_SAMPLE, &store)
            .unwrap();
    let status = VerificationStatus::from_result("2024-01-15", &result, now_utc());
    assert_eq!(status.status, AuditStatus::RootMismatch);
}

#[test]
fn test_tampered_record_is_a_hash_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let key = NodeKey::generate().unwrap();
    let store = RecordStore::new(dir.path().join("store"));

    let record = observe(&key, "https://example.com");
    let hash = store.store(&record).unwrap();
    let manifest = BatchManifest::new(vec![hash.clone()]).unwrap();
    let root = manifest.merkle_root().unwrap();

    // Overwrite the stored file with a different (valid) record.
    let other = observe(&key, "https://other.example");
    std::fs::write(store.path_for(&hash).unwrap(), other.full_text()).unwrap();

    let result =
        VerificationPipeline::run(&manifest, &root, "seed", DEFAULT_MAX_SAMPLE, &store).unwrap();
    let status = VerificationStatus::from_result("2024-01-15", &result, now_utc());
    assert_eq!(status.status, AuditStatus::VerifiedWithFindings);
    assert_eq!(status.findings, vec![Finding::HashMismatch(hash)]);
}

#[test]
fn test_sampler_is_pure_in_its_inputs() {
    let manifest =
        BatchManifest::new((0u8..20).map(|i| sha256_hex(&[i])).collect()).unwrap();
    let root = manifest.merkle_root().unwrap();

    let a = sample(&manifest, &root, "seed-1", 6);
    let b = sample(&manifest, &root, "seed-1", 6);
    assert_eq!(a, b);
    assert_eq!(a.len(), 6);

    // Every sampled hash comes from the manifest, without repeats.
    let mut dedup = a.clone();
    dedup.sort();
    dedup.dedup();
    assert_eq!(dedup.len(), a.len());
    assert!(a.iter().all(|h| manifest.hashes().contains(h)));

    // Root and seed both shift the permutation.
    assert_ne!(a, sample(&manifest, &root, "seed-2", 6));
    assert_ne!(a, sample(&manifest, &"e".repeat(64), "seed-1", 6));
}
