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

use truthcrawl::core::batch::{BatchManifest, GENESIS_ROOT};
use truthcrawl::core::crypto::NodeKey;
use truthcrawl::core::publish::{read_batch_dir, BatchPublisher, BatchVerifier, Commitment};

const LEAF_A: &str = "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb";
const LEAF_B: &str = "3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d";
const LEAF_C: &str = "2e7d2c03a9507ae265ecf5b5356885a53393a2029d241394997265a1a25aefc6";

fn manifest() -> BatchManifest {
    BatchManifest::new(vec![LEAF_A.to_string(), LEAF_B.to_string(), LEAF_C.to_string()]).unwrap()
}

#[test]
fn test_publish_writes_three_files_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = BatchPublisher::new(dir.path().join("batches"));
    let key = NodeKey::generate().unwrap();

    publisher.publish_link(&key, "2024-01-15", &manifest(), GENESIS_ROOT).unwrap();

    let batch_dir = publisher.batch_dir("2024-01-15");
    assert!(batch_dir.join("manifest.txt").exists());
    assert!(batch_dir.join("chain-link.txt").exists());
    assert!(batch_dir.join("signature.txt").exists());
    // signature.txt carries a trailing LF.
    let sig = std::fs::read_to_string(batch_dir.join("signature.txt")).unwrap();
    assert!(sig.ends_with('\n'));
    // No temp directory left behind.
    assert!(!dir.path().join("batches").join(".tmp-batch-2024-01-15").exists());

    let files = read_batch_dir(&batch_dir).unwrap();
    let Commitment::Link(link) = &files.commitment else {
        panic!("expected chain link");
    };
    let report =
        BatchVerifier::verify_link(link, &files.manifest, &files.signature, &key.public_key());
    assert!(report.valid(), "unexpected errors: {:?}", report.errors);
}

#[test]
fn test_tampered_manifest_reports_every_broken_check() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = BatchPublisher::new(dir.path().join("batches"));
    let key = NodeKey::generate().unwrap();

    publisher.publish_link(&key, "2024-01-15", &manifest(), GENESIS_ROOT).unwrap();
    let batch_dir = publisher.batch_dir("2024-01-15");

    // Replace the manifest with a single all-zero line.
    std::fs::write(batch_dir.join("manifest.txt"), format!("{}\n", "0".repeat(64))).unwrap();

    let files = read_batch_dir(&batch_dir).unwrap();
    let Commitment::Link(link) = &files.commitment else {
        panic!("expected chain link");
    };
    let report =
        BatchVerifier::verify_link(link, &files.manifest, &files.signature, &key.public_key());

    assert!(!report.valid());
    // Checks are independent: all three data checks must be enumerated.
    assert!(report.errors.iter().any(|e| e.contains("merkle root")), "{:?}", report.errors);
    assert!(report.errors.iter().any(|e| e.contains("manifest hash")), "{:?}", report.errors);
    assert!(report.errors.iter().any(|e| e.contains("record count")), "{:?}", report.errors);
    // The signature still covers the untouched chain link.
    assert!(!report.errors.iter().any(|e| e.contains("signature")), "{:?}", report.errors);
}

#[test]
fn test_foreign_key_fails_signature_only() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = BatchPublisher::new(dir.path().join("batches"));
    let key = NodeKey::generate().unwrap();
    let other = NodeKey::generate().unwrap();

    publisher.publish_link(&key, "2024-01-15", &manifest(), GENESIS_ROOT).unwrap();
    let files = read_batch_dir(&publisher.batch_dir("2024-01-15")).unwrap();
    let Commitment::Link(link) = &files.commitment else {
        panic!("expected chain link");
    };

    let report =
        BatchVerifier::verify_link(link, &files.manifest, &files.signature, &other.public_key());
    assert_eq!(report.errors, vec!["signature invalid".to_string()]);
}
