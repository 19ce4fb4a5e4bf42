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

use std::collections::BTreeMap;

use truthcrawl::core::codec::now_utc;
use truthcrawl::core::crypto::{sha256_hex, NodeKey};
use truthcrawl::core::dispute::{
    DisputeError, DisputeRecord, DisputeResolver, ObservationSet, Outcome,
};
use truthcrawl::core::record::{ObservationRecord, RecordDraft};
use truthcrawl::core::reputation::NodeReputation;

const URL: &str = "https://example.com";

fn observe(key: &NodeKey, status_code: u16, body: &[u8]) -> ObservationRecord {
    RecordDraft {
        observed_at: now_utc(),
        url: URL.to_string(),
        final_url: format!("{URL}/"),
        status_code,
        fetch_ms: 10,
        content_hash: sha256_hex(body),
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
fn test_dispute_upheld_by_majority() {
    let (a, b, c) =
        (NodeKey::generate().unwrap(), NodeKey::generate().unwrap(), NodeKey::generate().unwrap());
    let challenged = observe(&a, 404, b"hash-x");
    let challenger = observe(&b, 200, b"hash-y");
    let third = observe(&c, 200, b"hash-y");

    let dispute = DisputeRecord::file(
        &challenged.record_hash(),
        &challenger.record_hash(),
        URL,
        now_utc(),
        &b,
    );
    let set =
        ObservationSet::of(vec![challenged.clone(), challenger.clone(), third.clone()]).unwrap();
    let resolution = DisputeResolver::resolve(&dispute, &set, now_utc()).unwrap();

    assert_eq!(resolution.outcome, Outcome::Upheld);
    assert_eq!(resolution.observations_count, 3);

    let mut expected_majority = vec![b.fingerprint(), c.fingerprint()];
    expected_majority.sort();
    assert_eq!(resolution.majority_nodes, expected_majority);
    assert_eq!(resolution.minority_nodes, vec![a.fingerprint()]);

    // The status_code tally records the winning value and the challenged one.
    let status = resolution.fields.iter().find(|f| f.field == "status_code").unwrap();
    assert_eq!(status.majority.as_deref(), Some("200"));
    assert_eq!(status.count, 2);
    assert_eq!(status.total, 3);
    assert_eq!(status.challenged, "404");

    // Round-trips as canonical text.
    let parsed =
        truthcrawl::core::dispute::Resolution::parse(&resolution.canonical_text()).unwrap();
    assert_eq!(parsed, resolution);
}

#[test]
fn test_dispute_dismissed_when_all_agree() {
    let (a, b, c) =
        (NodeKey::generate().unwrap(), NodeKey::generate().unwrap(), NodeKey::generate().unwrap());
    let challenged = observe(&a, 200, b"hash-y");
    let challenger = observe(&b, 200, b"hash-y");
    let third = observe(&c, 200, b"hash-y");

    let dispute = DisputeRecord::file(
        &challenged.record_hash(),
        &challenger.record_hash(),
        URL,
        now_utc(),
        &b,
    );
    let set = ObservationSet::of(vec![challenged, challenger, third]).unwrap();
    let resolution = DisputeResolver::resolve(&dispute, &set, now_utc()).unwrap();

    assert_eq!(resolution.outcome, Outcome::Dismissed);
    assert!(resolution.majority_nodes.is_empty());
    assert!(resolution.minority_nodes.is_empty());
}

#[test]
fn test_even_split_is_inconclusive() {
    let keys: Vec<NodeKey> = (0..4).map(|_| NodeKey::generate().unwrap()).collect();
    let challenged = observe(&keys[0], 404, b"hash-x");
    let records = vec![
        challenged.clone(),
        observe(&keys[1], 404, b"hash-x"),
        observe(&keys[2], 200, b"hash-y"),
        observe(&keys[3], 200, b"hash-y"),
    ];

    let dispute = DisputeRecord::file(
        &challenged.record_hash(),
        &records[2].record_hash(),
        URL,
        now_utc(),
        &keys[2],
    );
    let set = ObservationSet::of(records).unwrap();
    let resolution = DisputeResolver::resolve(&dispute, &set, now_utc()).unwrap();

    assert_eq!(resolution.outcome, Outcome::Inconclusive);
    let status = resolution.fields.iter().find(|f| f.field == "status_code").unwrap();
    assert_eq!(status.majority, None);
}

#[test]
fn test_observation_set_requirements() {
    let (a, b) = (NodeKey::generate().unwrap(), NodeKey::generate().unwrap());

    // Fewer than three records.
    let r1 = observe(&a, 200, b"y");
    let r2 = observe(&b, 200, b"y");
    assert!(matches!(
        ObservationSet::of(vec![r1.clone(), r2.clone()]),
        Err(DisputeError::InsufficientObservations(_))
    ));

    // Duplicate (node_id, url).
    let dup = observe(&a, 404, b"x");
    assert!(matches!(
        ObservationSet::of(vec![r1.clone(), r2.clone(), dup]),
        Err(DisputeError::InsufficientObservations(_))
    ));

    // Mixed URLs.
    let c = NodeKey::generate().unwrap();
    let other = RecordDraft {
        observed_at: now_utc(),
        url: "https://other.example".to_string(),
        final_url: "https://other.example/".to_string(),
        status_code: 200,
        fetch_ms: 5,
        content_hash: sha256_hex(b"y"),
        headers: Vec::new(),
        canonical: String::new(),
        robots_meta: String::new(),
        robots_header: String::new(),
        links: Vec::new(),
    };
    let r3 = other.sign(&c).unwrap();
    assert!(matches!(
        ObservationSet::of(vec![r1, r2, r3]),
        Err(DisputeError::InsufficientObservations(_))
    ));
}

#[test]
fn test_challenged_record_must_be_in_the_set() {
    let keys: Vec<NodeKey> = (0..3).map(|_| NodeKey::generate().unwrap()).collect();
    let records: Vec<ObservationRecord> =
        keys.iter().map(|k| observe(k, 200, b"y")).collect();
    let dispute = DisputeRecord::file(
        &sha256_hex(b"absent"),
        &records[0].record_hash(),
        URL,
        now_utc(),
        &keys[0],
    );
    let set = ObservationSet::of(records).unwrap();
    assert!(matches!(
        DisputeResolver::resolve(&dispute, &set, now_utc()),
        Err(DisputeError::ChallengedNotInSet)
    ));
}

#[test]
fn test_reputation_fold_over_resolutions() {
    let (a, b, c) =
        (NodeKey::generate().unwrap(), NodeKey::generate().unwrap(), NodeKey::generate().unwrap());
    let challenged = observe(&a, 404, b"hash-x");
    let challenger = observe(&b, 200, b"hash-y");
    let third = observe(&c, 200, b"hash-y");

    let dispute = DisputeRecord::file(
        &challenged.record_hash(),
        &challenger.record_hash(),
        URL,
        now_utc(),
        &b,
    );
    let set = ObservationSet::of(vec![challenged, challenger, third]).unwrap();
    let resolution = DisputeResolver::resolve(&dispute, &set, now_utc()).unwrap();

    let table = NodeReputation::compute(&[resolution], &BTreeMap::new());
    assert_eq!(table[&b.fingerprint()].wins, 1);
    assert_eq!(table[&c.fingerprint()].wins, 1);
    assert_eq!(table[&a.fingerprint()].losses, 1);
    assert_eq!(table[&a.fingerprint()].wins, 0);

    // The rendered table is derived, deterministic, and re-derivable.
    let text = NodeReputation::table_text(&table);
    assert_eq!(text, NodeReputation::table_text(&table));
    assert_eq!(text.lines().count(), 3);
}
