// Copyright (c) 2026 Truthcrawl
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;

use truthcrawl::core::batch::{BatchManifest, BatchMetadata, ChainLink, GENESIS_ROOT};
use truthcrawl::core::codec::now_utc;
use truthcrawl::core::crypto::{sha256_hex, NodeKey};
use truthcrawl::core::record::{ObservationRecord, RecordDraft};

// Values that survive the canonical line discipline: no LF, no leading or
// trailing whitespace, no ':' ambiguity concerns for free-form fields.
fn token() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./-]{1,24}".prop_map(|s| s)
}

fn url() -> impl Strategy<Value = String> {
    ("[a-z]{3,10}", "[a-z0-9/-]{0,20}").prop_map(|(host, path)| format!("https://{host}.example/{path}"))
}

proptest! {
    #[test]
    fn record_roundtrips_and_hash_is_stable(
        u in url(),
        fu in url(),
        status in 100u16..=599,
        fetch_ms in 0u64..60_000,
        body in proptest::collection::vec(any::<u8>(), 0..128),
        directive in token(),
        links in proptest::collection::vec(url(), 0..6),
    ) {
        let key = NodeKey::generate().unwrap();
        let record = RecordDraft {
            observed_at: now_utc(),
            url: u,
            final_url: fu,
            status_code: status,
            fetch_ms,
            content_hash: sha256_hex(&body),
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            canonical: directive,
            robots_meta: String::new(),
            robots_header: "noindex".to_string(),
            links,
        }
        .sign(&key)
        .unwrap();

        // parse(emit(r)) == r, as values.
        let parsed = ObservationRecord::parse(&record.full_text()).unwrap();
        prop_assert_eq!(&parsed, &record);

        // recordHash(r) == SHA-256 of the canonical text minus the signature.
        prop_assert_eq!(record.record_hash(), sha256_hex(record.signing_text().as_bytes()));
        prop_assert!(parsed.verify_signature(&key.public_key()).is_ok());
    }

    #[test]
    fn manifest_metadata_link_roundtrip(hashes in proptest::collection::vec(any::<[u8; 32]>().prop_map(hex::encode), 1..16)) {
        let manifest = BatchManifest::new(hashes).unwrap();
        let reparsed = BatchManifest::parse(&manifest.canonical_text()).unwrap();
        prop_assert_eq!(&reparsed, &manifest);

        let meta = BatchMetadata::from_manifest("2024-01-15", &manifest).unwrap();
        prop_assert_eq!(&BatchMetadata::parse(&meta.canonical_text()).unwrap(), &meta);

        let link = ChainLink::from_manifest("2024-01-15", &manifest, GENESIS_ROOT).unwrap();
        prop_assert_eq!(&ChainLink::parse(&link.canonical_text()).unwrap(), &link);
    }
}
