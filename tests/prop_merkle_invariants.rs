// Copyright (c) 2026 Truthcrawl
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;

use truthcrawl::core::merkle::{compute_root, prove, verify_inclusion};

fn leaf_strategy() -> impl Strategy<Value = String> {
    any::<[u8; 32]>().prop_map(hex::encode)
}

proptest! {
    #[test]
    fn root_is_deterministic(leaves in proptest::collection::vec(leaf_strategy(), 1..64)) {
        let a = compute_root(&leaves).unwrap();
        let b = compute_root(&leaves).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn every_proof_verifies(leaves in proptest::collection::vec(leaf_strategy(), 1..64), pick in any::<proptest::sample::Index>()) {
        let root = compute_root(&leaves).unwrap();
        let idx = pick.index(leaves.len());
        let proof = prove(&leaves, idx).expect("proof exists for in-range index");
        prop_assert!(verify_inclusion(&root, &proof));
    }

    #[test]
    fn changing_any_leaf_changes_the_root(leaves in proptest::collection::vec(leaf_strategy(), 1..32), pick in any::<proptest::sample::Index>()) {
        let root = compute_root(&leaves).unwrap();
        let idx = pick.index(leaves.len());
        let mut mutated = leaves.clone();
        mutated[idx] = hex::encode(truthcrawl::core::crypto::sha256(mutated[idx].as_bytes()));
        prop_assume!(mutated[idx] != leaves[idx]);
        prop_assert_ne!(compute_root(&mutated).unwrap(), root);
    }
}
