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

//! Deterministic Merkle tree over ordered 32-byte leaves.
//!
//! node = SHA-256( left || right )
//!
//! A level with an odd node count duplicates its last node. A single-leaf
//! tree's root is the leaf itself, not re-hashed. The odd-duplication
//! policy has a known second-preimage subtlety (a duplicated last leaf is
//! indistinguishable from that leaf actually appearing twice); accepted
//! for compatibility.

use crate::core::codec::{decode_hex32, encode_hex32};
use crate::core::crypto::sha256;
use thiserror::Error;

/// Merkle errors.
#[derive(Debug, Error)]
pub enum MerkleError {
    /// No leaves were supplied.
    #[error("empty leaf list")]
    EmptyLeaves,
    /// A leaf is not 64-char lowercase hex.
    #[error("invalid leaf hex")]
    InvalidLeaf,
    /// Proof requested for an index outside the leaf list.
    #[error("leaf index out of range")]
    IndexOutOfRange,
}

/// Side of the sibling relative to the accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Sibling hashes on the left.
    Left,
    /// Sibling hashes on the right.
    Right,
}

/// One inclusion-proof step, leaf level upward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofItem {
    /// Where the sibling sits.
    pub side: Side,
    /// Sibling node bytes.
    pub sibling: [u8; 32],
}

/// Merkle inclusion proof for one leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InclusionProof {
    /// The leaf bytes being proven.
    pub leaf: [u8; 32],
    /// Path from leaf level to the root.
    pub path: Vec<ProofItem>,
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    sha256(&buf)
}

fn decode_leaves(leaves: &[String]) -> Result<Vec<[u8; 32]>, MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyLeaves);
    }
    leaves
        .iter()
        .map(|l| decode_hex32(l).map_err(|_| MerkleError::InvalidLeaf))
        .collect()
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0usize;
    while i < level.len() {
        let left = level[i];
        let right = if i + 1 < level.len() { level[i + 1] } else { level[i] };
        next.push(hash_pair(&left, &right));
        i += 2;
    }
    next
}

/// Compute the root over ordered 64-hex leaves, emitted as 64-hex.
pub fn compute_root(leaves: &[String]) -> Result<String, MerkleError> {
    let mut level = decode_leaves(leaves)?;
    while level.len() > 1 {
        level = next_level(&level);
    }
    Ok(encode_hex32(&level[0]))
}

/// Build the inclusion proof for the leaf at `index`.
pub fn prove(leaves: &[String], index: usize) -> Result<InclusionProof, MerkleError> {
    let mut level = decode_leaves(leaves)?;
    if index >= level.len() {
        return Err(MerkleError::IndexOutOfRange);
    }

    let leaf = level[index];
    let mut idx = index;
    let mut path = Vec::new();

    while level.len() > 1 {
        let is_right = idx % 2 == 1;
        let sib_idx = if is_right { idx - 1 } else { idx + 1 };
        let sibling = if sib_idx < level.len() { level[sib_idx] } else { level[idx] };
        path.push(ProofItem {
            side: if is_right { Side::Left } else { Side::Right },
            sibling,
        });
        level = next_level(&level);
        idx /= 2;
    }

    Ok(InclusionProof { leaf, path })
}

/// Fold a proof and compare against the expected 64-hex root.
pub fn verify_inclusion(expected_root: &str, proof: &InclusionProof) -> bool {
    let Ok(root) = decode_hex32(expected_root) else {
        return false;
    };
    let mut cur = proof.leaf;
    for item in &proof.path {
        cur = match item.side {
            Side::Left => hash_pair(&item.sibling, &cur),
            Side::Right => hash_pair(&cur, &item.sibling),
        };
    }
    cur == root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::sha256_hex;

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let leaf = sha256_hex(b"only");
        assert_eq!(compute_root(&[leaf.clone()]).unwrap(), leaf);
    }

    #[test]
    fn empty_leaves_rejected() {
        assert!(matches!(compute_root(&[]), Err(MerkleError::EmptyLeaves)));
    }

    #[test]
    fn proof_roundtrip_all_indices() {
        let leaves: Vec<String> = (0u8..5).map(|i| sha256_hex(&[i])).collect();
        let root = compute_root(&leaves).unwrap();
        for i in 0..leaves.len() {
            let proof = prove(&leaves, i).unwrap();
            assert!(verify_inclusion(&root, &proof), "index {i}");
        }
        assert!(prove(&leaves, 5).is_err());
    }

    #[test]
    fn proof_fails_against_wrong_root() {
        let leaves: Vec<String> = (0u8..4).map(|i| sha256_hex(&[i])).collect();
        let proof = prove(&leaves, 1).unwrap();
        assert!(!verify_inclusion(&"f".repeat(64), &proof));
    }
}
