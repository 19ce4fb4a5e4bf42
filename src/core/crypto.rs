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

//! Hash and signature primitives.
//!
//! SHA-256 and Ed25519 are wired to `ring` throughout the crate. The key
//! fingerprint (`node_id` / `tsa_key_id`) is always SHA-256 of the raw
//! 32 public-key bytes, in lowercase hex - never of a Base64 or hex form.

use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use thiserror::Error;
use zeroize::Zeroizing;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key generation failed.
    #[error("key generation")]
    Keygen,
    /// Key bytes are not a valid Ed25519 key.
    #[error("invalid key encoding")]
    InvalidKey,
    /// Signature does not verify.
    #[error("bad signature")]
    SignatureInvalid,
}

/// SHA-256 digest of raw bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let d = ring::digest::digest(&ring::digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    out
}

/// SHA-256 digest in lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Key fingerprint: SHA-256 of the raw public-key bytes, lowercase hex.
pub fn fingerprint_hex(public_key: &[u8; PUBLIC_KEY_LEN]) -> String {
    sha256_hex(public_key)
}

/// An Ed25519 node keypair.
///
/// Keeps the PKCS#8 document around (zeroized on drop) so the key can be
/// written back to disk by `core::keys`.
pub struct NodeKey {
    keypair: Ed25519KeyPair,
    pkcs8: Zeroizing<Vec<u8>>,
}

impl NodeKey {
    /// Generate a fresh keypair.
    pub fn generate() -> Result<Self, CryptoError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| CryptoError::Keygen)?;
        let keypair =
            Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { keypair, pkcs8: Zeroizing::new(pkcs8.as_ref().to_vec()) })
    }

    /// Load from a PKCS#8 v2 document.
    pub fn from_pkcs8(bytes: &[u8]) -> Result<Self, CryptoError> {
        let keypair = Ed25519KeyPair::from_pkcs8(bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { keypair, pkcs8: Zeroizing::new(bytes.to_vec()) })
    }

    /// The PKCS#8 document (for persistence).
    pub fn pkcs8(&self) -> &[u8] {
        &self.pkcs8
    }

    /// Raw 32-byte public key.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        let pk = self.keypair.public_key().as_ref();
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(pk);
        out
    }

    /// Key fingerprint (`node_id`), lowercase hex.
    pub fn fingerprint(&self) -> String {
        fingerprint_hex(&self.public_key())
    }

    /// Sign a message; returns the raw 64-byte signature.
    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_LEN] {
        let sig = self.keypair.sign(msg);
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(sig.as_ref());
        out
    }
}

/// Verify an Ed25519 signature under raw public-key bytes.
pub fn verify(
    public_key: &[u8; PUBLIC_KEY_LEN],
    msg: &[u8],
    sig: &[u8],
) -> Result<(), CryptoError> {
    if sig.len() != SIGNATURE_LEN {
        return Err(CryptoError::SignatureInvalid);
    }
    let pk = UnparsedPublicKey::new(&ED25519, public_key);
    pk.verify(msg, sig).map_err(|_| CryptoError::SignatureInvalid)
}

/// Interpret a byte slice as raw public-key bytes.
pub fn public_key_from_slice(bytes: &[u8]) -> Result<[u8; PUBLIC_KEY_LEN], CryptoError> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidKey);
    }
    let mut out = [0u8; PUBLIC_KEY_LEN];
    out.copy_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let key = NodeKey::generate().unwrap();
        let sig = key.sign(b"hello");
        assert!(verify(&key.public_key(), b"hello", &sig).is_ok());
        assert!(verify(&key.public_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn fingerprint_is_sha256_of_raw_bytes() {
        let key = NodeKey::generate().unwrap();
        assert_eq!(key.fingerprint(), sha256_hex(&key.public_key()));
        assert_eq!(key.fingerprint().len(), 64);
    }

    #[test]
    fn pkcs8_reload_preserves_identity() {
        let key = NodeKey::generate().unwrap();
        let again = NodeKey::from_pkcs8(key.pkcs8()).unwrap();
        assert_eq!(key.public_key(), again.public_key());
    }
}
