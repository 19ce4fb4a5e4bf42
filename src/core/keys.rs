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

//! Key-file I/O.
//!
//! Keys live under `<data_dir>/keys/`:
//! - `pub.key`  - Base64 of the raw 32-byte Ed25519 public key, trailing LF
//! - `priv.key` - Base64 of the PKCS#8 document, trailing LF, mode 0600
//!
//! Private material is written atomically (temp file + rename) and buffers
//! are zeroized after use.

use crate::core::codec::{decode_base64, encode_base64};
use crate::core::crypto::{public_key_from_slice, NodeKey, PUBLIC_KEY_LEN};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroize;

/// Key-file errors.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Filesystem failure.
    #[error("io")]
    Io,
    /// File contents are not a valid key encoding.
    #[error("invalid key encoding")]
    InvalidKey,
    /// Key files are absent.
    #[error("keys not found")]
    NotFound,
}

/// Directory holding the key files under a data dir.
pub fn keys_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("keys")
}

fn pub_path(data_dir: &Path) -> PathBuf {
    keys_dir(data_dir).join("pub.key")
}

fn priv_path(data_dir: &Path) -> PathBuf {
    keys_dir(data_dir).join("priv.key")
}

fn set_private_perms_best_effort(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
}

/// Atomic write (best-effort fsync, then rename).
fn atomic_write_private(path: &Path, bytes: &[u8]) -> Result<(), KeyError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| KeyError::Io)?;
    }

    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");

    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| KeyError::Io)?;
        f.write_all(bytes).map_err(|_| KeyError::Io)?;
        let _ = f.sync_all();
    }

    set_private_perms_best_effort(&tmp);
    fs::rename(&tmp, path).map_err(|_| KeyError::Io)?;
    set_private_perms_best_effort(path);
    Ok(())
}

/// Write `pub.key` and `priv.key` for a keypair.
pub fn save_keypair(data_dir: &Path, key: &NodeKey) -> Result<(), KeyError> {
    fs::create_dir_all(keys_dir(data_dir)).map_err(|_| KeyError::Io)?;

    let pub_line = format!("{}\n", encode_base64(&key.public_key()));
    fs::write(pub_path(data_dir), pub_line).map_err(|_| KeyError::Io)?;

    let mut priv_line = format!("{}\n", encode_base64(key.pkcs8())).into_bytes();
    let res = atomic_write_private(&priv_path(data_dir), &priv_line);
    priv_line.zeroize();
    res
}

/// Load the keypair from `priv.key`.
pub fn load_keypair(data_dir: &Path) -> Result<NodeKey, KeyError> {
    let path = priv_path(data_dir);
    if !path.exists() {
        return Err(KeyError::NotFound);
    }
    let text = fs::read_to_string(&path).map_err(|_| KeyError::Io)?;
    let mut pkcs8 = decode_base64(text.trim_end()).map_err(|_| KeyError::InvalidKey)?;
    let key = NodeKey::from_pkcs8(&pkcs8).map_err(|_| KeyError::InvalidKey);
    pkcs8.zeroize();
    key
}

/// Load the keypair, generating and persisting one if absent.
pub fn load_or_create_keypair(data_dir: &Path) -> Result<NodeKey, KeyError> {
    match load_keypair(data_dir) {
        Ok(key) => Ok(key),
        Err(KeyError::NotFound) => {
            let key = NodeKey::generate().map_err(|_| KeyError::InvalidKey)?;
            save_keypair(data_dir, &key)?;
            Ok(key)
        }
        Err(e) => Err(e),
    }
}

/// Load a raw public key from a Base64 one-per-file key file.
pub fn load_public_key(path: &Path) -> Result<[u8; PUBLIC_KEY_LEN], KeyError> {
    let text = fs::read_to_string(path).map_err(|_| KeyError::Io)?;
    let raw = decode_base64(text.trim_end()).map_err(|_| KeyError::InvalidKey)?;
    public_key_from_slice(&raw).map_err(|_| KeyError::InvalidKey)
}

/// Load this node's public key from `keys/pub.key`.
pub fn load_own_public_key(data_dir: &Path) -> Result<[u8; PUBLIC_KEY_LEN], KeyError> {
    load_public_key(&pub_path(data_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::fingerprint_hex;

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let key = NodeKey::generate().unwrap();
        save_keypair(dir.path(), &key).unwrap();

        let loaded = load_keypair(dir.path()).unwrap();
        assert_eq!(loaded.public_key(), key.public_key());

        let pk = load_own_public_key(dir.path()).unwrap();
        assert_eq!(fingerprint_hex(&pk), key.fingerprint());
    }

    #[test]
    fn load_or_create_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let a = load_or_create_keypair(dir.path()).unwrap();
        let b = load_or_create_keypair(dir.path()).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }
}
