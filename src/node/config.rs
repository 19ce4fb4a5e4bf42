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

//! Node configuration.
//!
//! Defaults, optionally overridden by a TOML file, always overridden by
//! environment: `TRUTHCRAWL_DATA`, `TRUTHCRAWL_PORT`,
//! `TRUTHCRAWL_SYNC_INTERVAL`, `TRUTHCRAWL_CRAWL_INTERVAL`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file unreadable.
    #[error("read config")]
    Read,
    /// Config file is not valid TOML for the schema.
    #[error("parse config")]
    Parse,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_sync_interval() -> u64 {
    300
}

fn default_crawl_interval() -> u64 {
    3600
}

/// Node configuration root.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    /// Data directory (keys, store, batches, peers, ...).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// HTTP API port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between sync rounds.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    /// Seconds between crawl cycles.
    #[serde(default = "default_crawl_interval")]
    pub crawl_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            port: default_port(),
            sync_interval_secs: default_sync_interval(),
            crawl_interval_secs: default_crawl_interval(),
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl NodeConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|_| ConfigError::Read)?;
                toml::from_str(&raw).map_err(|_| ConfigError::Parse)?
            }
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    fn apply_env(&mut self) {
        if let Some(v) = env("TRUTHCRAWL_DATA") {
            self.data_dir = v;
        }
        if let Some(v) = env("TRUTHCRAWL_PORT").and_then(|v| v.parse().ok()) {
            self.port = v;
        }
        if let Some(v) = env("TRUTHCRAWL_SYNC_INTERVAL").and_then(|v| v.parse().ok()) {
            self.sync_interval_secs = v;
        }
        if let Some(v) = env("TRUTHCRAWL_CRAWL_INTERVAL").and_then(|v| v.parse().ok()) {
            self.crawl_interval_secs = v;
        }
    }

    /// Data directory as a path.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// `<data_dir>/store`.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir().join("store")
    }

    /// `<data_dir>/batches`.
    pub fn batches_dir(&self) -> PathBuf {
        self.data_dir().join("batches")
    }

    /// `<data_dir>/timestamps`.
    pub fn timestamps_dir(&self) -> PathBuf {
        self.data_dir().join("timestamps")
    }

    /// `<data_dir>/peers`.
    pub fn peers_dir(&self) -> PathBuf {
        self.data_dir().join("peers")
    }

    /// `<data_dir>/profiles`.
    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir().join("profiles")
    }

    /// `<data_dir>/verification`.
    pub fn verification_dir(&self) -> PathBuf {
        self.data_dir().join("verification")
    }

    /// `<data_dir>/urls.txt`.
    pub fn urls_file(&self) -> PathBuf {
        self.data_dir().join("urls.txt")
    }
}

/// Parse a `urls.txt` body: one URL per line, `#` comments and blank
/// lines skipped.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_skips_comments_and_blanks() {
        let urls = parse_url_list("# seeds\nhttps://a.example\n\n  https://b.example\n#x\n");
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.sync_interval_secs, 300);
        assert_eq!(cfg.crawl_interval_secs, 3600);
    }
}
