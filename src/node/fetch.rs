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

//! Thin HTTP fetcher.
//!
//! Yields raw bytes and response headers and shapes them into a
//! [`RecordDraft`]. Directive and link extraction is a lightweight scan,
//! not an HTML parser; the log attests to what was served, not to a DOM.

use crate::core::codec::now_utc;
use crate::core::crypto::sha256_hex;
use crate::core::record::{RecordDraft, HEADER_WHITELIST};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Most links retained per page.
const MAX_LINKS: usize = 64;

/// Fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Client construction failed.
    #[error("client build")]
    Build,
    /// Request failed or timed out.
    #[error("fetch failed: {0}")]
    Request(String),
}

/// One fetched page, ready to become a record draft.
#[derive(Clone, Debug)]
pub struct FetchedPage {
    /// Requested URL.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status_code: u16,
    /// Fetch duration in milliseconds.
    pub fetch_ms: u64,
    /// Whitelisted response headers.
    pub headers: Vec<(String, String)>,
    /// `X-Robots-Tag` header value, or empty.
    pub robots_header: String,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP fetcher with a 30-second timeout.
pub struct Fetcher {
    http: reqwest::Client,
}

impl Fetcher {
    /// Build the fetcher.
    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("truthcrawl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|_| FetchError::Build)?;
        Ok(Self { http })
    }

    /// Fetch one URL, following redirects.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let started = Instant::now();
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status_code = resp.status().as_u16();
        let final_url = resp.url().to_string();

        let mut headers = Vec::new();
        let mut robots_header = String::new();
        for (name, value) in resp.headers() {
            let name = name.as_str().to_ascii_lowercase();
            let Ok(value) = value.to_str() else {
                continue;
            };
            if name == "x-robots-tag" && robots_header.is_empty() {
                robots_header = value.to_string();
            }
            if HEADER_WHITELIST.contains(&name.as_str()) {
                headers.push((name, value.to_string()));
            }
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?
            .to_vec();
        let fetch_ms = started.elapsed().as_millis() as u64;

        Ok(FetchedPage { url: url.to_string(), final_url, status_code, fetch_ms, headers, robots_header, body })
    }
}

/// Shape a fetched page into an unsigned record draft.
pub fn draft_from_page(page: &FetchedPage) -> RecordDraft {
    let text = String::from_utf8_lossy(&page.body);
    let (canonical, robots_meta) = extract_directives(&text);
    RecordDraft {
        observed_at: now_utc(),
        url: page.url.clone(),
        final_url: page.final_url.clone(),
        status_code: page.status_code,
        fetch_ms: page.fetch_ms,
        content_hash: sha256_hex(&page.body),
        headers: page.headers.clone(),
        canonical,
        robots_meta,
        robots_header: page.robots_header.clone(),
        links: extract_links(&text),
    }
}

/// Pull one attribute value out of a tag body (`attr="value"` or
/// `attr='value'`, any case).
fn attr_value(tag: &str, attr: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let mut search = 0;
    while let Some(rel) = lower[search..].find(attr) {
        let at = search + rel + attr.len();
        let rest = lower[at..].trim_start();
        if let Some(rest) = rest.strip_prefix('=') {
            let rest = rest.trim_start();
            let quote = rest.chars().next()?;
            if quote == '"' || quote == '\'' {
                // Slice the original tag to preserve value case.
                let vstart = tag.len() - rest.len() + 1;
                let vlen = rest[1..].find(quote)?;
                return Some(tag[vstart..vstart + vlen].to_string());
            }
        }
        search = at;
    }
    None
}

/// Scan a page for the canonical-link and robots-meta directives.
pub fn extract_directives(html: &str) -> (String, String) {
    let mut canonical = String::new();
    let mut robots_meta = String::new();
    let lower = html.to_ascii_lowercase();

    let mut pos = 0;
    while let Some(rel) = lower[pos..].find('<') {
        let start = pos + rel;
        let Some(len) = lower[start..].find('>') else {
            break;
        };
        let tag = &html[start..start + len + 1];
        let tag_lower = &lower[start..start + len + 1];

        if canonical.is_empty()
            && tag_lower.starts_with("<link")
            && attr_value(tag, "rel").map(|r| r.eq_ignore_ascii_case("canonical")).unwrap_or(false)
        {
            if let Some(href) = attr_value(tag, "href") {
                canonical = href;
            }
        }
        if robots_meta.is_empty()
            && tag_lower.starts_with("<meta")
            && attr_value(tag, "name").map(|n| n.eq_ignore_ascii_case("robots")).unwrap_or(false)
        {
            if let Some(content) = attr_value(tag, "content") {
                robots_meta = content;
            }
        }

        pos = start + len + 1;
    }

    (canonical, robots_meta)
}

/// Scan a page for absolute http(s) links, capped at [`MAX_LINKS`].
pub fn extract_links(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut links = Vec::new();

    let mut pos = 0;
    while links.len() < MAX_LINKS {
        let Some(rel) = lower[pos..].find("href") else {
            break;
        };
        let at = pos + rel;
        let tail = &html[at..];
        let mut end = tail.len().min(2048);
        while !tail.is_char_boundary(end) {
            end -= 1;
        }
        if let Some(href) = attr_value(&tail[..end], "href") {
            if href.starts_with("http://") || href.starts_with("https://") {
                links.push(href);
            }
        }
        pos = at + 4;
    }

    links.sort();
    links.dedup();
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_extracted_from_head() {
        let html = r#"<html><head>
            <link rel="canonical" href="https://example.com/page">
            <meta name="robots" content="noindex, nofollow">
        </head><body></body></html>"#;
        let (canonical, robots) = extract_directives(html);
        assert_eq!(canonical, "https://example.com/page");
        assert_eq!(robots, "noindex, nofollow");
    }

    #[test]
    fn missing_directives_are_empty() {
        let (canonical, robots) = extract_directives("<html><body>plain</body></html>");
        assert_eq!(canonical, "");
        assert_eq!(robots, "");
    }

    #[test]
    fn links_are_absolute_sorted_deduplicated() {
        let html = r#"<a href="https://b.example/x">b</a>
            <a href="/relative">skip</a>
            <a href='https://a.example/y'>a</a>
            <a href="https://b.example/x">dup</a>"#;
        assert_eq!(extract_links(html), vec!["https://a.example/y", "https://b.example/x"]);
    }

    #[test]
    fn attr_value_handles_quotes_and_case() {
        assert_eq!(attr_value(r#"<LINK REL="Canonical" HREF="https://E.example/">"#, "href"), Some("https://E.example/".to_string()));
        assert_eq!(attr_value("<link rel=canonical>", "rel"), None);
    }
}
