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

//! Canonical text codec shared by every persisted entity.
//!
//! ## Canonical form
//! Every entity serializes to an unambiguous, newline-delimited format:
//!
//! ```text
//! <field>:<value>
//! <field>:<value>
//! ...
//! ```
//!
//! UTF-8, LF line terminators, fields in a fixed per-entity order, no
//! whitespace around `:`, no trailing whitespace on any line. Hash and
//! signature inputs are the exact canonical bytes.
//!
//! Parsing tolerates exactly one trailing LF. Any other deviation (wrong
//! field order, extra whitespace, upper-case hex, missing mandatory field,
//! extra lines) is an `InvalidCanonicalForm` error.
//!
//! Hex is lowercase only, fixed 64 chars for 32-byte digests. Signatures
//! and key material use standard Base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

/// Width of a 32-byte digest in lowercase hex.
pub const HEX32_LEN: usize = 64;

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input deviates from canonical form.
    #[error("invalid canonical form: {0}")]
    InvalidCanonicalForm(String),
    /// Hex field has wrong length, wrong case, or non-hex characters.
    #[error("invalid hex")]
    InvalidHex,
    /// Base64 field does not decode.
    #[error("invalid base64")]
    InvalidBase64,
}

/// Encode 32 raw bytes as 64-char lowercase hex.
pub fn encode_hex32(bytes: &[u8; 32]) -> String {
    hex::encode(bytes)
}

/// Decode a 64-char lowercase hex digest. Upper-case, odd length, and
/// non-hex characters are rejected.
pub fn decode_hex32(s: &str) -> Result<[u8; 32], CodecError> {
    if !is_hex32(s) {
        return Err(CodecError::InvalidHex);
    }
    let raw = hex::decode(s).map_err(|_| CodecError::InvalidHex)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&raw);
    Ok(out)
}

/// True iff `s` is exactly 64 lowercase hex characters.
pub fn is_hex32(s: &str) -> bool {
    s.len() == HEX32_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Decode arbitrary-length lowercase hex. Rejects odd lengths, upper case,
/// and non-hex characters.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return Err(CodecError::InvalidHex);
    }
    hex::decode(s).map_err(|_| CodecError::InvalidHex)
}

/// Standard Base64 of raw bytes (no padding changes, no wrapping).
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard Base64.
pub fn decode_base64(s: &str) -> Result<Vec<u8>, CodecError> {
    BASE64.decode(s).map_err(|_| CodecError::InvalidBase64)
}

/// Canonical timestamp format: ISO-8601 UTC, second precision, `Z` suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Emit a canonical timestamp.
pub fn format_timestamp(t: chrono::DateTime<chrono::Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a canonical timestamp. Offsets, fractional seconds, and any other
/// RFC 3339 variation are rejected.
pub fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, CodecError> {
    chrono::NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| CodecError::InvalidCanonicalForm("bad timestamp".to_string()))
}

/// Wall-clock now, truncated to canonical (second) precision.
pub fn now_utc() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(0)
}

/// Canonical emitter: accumulates `field:value` lines.
#[derive(Debug, Default)]
pub struct CanonicalWriter {
    buf: String,
}

impl CanonicalWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `name:value` line.
    pub fn field(&mut self, name: &str, value: &str) -> &mut Self {
        self.buf.push_str(name);
        self.buf.push(':');
        self.buf.push_str(value);
        self.buf.push('\n');
        self
    }

    /// Finish and return the canonical text (every line LF-terminated).
    pub fn finish(self) -> String {
        self.buf
    }
}

/// Strict line-oriented reader over canonical text.
///
/// Fields must be consumed in the entity's fixed order; any leftover or
/// malformed line fails the parse.
pub struct CanonicalReader<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> CanonicalReader<'a> {
    /// Wrap canonical text. A single trailing LF is tolerated; every line
    /// is checked for trailing whitespace (which also rejects CRLF input).
    pub fn new(text: &'a str) -> Result<Self, CodecError> {
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines: Vec<&str> = if body.is_empty() { Vec::new() } else { body.split('\n').collect() };
        for line in &lines {
            if line.ends_with(' ') || line.ends_with('\t') || line.ends_with('\r') {
                return Err(CodecError::InvalidCanonicalForm(
                    "trailing whitespace".to_string(),
                ));
            }
        }
        Ok(Self { lines, pos: 0 })
    }

    /// Consume the next line, which must be `name:<value>`; returns the value.
    pub fn expect(&mut self, name: &str) -> Result<&'a str, CodecError> {
        let line = self
            .lines
            .get(self.pos)
            .copied()
            .ok_or_else(|| CodecError::InvalidCanonicalForm(format!("missing field {name}")))?;
        let value = line
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| CodecError::InvalidCanonicalForm(format!("expected field {name}")))?;
        self.pos += 1;
        Ok(value)
    }

    /// Consume the next line as `name:<value>` and parse the value as an
    /// unsigned integer with no leading zeros.
    pub fn expect_u64(&mut self, name: &str) -> Result<u64, CodecError> {
        let v = self.expect(name)?;
        if v.is_empty() || (v.len() > 1 && v.starts_with('0')) || !v.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::InvalidCanonicalForm(format!("bad integer in {name}")));
        }
        v.parse()
            .map_err(|_| CodecError::InvalidCanonicalForm(format!("bad integer in {name}")))
    }

    /// Consume zero or more consecutive `name:<value>` lines.
    pub fn take_repeated(&mut self, name: &str) -> Vec<&'a str> {
        let mut out = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            match line.strip_prefix(name).and_then(|rest| rest.strip_prefix(':')) {
                Some(v) => {
                    out.push(v);
                    self.pos += 1;
                }
                None => break,
            }
        }
        out
    }

    /// True iff the next line starts with `name:`.
    pub fn peek_is(&self, name: &str) -> bool {
        self.lines
            .get(self.pos)
            .map(|l| l.strip_prefix(name).and_then(|r| r.strip_prefix(':')).is_some())
            .unwrap_or(false)
    }

    /// True iff every line has been consumed.
    pub fn is_done(&self) -> bool {
        self.pos >= self.lines.len()
    }

    /// Fail unless every line has been consumed.
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.is_done() {
            Ok(())
        } else {
            Err(CodecError::InvalidCanonicalForm(format!(
                "unexpected line: {}",
                self.lines[self.pos]
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex32_rejects_upper_case_and_odd_lengths() {
        let ok = "a".repeat(64);
        assert!(decode_hex32(&ok).is_ok());
        assert!(decode_hex32(&ok.to_uppercase()).is_err());
        assert!(decode_hex32(&"a".repeat(63)).is_err());
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn reader_enforces_order_and_rejects_leftovers() {
        let text = "a:1\nb:2\n";
        let mut r = CanonicalReader::new(text).unwrap();
        assert_eq!(r.expect("a").unwrap(), "1");
        assert!(r.finish().is_err());
        assert_eq!(r.expect("b").unwrap(), "2");
        assert!(r.finish().is_ok());

        let mut r = CanonicalReader::new(text).unwrap();
        assert!(r.expect("b").is_err());
    }

    #[test]
    fn reader_rejects_trailing_whitespace_and_crlf() {
        assert!(CanonicalReader::new("a:1 \n").is_err());
        assert!(CanonicalReader::new("a:1\r\n").is_err());
    }

    #[test]
    fn integers_reject_leading_zeros() {
        let mut r = CanonicalReader::new("n:007\n").unwrap();
        assert!(r.expect_u64("n").is_err());
        let mut r = CanonicalReader::new("n:0\n").unwrap();
        assert_eq!(r.expect_u64("n").unwrap(), 0);
    }
}
