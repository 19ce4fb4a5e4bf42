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

//! Dispute records and majority-consensus resolution.
//!
//! A dispute challenges one observation record against another for the
//! same URL. Resolution compares the challenged record, field by field,
//! against the plurality of at least three independent observations.
//! Ambiguous evidence surfaces as INCONCLUSIVE, never as an error.

use crate::core::codec::{
    decode_base64, encode_base64, format_timestamp, is_hex32, parse_timestamp, CanonicalReader,
    CanonicalWriter, CodecError,
};
use crate::core::crypto::{self, sha256_hex, NodeKey, PUBLIC_KEY_LEN};
use crate::core::record::ObservationRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// The record fields compared during resolution, in canonical order.
pub const COMPARABLE_FIELDS: [&str; 6] = [
    "status_code",
    "content_hash",
    "final_url",
    "directive:canonical",
    "directive:robots_meta",
    "directive:robots_header",
];

/// Dispute errors.
#[derive(Debug, Error)]
pub enum DisputeError {
    /// Fewer than three observations, mixed URLs, or duplicate observers.
    #[error("insufficient observations: {0}")]
    InsufficientObservations(&'static str),
    /// The challenged record is not part of the observation set.
    #[error("challenged record not in observation set")]
    ChallengedNotInSet,
    /// Signature verification failed.
    #[error("bad signature")]
    SignatureInvalid,
}

/// A filed dispute over one observation record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisputeRecord {
    /// Dispute identifier.
    pub dispute_id: String,
    /// Record hash being challenged.
    pub challenged_record_hash: String,
    /// The challenger's own observation of the same URL.
    pub challenger_record_hash: String,
    /// Disputed URL.
    pub url: String,
    /// Filing time.
    pub filed_at: DateTime<Utc>,
    /// Fingerprint of the challenger's key.
    pub challenger_node_id: String,
    /// Base64 signature over the canonical text minus this line.
    pub challenger_signature: String,
}

impl DisputeRecord {
    /// File a dispute, deriving the id and signing with the challenger key.
    pub fn file(
        challenged_record_hash: &str,
        challenger_record_hash: &str,
        url: &str,
        filed_at: DateTime<Utc>,
        key: &NodeKey,
    ) -> Self {
        let mut id_input = String::new();
        id_input.push_str(challenged_record_hash);
        id_input.push_str(challenger_record_hash);
        id_input.push_str(&format_timestamp(filed_at));
        let dispute_id = format!("d-{}", &sha256_hex(id_input.as_bytes())[..16]);

        let mut dispute = Self {
            dispute_id,
            challenged_record_hash: challenged_record_hash.to_string(),
            challenger_record_hash: challenger_record_hash.to_string(),
            url: url.to_string(),
            filed_at,
            challenger_node_id: key.fingerprint(),
            challenger_signature: String::new(),
        };
        dispute.challenger_signature = encode_base64(&key.sign(dispute.signing_text().as_bytes()));
        dispute
    }

    /// Canonical bytes minus the signature line.
    pub fn signing_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("dispute_id", &self.dispute_id);
        w.field("challenged_record_hash", &self.challenged_record_hash);
        w.field("challenger_record_hash", &self.challenger_record_hash);
        w.field("url", &self.url);
        w.field("filed_at", &format_timestamp(self.filed_at));
        w.field("challenger_node_id", &self.challenger_node_id);
        w.finish()
    }

    /// Dispute hash: SHA-256 of the unsigned canonical text.
    pub fn dispute_hash(&self) -> String {
        sha256_hex(self.signing_text().as_bytes())
    }

    /// Full canonical text.
    pub fn canonical_text(&self) -> String {
        let mut text = self.signing_text();
        text.push_str("challenger_signature:");
        text.push_str(&self.challenger_signature);
        text.push('\n');
        text
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let dispute = Self {
            dispute_id: r.expect("dispute_id")?.to_string(),
            challenged_record_hash: r.expect("challenged_record_hash")?.to_string(),
            challenger_record_hash: r.expect("challenger_record_hash")?.to_string(),
            url: r.expect("url")?.to_string(),
            filed_at: parse_timestamp(r.expect("filed_at")?)?,
            challenger_node_id: r.expect("challenger_node_id")?.to_string(),
            challenger_signature: r.expect("challenger_signature")?.to_string(),
        };
        r.finish()?;
        if !is_hex32(&dispute.challenged_record_hash)
            || !is_hex32(&dispute.challenger_record_hash)
            || !is_hex32(&dispute.challenger_node_id)
        {
            return Err(CodecError::InvalidCanonicalForm("bad dispute hash field".to_string()));
        }
        Ok(dispute)
    }

    /// Verify the challenger signature under the challenger's key.
    pub fn verify_signature(&self, public_key: &[u8; PUBLIC_KEY_LEN]) -> Result<(), DisputeError> {
        let sig =
            decode_base64(&self.challenger_signature).map_err(|_| DisputeError::SignatureInvalid)?;
        crypto::verify(public_key, self.signing_text().as_bytes(), &sig)
            .map_err(|_| DisputeError::SignatureInvalid)
    }
}

/// At least three observations of the same URL by distinct nodes.
#[derive(Clone, Debug)]
pub struct ObservationSet {
    records: Vec<ObservationRecord>,
    url: String,
}

impl ObservationSet {
    /// Build a set, rejecting duplicates by `(node_id, url)` and requiring
    /// at least three records all sharing one URL.
    pub fn of(records: Vec<ObservationRecord>) -> Result<Self, DisputeError> {
        if records.len() < 3 {
            return Err(DisputeError::InsufficientObservations("fewer than 3 records"));
        }
        let url = records[0].url.clone();
        if !records.iter().all(|r| r.url == url) {
            return Err(DisputeError::InsufficientObservations("records observe different urls"));
        }
        let mut observers = BTreeSet::new();
        for r in &records {
            if !observers.insert(r.node_id.clone()) {
                return Err(DisputeError::InsufficientObservations("duplicate observer for url"));
            }
        }
        Ok(Self { records, url })
    }

    /// The common URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The observations.
    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false by construction.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn field_value(record: &ObservationRecord, field: &str) -> String {
    match field {
        "status_code" => record.status_code.to_string(),
        "content_hash" => record.content_hash.clone(),
        "final_url" => record.final_url.clone(),
        "directive:canonical" => record.canonical.clone(),
        "directive:robots_meta" => record.robots_meta.clone(),
        "directive:robots_header" => record.robots_header.clone(),
        _ => unreachable!("unknown comparable field"),
    }
}

/// Dispute outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A strict majority contradicts the challenged record.
    Upheld,
    /// Every field's majority agrees with the challenged record.
    Dismissed,
    /// No strict majority on any disagreement.
    Inconclusive,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Upheld => "UPHELD",
            Outcome::Dismissed => "DISMISSED",
            Outcome::Inconclusive => "INCONCLUSIVE",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "UPHELD" => Some(Outcome::Upheld),
            "DISMISSED" => Some(Outcome::Dismissed),
            "INCONCLUSIVE" => Some(Outcome::Inconclusive),
            _ => None,
        }
    }
}

/// Per-field comparison outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldTally {
    /// Field name.
    pub field: String,
    /// Plurality value, or `None` on a tie.
    pub majority: Option<String>,
    /// Count behind the plurality value.
    pub count: u64,
    /// Total observations.
    pub total: u64,
    /// The challenged record's value.
    pub challenged: String,
}

/// Terminal resolution of a dispute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// The resolved dispute.
    pub dispute_id: String,
    /// Outcome.
    pub outcome: Outcome,
    /// Resolution time.
    pub resolved_at: DateTime<Utc>,
    /// Number of observations consulted.
    pub observations_count: u64,
    /// One tally per comparable field, in canonical field order.
    pub fields: Vec<FieldTally>,
    /// Nodes contributing winning values on upheld fields.
    pub majority_nodes: Vec<String>,
    /// Remaining observers (the challenged node's among them).
    pub minority_nodes: Vec<String>,
}

impl Resolution {
    /// Canonical bytes.
    pub fn canonical_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("dispute_id", &self.dispute_id);
        w.field("outcome", self.outcome.as_str());
        w.field("resolved_at", &format_timestamp(self.resolved_at));
        w.field("observations_count", &self.observations_count.to_string());
        for tally in &self.fields {
            w.field("field", &tally.field);
            w.field("majority", tally.majority.as_deref().unwrap_or(""));
            w.field("count", &format!("{}/{}", tally.count, tally.total));
            w.field("challenged", &tally.challenged);
        }
        w.field("majority_nodes", &self.majority_nodes.join(","));
        w.field("minority_nodes", &self.minority_nodes.join(","));
        w.finish()
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let dispute_id = r.expect("dispute_id")?.to_string();
        let outcome = Outcome::from_str(r.expect("outcome")?)
            .ok_or_else(|| CodecError::InvalidCanonicalForm("bad outcome".to_string()))?;
        let resolved_at = parse_timestamp(r.expect("resolved_at")?)?;
        let observations_count = r.expect_u64("observations_count")?;

        let mut fields = Vec::with_capacity(COMPARABLE_FIELDS.len());
        for expected in COMPARABLE_FIELDS {
            let field = r.expect("field")?.to_string();
            if field != expected {
                return Err(CodecError::InvalidCanonicalForm("fields out of order".to_string()));
            }
            let majority_raw = r.expect("majority")?;
            let count_raw = r.expect("count")?;
            let challenged = r.expect("challenged")?.to_string();

            let (count, total) = count_raw
                .split_once('/')
                .and_then(|(k, n)| Some((k.parse::<u64>().ok()?, n.parse::<u64>().ok()?)))
                .ok_or_else(|| CodecError::InvalidCanonicalForm("bad count".to_string()))?;

            fields.push(FieldTally {
                field,
                majority: (!majority_raw.is_empty()).then(|| majority_raw.to_string()),
                count,
                total,
                challenged,
            });
        }

        let majority_nodes = split_csv(r.expect("majority_nodes")?);
        let minority_nodes = split_csv(r.expect("minority_nodes")?);
        r.finish()?;

        Ok(Self {
            dispute_id,
            outcome,
            resolved_at,
            observations_count,
            fields,
            majority_nodes,
            minority_nodes,
        })
    }
}

fn split_csv(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(String::from).collect()
    }
}

/// Resolves disputes by per-field plurality over an observation set.
pub struct DisputeResolver;

impl DisputeResolver {
    /// Resolve a dispute against an observation set.
    ///
    /// Per field: the plurality value wins; a tie means no majority for
    /// that field. UPHELD requires a strict (>n/2) majority differing from
    /// the challenged value on at least one field; DISMISSED requires
    /// every field's majority to equal the challenged value; anything in
    /// between is INCONCLUSIVE.
    pub fn resolve(
        dispute: &DisputeRecord,
        set: &ObservationSet,
        now: DateTime<Utc>,
    ) -> Result<Resolution, DisputeError> {
        let challenged = set
            .records()
            .iter()
            .find(|r| r.record_hash() == dispute.challenged_record_hash)
            .ok_or(DisputeError::ChallengedNotInSet)?;

        let n = set.len() as u64;
        let mut fields = Vec::with_capacity(COMPARABLE_FIELDS.len());
        let mut majority_union: BTreeSet<String> = BTreeSet::new();
        let mut any_upheld = false;
        let mut all_agree = true;

        for field in COMPARABLE_FIELDS {
            let challenged_value = field_value(challenged, field);

            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for record in set.records() {
                *counts.entry(field_value(record, field)).or_insert(0) += 1;
            }
            let top = counts.values().copied().max().unwrap_or(0);
            let tied = counts.values().filter(|&&c| c == top).count() > 1;
            let majority_value =
                (!tied).then(|| counts.iter().find(|(_, &c)| c == top).map(|(v, _)| v.clone()))
                    .flatten();

            match &majority_value {
                Some(v) if *v != challenged_value => {
                    all_agree = false;
                    // Strict majority is required to uphold on this field.
                    if top * 2 > n {
                        any_upheld = true;
                        for record in set.records() {
                            if field_value(record, field) == *v {
                                majority_union.insert(record.node_id.clone());
                            }
                        }
                    }
                }
                Some(_) => {}
                None => all_agree = false,
            }

            fields.push(FieldTally {
                field: field.to_string(),
                majority: majority_value,
                count: top,
                total: n,
                challenged: challenged_value,
            });
        }

        let outcome = if any_upheld {
            Outcome::Upheld
        } else if all_agree {
            Outcome::Dismissed
        } else {
            Outcome::Inconclusive
        };

        majority_union.remove(&challenged.node_id);
        let majority_nodes: Vec<String> = majority_union.iter().cloned().collect();
        let minority_nodes: Vec<String> = if outcome == Outcome::Upheld {
            set.records()
                .iter()
                .map(|r| r.node_id.clone())
                .filter(|id| !majority_union.contains(id))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };

        Ok(Resolution {
            dispute_id: dispute.dispute_id.clone(),
            outcome,
            resolved_at: now,
            observations_count: n,
            fields,
            majority_nodes,
            minority_nodes,
        })
    }
}
