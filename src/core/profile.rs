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

//! Signed node identity: registration, crawl attestation, peer info.
//!
//! A profile is a self-signed registration optionally followed by a crawl
//! attestation for the domains the operator claims to crawl. The
//! attestation's `node_id` must be the fingerprint of the registration's
//! public key.

use crate::core::codec::{
    decode_base64, encode_base64, format_timestamp, is_hex32, parse_timestamp, CanonicalReader,
    CanonicalWriter, CodecError,
};
use crate::core::crypto::{
    self, fingerprint_hex, public_key_from_slice, NodeKey, PUBLIC_KEY_LEN,
};
use crate::core::publish::VerifyReport;
use chrono::{DateTime, Utc};

/// Operator registration, self-signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRegistration {
    /// Operator display name.
    pub operator_name: String,
    /// Operator organization.
    pub organization: String,
    /// Contact address.
    pub contact_email: String,
    /// Raw Ed25519 public key.
    pub public_key: [u8; PUBLIC_KEY_LEN],
    /// Registration time.
    pub registered_at: DateTime<Utc>,
    /// Base64 signature over the canonical text minus this line.
    pub registration_signature: String,
}

impl NodeRegistration {
    /// Create and self-sign a registration.
    pub fn create(
        operator_name: &str,
        organization: &str,
        contact_email: &str,
        registered_at: DateTime<Utc>,
        key: &NodeKey,
    ) -> Self {
        let mut reg = Self {
            operator_name: operator_name.to_string(),
            organization: organization.to_string(),
            contact_email: contact_email.to_string(),
            public_key: key.public_key(),
            registered_at,
            registration_signature: String::new(),
        };
        reg.registration_signature = encode_base64(&key.sign(reg.signing_text().as_bytes()));
        reg
    }

    /// The node id this registration claims: fingerprint of its key.
    pub fn node_id(&self) -> String {
        fingerprint_hex(&self.public_key)
    }

    /// Canonical bytes minus the signature line.
    pub fn signing_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("operator_name", &self.operator_name);
        w.field("organization", &self.organization);
        w.field("contact_email", &self.contact_email);
        w.field("public_key", &encode_base64(&self.public_key));
        w.field("registered_at", &format_timestamp(self.registered_at));
        w.finish()
    }

    /// Full canonical text.
    pub fn canonical_text(&self) -> String {
        let mut text = self.signing_text();
        text.push_str("registration_signature:");
        text.push_str(&self.registration_signature);
        text.push('\n');
        text
    }

    fn parse_from(r: &mut CanonicalReader<'_>) -> Result<Self, CodecError> {
        let operator_name = r.expect("operator_name")?.to_string();
        let organization = r.expect("organization")?.to_string();
        let contact_email = r.expect("contact_email")?.to_string();
        let raw = decode_base64(r.expect("public_key")?)?;
        let public_key = public_key_from_slice(&raw)
            .map_err(|_| CodecError::InvalidCanonicalForm("bad public key length".to_string()))?;
        let registered_at = parse_timestamp(r.expect("registered_at")?)?;
        let registration_signature = r.expect("registration_signature")?.to_string();
        Ok(Self {
            operator_name,
            organization,
            contact_email,
            public_key,
            registered_at,
            registration_signature,
        })
    }

    /// Strict parse of a standalone registration.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let reg = Self::parse_from(&mut r)?;
        r.finish()?;
        Ok(reg)
    }
}

/// Attestation of the domains a node claims to crawl.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlAttestation {
    /// Fingerprint of the attesting key.
    pub node_id: String,
    /// Attestation time.
    pub attested_at: DateTime<Utc>,
    /// Claimed domains, sorted and deduplicated.
    pub domains: Vec<String>,
    /// Base64 signature over the canonical text minus this line.
    pub attestation_signature: String,
}

impl CrawlAttestation {
    /// Create and sign an attestation.
    pub fn create(domains: Vec<String>, attested_at: DateTime<Utc>, key: &NodeKey) -> Self {
        let mut domains = domains;
        domains.sort();
        domains.dedup();
        let mut att = Self {
            node_id: key.fingerprint(),
            attested_at,
            domains,
            attestation_signature: String::new(),
        };
        att.attestation_signature = encode_base64(&key.sign(att.signing_text().as_bytes()));
        att
    }

    /// Canonical bytes minus the signature line.
    pub fn signing_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("node_id", &self.node_id);
        w.field("attested_at", &format_timestamp(self.attested_at));
        for domain in &self.domains {
            w.field("domain", domain);
        }
        w.finish()
    }

    /// Full canonical text.
    pub fn canonical_text(&self) -> String {
        let mut text = self.signing_text();
        text.push_str("attestation_signature:");
        text.push_str(&self.attestation_signature);
        text.push('\n');
        text
    }

    fn parse_from(r: &mut CanonicalReader<'_>) -> Result<Self, CodecError> {
        let node_id = r.expect("node_id")?.to_string();
        if !is_hex32(&node_id) {
            return Err(CodecError::InvalidCanonicalForm("bad node_id".to_string()));
        }
        let attested_at = parse_timestamp(r.expect("attested_at")?)?;
        let domains: Vec<String> = r.take_repeated("domain").into_iter().map(String::from).collect();
        if !domains.windows(2).all(|w| w[0] < w[1]) {
            return Err(CodecError::InvalidCanonicalForm(
                "domains not sorted/deduplicated".to_string(),
            ));
        }
        let attestation_signature = r.expect("attestation_signature")?.to_string();
        Ok(Self { node_id, attested_at, domains, attestation_signature })
    }

    /// Strict parse of a standalone attestation.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let att = Self::parse_from(&mut r)?;
        r.finish()?;
        Ok(att)
    }
}

/// Registration plus optional attestation, stored at `profiles/<node_id>.txt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeProfile {
    /// The registration.
    pub registration: NodeRegistration,
    /// The attestation, if issued.
    pub attestation: Option<CrawlAttestation>,
}

impl NodeProfile {
    /// Canonical text: registration, then attestation if present.
    pub fn canonical_text(&self) -> String {
        let mut text = self.registration.canonical_text();
        if let Some(att) = &self.attestation {
            text.push_str(&att.canonical_text());
        }
        text
    }

    /// Strict parse.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let registration = NodeRegistration::parse_from(&mut r)?;
        let attestation = if r.is_done() { None } else { Some(CrawlAttestation::parse_from(&mut r)?) };
        r.finish()?;
        Ok(Self { registration, attestation })
    }

    /// Verify the registration signature, the attestation binding
    /// (`node_id` equals the registration key's fingerprint), and the
    /// attestation signature. Every failure is reported.
    pub fn verify(&self) -> VerifyReport {
        let mut report = VerifyReport::default();
        let pk = self.registration.public_key;

        match decode_base64(&self.registration.registration_signature) {
            Ok(sig) => {
                if crypto::verify(&pk, self.registration.signing_text().as_bytes(), &sig).is_err() {
                    report.errors.push("registration signature invalid".to_string());
                }
            }
            Err(_) => report.errors.push("registration signature not decodable".to_string()),
        }

        if let Some(att) = &self.attestation {
            if att.node_id != self.registration.node_id() {
                report.errors.push("attestation node id does not match registration".to_string());
            }
            match decode_base64(&att.attestation_signature) {
                Ok(sig) => {
                    if crypto::verify(&pk, att.signing_text().as_bytes(), &sig).is_err() {
                        report.errors.push("attestation signature invalid".to_string());
                    }
                }
                Err(_) => report.errors.push("attestation signature not decodable".to_string()),
            }
        }

        report
    }
}

/// A peer's directory entry, stored at `peers/<node_id>.txt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    /// Peer node id (key fingerprint).
    pub node_id: String,
    /// Base URL of the peer's HTTP API.
    pub endpoint_url: String,
    /// Raw Ed25519 public key.
    pub public_key: [u8; PUBLIC_KEY_LEN],
}

impl PeerInfo {
    /// Canonical bytes.
    pub fn canonical_text(&self) -> String {
        let mut w = CanonicalWriter::new();
        w.field("node_id", &self.node_id);
        w.field("endpoint_url", &self.endpoint_url);
        w.field("public_key", &encode_base64(&self.public_key));
        w.finish()
    }

    /// Strict parse. The node id must be the fingerprint of the key.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut r = CanonicalReader::new(text)?;
        let node_id = r.expect("node_id")?.to_string();
        let endpoint_url = r.expect("endpoint_url")?.to_string();
        let raw = decode_base64(r.expect("public_key")?)?;
        r.finish()?;
        let public_key = public_key_from_slice(&raw)
            .map_err(|_| CodecError::InvalidCanonicalForm("bad public key length".to_string()))?;
        if node_id != fingerprint_hex(&public_key) {
            return Err(CodecError::InvalidCanonicalForm(
                "node id does not match public key".to_string(),
            ));
        }
        Ok(Self { node_id, endpoint_url, public_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::now_utc;

    #[test]
    fn profile_roundtrip_and_verify() {
        let key = NodeKey::generate().unwrap();
        let registration =
            NodeRegistration::create("Ada", "Example Org", "ada@example.org", now_utc(), &key);
        let attestation = CrawlAttestation::create(
            vec!["example.org".to_string(), "example.com".to_string()],
            now_utc(),
            &key,
        );
        let profile = NodeProfile { registration, attestation: Some(attestation) };

        assert!(profile.verify().valid());
        let parsed = NodeProfile::parse(&profile.canonical_text()).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn attestation_binding_enforced() {
        let key = NodeKey::generate().unwrap();
        let other = NodeKey::generate().unwrap();
        let registration =
            NodeRegistration::create("Ada", "Example Org", "ada@example.org", now_utc(), &key);
        // Attestation signed by (and naming) a different key.
        let attestation = CrawlAttestation::create(vec!["example.org".to_string()], now_utc(), &other);
        let profile = NodeProfile { registration, attestation: Some(attestation) };

        let report = profile.verify();
        assert!(!report.valid());
        assert!(report.errors.iter().any(|e| e.contains("node id")));
    }

    #[test]
    fn peer_info_rejects_mismatched_node_id() {
        let key = NodeKey::generate().unwrap();
        let peer = PeerInfo {
            node_id: key.fingerprint(),
            endpoint_url: "http://127.0.0.1:8080".to_string(),
            public_key: key.public_key(),
        };
        let parsed = PeerInfo::parse(&peer.canonical_text()).unwrap();
        assert_eq!(parsed, peer);

        let forged = peer.canonical_text().replace(&peer.node_id, &"0".repeat(64));
        assert!(PeerInfo::parse(&forged).is_err());
    }
}
