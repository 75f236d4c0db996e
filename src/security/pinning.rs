// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Certificate fingerprint pinning.
//!
//! Fingerprints are compared in normalised form: uppercase hex byte pairs
//! separated by colons (`AB:CD:…`). Pin sets fail closed: an empty set
//! matches nothing.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::crypto::sha256;

/// Hex digits in a SHA-1 fingerprint.
const SHA1_HEX_LEN: usize = 40;
/// Hex digits in a SHA-256 fingerprint.
const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid certificate fingerprint `{0}` (expected 20 or 32 hex bytes)")]
pub struct FingerprintError(pub String);

/// Normalised SHA-1 or SHA-256 certificate fingerprint.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateFingerprint(String);

impl CertificateFingerprint {
    pub fn parse(raw: &str) -> Result<Self, FingerprintError> {
        let normalized = normalize_fingerprint(raw);
        if is_valid_format(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(FingerprintError(raw.to_string()))
        }
    }

    /// SHA-256 fingerprint of a DER-encoded certificate.
    pub fn of_der(der: &[u8]) -> Self {
        let digest = sha256(der);
        let hex: Vec<String> = digest.iter().map(|b| format!("{b:02X}")).collect();
        Self(hex.join(":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest length in bytes (20 or 32).
    pub fn byte_len(&self) -> usize {
        self.0.split(':').count()
    }
}

impl fmt::Debug for CertificateFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateFingerprint({})", self.0)
    }
}

impl fmt::Display for CertificateFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CertificateFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CertificateFingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CertificateFingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CertificateFingerprint> for String {
    fn from(value: CertificateFingerprint) -> Self {
        value.0
    }
}

/// Uppercase, strip whitespace and colons, then re-insert a colon between
/// every byte pair. Idempotent.
pub fn normalize_fingerprint(raw: &str) -> String {
    let digits: Vec<char> = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    digits
        .chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}

/// True for 40 or 64 hex digits, bare or as colon-separated byte pairs.
pub fn is_valid_format(candidate: &str) -> bool {
    let candidate = candidate.trim();
    if !candidate.chars().all(|c| c.is_ascii_hexdigit() || c == ':') {
        return false;
    }
    let digits = candidate.chars().filter(|c| *c != ':').count();
    if digits != SHA1_HEX_LEN && digits != SHA256_HEX_LEN {
        return false;
    }
    !candidate.contains(':') || candidate.split(':').all(|pair| pair.len() == 2)
}

/// True iff `observed` matches any entry of `pinned`. Empty pin set → false.
pub fn validate_fingerprint<P: AsRef<str>>(observed: &str, pinned: &[P]) -> bool {
    if pinned.is_empty() {
        return false;
    }
    let observed = normalize_fingerprint(observed);
    if !is_valid_format(&observed) {
        return false;
    }
    pinned
        .iter()
        .any(|pin| normalize_fingerprint(pin.as_ref()) == observed)
}

/// True iff any certificate of the presented chain matches any pin, which
/// allows pinning an intermediate CA instead of the leaf.
pub fn validate_chain<C: AsRef<str>, P: AsRef<str>>(
    hostname: &str,
    chain: &[C],
    pinned: &[P],
) -> bool {
    let matched = chain
        .iter()
        .position(|link| validate_fingerprint(link.as_ref(), pinned));
    debug!(
        host = %hostname,
        chain_len = chain.len(),
        pins = pinned.len(),
        matched_link = ?matched,
        "Evaluated certificate chain against pins"
    );
    matched.is_some()
}

/// A bank's pin set, shared read-only by every handshake to its hosts.
#[derive(Debug, Clone)]
pub struct CertificatePinningValidator {
    pins: Arc<[CertificateFingerprint]>,
}

impl CertificatePinningValidator {
    pub fn new(pins: Vec<CertificateFingerprint>) -> Self {
        Self { pins: pins.into() }
    }

    pub fn pins(&self) -> &[CertificateFingerprint] {
        &self.pins
    }

    pub fn validate_fingerprint(&self, observed: &str) -> bool {
        validate_fingerprint(observed, &self.pins)
    }

    pub fn validate_chain<C: AsRef<str>>(&self, hostname: &str, chain: &[C]) -> bool {
        validate_chain(hostname, chain, &self.pins)
    }
}
