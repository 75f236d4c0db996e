// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Security primitives
//!
//! PKCE, state nonces, AEAD, hashing and certificate pinning.
//!
//! ## Security
//!
//! - All randomness comes from `ring::rand::SystemRandom` (OS CSPRNG).
//! - Encryption is AES-256-GCM; ciphertext tampering is always detected.
//! - Pin sets fail closed.

pub mod crypto;
pub mod pinning;
pub mod pkce;
pub mod secure_store;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::SystemRandom;

pub use crypto::{CryptoError, SymmetricKey};
pub use pinning::{CertificateFingerprint, CertificatePinningValidator};
pub use pkce::PkceChallenge;
pub use secure_store::{EncryptedMemoryStore, SecureStore, SecureStoreError};

/// Random bytes behind a `state` nonce (32 URL-safe characters).
const STATE_ENTROPY_BYTES: usize = 24;

/// Entry point for the crate's cryptographic operations.
#[derive(Debug, Clone)]
pub struct SecurityProvider {
    rng: SystemRandom,
}

impl Default for SecurityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityProvider {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    pub fn generate_pkce_challenge(&self) -> Result<PkceChallenge, CryptoError> {
        PkceChallenge::generate(&self.rng)
    }

    /// Opaque anti-CSRF value echoed back on the authorization redirect.
    pub fn generate_state(&self) -> Result<String, CryptoError> {
        let bytes = crypto::random_bytes(&self.rng, STATE_ENTROPY_BYTES)?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }

    pub fn generate_key(&self) -> Result<SymmetricKey, CryptoError> {
        crypto::generate_key(&self.rng)
    }

    pub fn encrypt(&self, data: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
        crypto::encrypt(&self.rng, key, data)
    }

    pub fn decrypt(&self, data: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
        crypto::decrypt(key, data)
    }

    pub fn sha256(&self, data: &[u8]) -> [u8; 32] {
        crypto::sha256(data)
    }

    pub fn sha256_hex(&self, data: &[u8]) -> String {
        crypto::sha256_hex(data)
    }
}
