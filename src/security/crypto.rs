// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric authenticated encryption and hashing.
//!
//! AES-256-GCM (`ring::aead`) with a fresh random 96-bit nonce per message.
//! Sealed output layout: `nonce (12) || ciphertext || tag (16)`.

use std::fmt;

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::SecureRandom;
use sha2::{Digest, Sha256};

/// Length of a symmetric key in bytes.
pub const KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Secure random source failed")]
    RandomSource,

    #[error("Invalid key material")]
    InvalidKey,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed (ciphertext is truncated or was tampered with)")]
    DecryptionFailed,

    #[error("Invalid PKCE code verifier: {0}")]
    InvalidVerifier(String),
}

/// 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(**redacted**)")
    }
}

/// Fill `len` bytes from the secure random source.
pub fn random_bytes(rng: &dyn SecureRandom, len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf).map_err(|_| CryptoError::RandomSource)?;
    Ok(buf)
}

pub fn generate_key(rng: &dyn SecureRandom) -> Result<SymmetricKey, CryptoError> {
    let bytes = random_bytes(rng, KEY_LEN)?;
    SymmetricKey::from_bytes(&bytes)
}

fn aead_key(key: &SymmetricKey) -> Result<LessSafeKey, CryptoError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes()).map_err(|_| CryptoError::InvalidKey)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt and authenticate `plaintext`.
pub fn encrypt(
    rng: &dyn SecureRandom,
    key: &SymmetricKey,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let sealing_key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| CryptoError::RandomSource)?;

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Verify and decrypt data produced by [`encrypt`].
pub fn decrypt(key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(CryptoError::DecryptionFailed);
    }
    let opening_key = aead_key(key)?;
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    Ok(plaintext.to_vec())
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    to_hex(&sha256(data))
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
