// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Opaque secure key/value storage capability.
//!
//! The platform keystore lives outside this crate; services only see the
//! [`SecureStore`] trait. [`EncryptedMemoryStore`] is the in-process
//! implementation: every value is sealed with AES-256-GCM before it is held,
//! so a heap dump never exposes plaintext tokens.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ring::rand::SystemRandom;

use super::crypto::{self, CryptoError, SymmetricKey};

#[derive(Debug, thiserror::Error)]
pub enum SecureStoreError {
    #[error("Secure store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Secure store backend failed: {0}")]
    Backend(String),
}

pub type SecureStoreResult<T> = Result<T, SecureStoreError>;

/// Byte-valued secret storage.
pub trait SecureStore: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> SecureStoreResult<()>;

    fn get(&self, key: &str) -> SecureStoreResult<Option<Vec<u8>>>;

    /// Returns whether a value was removed.
    fn delete(&self, key: &str) -> SecureStoreResult<bool>;
}

/// Process-lifetime store holding only sealed values.
pub struct EncryptedMemoryStore {
    key: SymmetricKey,
    rng: SystemRandom,
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl EncryptedMemoryStore {
    /// Create a store sealed under a freshly generated key.
    pub fn new() -> SecureStoreResult<Self> {
        let rng = SystemRandom::new();
        let key = crypto::generate_key(&rng)?;
        Ok(Self::with_key(key))
    }

    pub fn with_key(key: SymmetricKey) -> Self {
        Self {
            key,
            rng: SystemRandom::new(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn sealed(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().ok()?.get(key).cloned()
    }
}

impl SecureStore for EncryptedMemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> SecureStoreResult<()> {
        let sealed = crypto::encrypt(&self.rng, &self.key, value)?;
        self.entries
            .write()
            .map_err(|_| SecureStoreError::Poisoned)?
            .insert(key.to_string(), sealed);
        Ok(())
    }

    fn get(&self, key: &str) -> SecureStoreResult<Option<Vec<u8>>> {
        let sealed = self
            .entries
            .read()
            .map_err(|_| SecureStoreError::Poisoned)?
            .get(key)
            .cloned();
        match sealed {
            Some(sealed) => Ok(Some(crypto::decrypt(&self.key, &sealed)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> SecureStoreResult<bool> {
        Ok(self
            .entries
            .write()
            .map_err(|_| SecureStoreError::Poisoned)?
            .remove(key)
            .is_some())
    }
}
