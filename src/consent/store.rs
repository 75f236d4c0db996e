// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent persistence seam.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::audit::ConsentAuditEntry;
use super::types::ConsentDetails;
use crate::error::SamaError;

#[derive(Debug, thiserror::Error)]
pub enum ConsentStoreError {
    #[error("Consent store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ConsentStoreResult<T> = Result<T, ConsentStoreError>;

impl From<ConsentStoreError> for SamaError {
    fn from(value: ConsentStoreError) -> Self {
        SamaError::UnknownError {
            status: None,
            message: value.to_string(),
            details: None,
        }
    }
}

/// Storage for consent records and their audit trail.
///
/// Callers serialise read-modify-write per consent id; implementations only
/// need each call to be atomic.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    async fn get(&self, consent_id: &str) -> ConsentStoreResult<Option<ConsentDetails>>;

    /// Insert or replace the record.
    async fn put(&self, consent: ConsentDetails) -> ConsentStoreResult<()>;

    async fn append_audit(&self, entry: ConsentAuditEntry) -> ConsentStoreResult<()>;

    /// Entries for `consent_id` in append order.
    async fn audit_log(&self, consent_id: &str) -> ConsentStoreResult<Vec<ConsentAuditEntry>>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct InMemoryConsentStore {
    consents: RwLock<HashMap<String, ConsentDetails>>,
    audit: RwLock<HashMap<String, Vec<ConsentAuditEntry>>>,
}

impl InMemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.consents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.consents.read().await.is_empty()
    }
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn get(&self, consent_id: &str) -> ConsentStoreResult<Option<ConsentDetails>> {
        Ok(self.consents.read().await.get(consent_id).cloned())
    }

    async fn put(&self, consent: ConsentDetails) -> ConsentStoreResult<()> {
        self.consents
            .write()
            .await
            .insert(consent.consent_id.clone(), consent);
        Ok(())
    }

    async fn append_audit(&self, entry: ConsentAuditEntry) -> ConsentStoreResult<()> {
        self.audit
            .write()
            .await
            .entry(entry.consent_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn audit_log(&self, consent_id: &str) -> ConsentStoreResult<Vec<ConsentAuditEntry>> {
        Ok(self
            .audit
            .read()
            .await
            .get(consent_id)
            .cloned()
            .unwrap_or_default())
    }
}
