// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent audit trail.
//!
//! One entry is appended per consent state transition. Entries are never
//! mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::ConsentStatus;

/// Audited consent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentAction {
    Created,
    Authorised,
    Rejected,
    Expired,
    Revoked,
}

impl ConsentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentAction::Created => "CREATED",
            ConsentAction::Authorised => "AUTHORISED",
            ConsentAction::Rejected => "REJECTED",
            ConsentAction::Expired => "EXPIRED",
            ConsentAction::Revoked => "REVOKED",
        }
    }
}

impl From<ConsentStatus> for ConsentAction {
    /// Action recorded when a consent enters `status`.
    fn from(status: ConsentStatus) -> Self {
        match status {
            ConsentStatus::AwaitingAuthorization => ConsentAction::Created,
            ConsentStatus::Authorized => ConsentAction::Authorised,
            ConsentStatus::Rejected => ConsentAction::Rejected,
            ConsentStatus::Expired => ConsentAction::Expired,
            ConsentStatus::Revoked => ConsentAction::Revoked,
        }
    }
}

/// An audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentAuditEntry {
    /// Unique entry ID.
    pub entry_id: String,
    pub consent_id: String,
    pub action: ConsentAction,
    pub timestamp: DateTime<Utc>,
    /// Permissions held by the consent when the entry was written.
    pub permissions: Vec<String>,
    /// FAPI interaction id of the bank call behind the transition, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
}

impl ConsentAuditEntry {
    pub fn new(consent_id: impl Into<String>, action: ConsentAction) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            consent_id: consent_id.into(),
            action,
            timestamp: Utc::now(),
            permissions: Vec::new(),
            interaction_id: None,
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_interaction_id(mut self, interaction_id: Option<&str>) -> Self {
        self.interaction_id = interaction_id.map(str::to_string);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
