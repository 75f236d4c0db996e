// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent records, requests and the consent state machine.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SamaError, SamaResult};

/// Permission every payment consent carries.
pub const PAYMENTS_PERMISSION: &str = "PAYMENTS";

/// Shortest consent id a bank may issue.
pub const MIN_CONSENT_ID_LEN: usize = 10;

/// Consent lifecycle status.
///
/// Serialized with the Open Banking wire spellings (`AwaitingAuthorisation`,
/// `Authorised`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsentStatus {
    #[serde(rename = "AwaitingAuthorisation")]
    AwaitingAuthorization,
    #[serde(rename = "Authorised")]
    Authorized,
    Rejected,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("consent cannot move from {from} to {to}")]
pub struct InvalidConsentTransition {
    pub from: ConsentStatus,
    pub to: ConsentStatus,
}

impl From<InvalidConsentTransition> for SamaError {
    fn from(value: InvalidConsentTransition) -> Self {
        SamaError::invalid_state(value.to_string())
    }
}

impl ConsentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConsentStatus::Rejected | ConsentStatus::Expired | ConsentStatus::Revoked
        )
    }

    /// Open Banking wire spelling.
    pub fn as_wire(self) -> &'static str {
        match self {
            ConsentStatus::AwaitingAuthorization => "AwaitingAuthorisation",
            ConsentStatus::Authorized => "Authorised",
            ConsentStatus::Rejected => "Rejected",
            ConsentStatus::Expired => "Expired",
            ConsentStatus::Revoked => "Revoked",
        }
    }

    /// Pure transition function.
    pub fn transition(self, to: ConsentStatus) -> Result<ConsentStatus, InvalidConsentTransition> {
        use ConsentStatus as S;

        let allowed = match self {
            S::AwaitingAuthorization => {
                matches!(to, S::Authorized | S::Rejected | S::Expired | S::Revoked)
            }
            S::Authorized => matches!(to, S::Expired | S::Revoked),
            S::Rejected | S::Expired | S::Revoked => false,
        };

        if allowed {
            Ok(to)
        } else {
            Err(InvalidConsentTransition { from: self, to })
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    AccountAccess,
    Payment,
}

/// Parameters of a new consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub permissions: Vec<String>,
    pub expiration_date_time: DateTime<Utc>,
    pub transaction_from_date_time: Option<DateTime<Utc>>,
    pub transaction_to_date_time: Option<DateTime<Utc>>,
}

impl ConsentRequest {
    pub fn new<I, S>(permissions: I, expiration_date_time: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            expiration_date_time,
            transaction_from_date_time: None,
            transaction_to_date_time: None,
        }
    }

    /// Request for a payment consent.
    pub fn payment(expiration_date_time: DateTime<Utc>) -> Self {
        Self::new([PAYMENTS_PERMISSION], expiration_date_time)
    }

    pub fn with_transaction_window(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.transaction_from_date_time = Some(from);
        self.transaction_to_date_time = Some(to);
        self
    }

    pub(crate) fn validate(&self, now: DateTime<Utc>) -> SamaResult<()> {
        if self.permissions.is_empty() {
            return Err(SamaError::bad_request("at least one permission is required"));
        }
        if self.permissions.iter().any(|p| p.trim().is_empty()) {
            return Err(SamaError::bad_request("permissions must not be blank"));
        }
        if self.expiration_date_time <= now {
            return Err(SamaError::bad_request(
                "expiration_date_time must be in the future",
            ));
        }
        if let (Some(from), Some(to)) = (
            self.transaction_from_date_time,
            self.transaction_to_date_time,
        ) {
            if from > to {
                return Err(SamaError::bad_request(
                    "transaction window starts after it ends",
                ));
            }
        }
        Ok(())
    }
}

/// Locally tracked consent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentDetails {
    pub consent_id: String,
    pub bank_code: String,
    pub kind: ConsentKind,
    pub status: ConsentStatus,
    pub permissions: BTreeSet<String>,
    pub creation_date_time: DateTime<Utc>,
    pub status_update_date_time: DateTime<Utc>,
    pub expiration_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_from_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_to_date_time: Option<DateTime<Utc>>,
}

impl ConsentDetails {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration_date_time
    }

    /// `true` only while authorized, unexpired and covering every `required`
    /// permission.
    pub fn grants_at<S: AsRef<str>>(&self, required: &[S], now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Authorized
            && !self.is_expired_at(now)
            && required
                .iter()
                .all(|permission| self.permissions.contains(permission.as_ref()))
    }

    pub fn permission_snapshot(&self) -> Vec<String> {
        self.permissions.iter().cloned().collect()
    }
}

// --- Wire format ------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "Data")]
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ConsentRequestData<'a> {
    pub permissions: &'a [String],
    pub expiration_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_from_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_to_date_time: Option<DateTime<Utc>>,
}

impl<'a> From<&'a ConsentRequest> for ConsentRequestData<'a> {
    fn from(request: &'a ConsentRequest) -> Self {
        Self {
            permissions: &request.permissions,
            expiration_date_time: request.expiration_date_time,
            transaction_from_date_time: request.transaction_from_date_time,
            transaction_to_date_time: request.transaction_to_date_time,
        }
    }
}

/// Consent resource as returned by `POST /consents` and `GET /consents/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ConsentResponseData {
    pub consent_id: String,
    pub status: ConsentStatus,
    #[serde(default)]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_update_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiration_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

impl ConsentResponseData {
    pub(crate) fn check_id(&self) -> SamaResult<()> {
        if self.consent_id.trim().len() < MIN_CONSENT_ID_LEN {
            return Err(SamaError::invalid_response(format!(
                "consent id `{}` is shorter than {MIN_CONSENT_ID_LEN} characters",
                self.consent_id
            )));
        }
        Ok(())
    }
}
