// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Consent Module
//!
//! Account-access and payment consents through their regulated lifecycle:
//!
//! ```text
//! AwaitingAuthorization ─→ Authorized ─→ Expired | Revoked
//!          └──────────────→ Rejected | Expired | Revoked
//! ```
//!
//! Records and their audit trail live in an injected [`ConsentStore`];
//! [`InMemoryConsentStore`] keeps them for the lifetime of the process.

mod audit;
mod manager;
mod store;
mod types;

pub use audit::{ConsentAction, ConsentAuditEntry};
pub use manager::ConsentManager;
pub use store::{ConsentStore, ConsentStoreError, ConsentStoreResult, InMemoryConsentStore};
pub use types::{
    ConsentDetails, ConsentKind, ConsentRequest, ConsentStatus, InvalidConsentTransition,
    MIN_CONSENT_ID_LEN, PAYMENTS_PERMISSION,
};
