// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! OAuth2 authorization against SAMA Open Banking banks.
//!
//! ## Auth Flow
//!
//! 1. [`AuthenticationService::begin_authorization`] generates a fresh PKCE
//!    challenge and anti-CSRF state and pushes them to the bank's PAR endpoint
//! 2. The user is sent to the bank's authorization endpoint with only the
//!    returned `request_uri` and the `client_id`
//! 3. On the redirect back, [`AuthenticationService::complete_authorization`]:
//!    - checks the echoed `state`
//!    - exchanges the code together with the PKCE verifier
//!    - releases the verifier
//! 4. Tokens are refreshed through
//!    [`AuthenticationService::refresh_session`]; concurrent refreshes of the
//!    same refresh token share one request
//!
//! ## Security
//!
//! - Every request goes through the certificate-pinned transport
//! - Only `S256` PKCE is supported
//! - Tokens are never persisted here; see [`crate::security::SecureStore`]
//! - Token values are redacted from `Debug` output

mod attempt;
mod service;
mod single_flight;
pub mod state;
pub mod types;

pub use attempt::AuthorizationAttempt;
pub use service::AuthenticationService;
pub use state::{AuthEvent, AuthState, InvalidTransition, TerminationReason};
pub use types::{
    AuthenticationToken, ParRequest, ParResponse, EXPIRING_SOON_THRESHOLD_SECS,
    PAR_REQUEST_URI_PREFIX,
};
