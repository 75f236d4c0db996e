// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SAMA Open Banking - Authentication & Consent Client
//!
//! This crate connects to Saudi Open Banking bank APIs: OAuth2 authorization
//! with Pushed Authorization Requests and PKCE, certificate-pinned TLS to
//! every bank host, and consents tracked through their regulated lifecycle.
//!
//! ## Modules
//!
//! - `auth` - PAR, authorization URL, token grants, authorization attempts
//! - `banks` - Bank configuration catalogue and registry
//! - `client` - Retrying, rate-limited request executor per bank
//! - `consent` - Consent lifecycle and audit trail
//! - `error_handler` - Failure classification, retry policy, localization
//! - `security` - PKCE, AEAD, fingerprints, secure storage
//! - `transport` - HTTP seam and the certificate-pinned implementation

pub mod auth;
pub mod banks;
pub mod client;
pub mod config;
pub mod consent;
pub mod error;
pub mod error_handler;
pub mod security;
pub mod telemetry;
pub mod transport;

pub use error::{ErrorKind, SamaError, SamaResult};
