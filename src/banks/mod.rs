// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Bank Configuration Registry
//!
//! Per-bank, per-environment endpoint sets, client identifiers, certificate
//! pins, rate limits and feature flags.
//!
//! ## Invariants (checked at load time)
//!
//! - Every endpoint URL is `https`.
//! - Every configuration has at least one well-formed pin.
//! - Production and sandbox of the same bank never share `client_id` or
//!   `base_url`.
//! - A `(bank_code, environment)` pair appears once.

mod catalogue;
mod registry;
mod types;

pub use registry::{BankConfigurationRegistry, RegistryError};
pub use types::{
    BankConfiguration, DisplayName, Environment, FeatureFlags, RateLimitPolicy, SupportContact,
    UnknownEnvironment,
};
