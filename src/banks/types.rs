// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bank configuration records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::security::pinning::CertificateFingerprint;

/// Deployment environment of a bank API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
    Development,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Sandbox => "sandbox",
            Environment::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment `{0}` (expected production, sandbox or development)")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "sandbox" => Ok(Environment::Sandbox),
            "development" | "dev" => Ok(Environment::Development),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

/// Bank name in both catalogue languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayName {
    pub en: String,
    pub ar: String,
}

impl DisplayName {
    /// Arabic for `ar*` locales, English otherwise.
    pub fn for_locale(&self, locale: &str) -> &str {
        if locale.to_ascii_lowercase().starts_with("ar") {
            &self.ar
        } else {
            &self.en
        }
    }
}

/// Bank-imposed request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    /// Requests allowed within any one second.
    pub burst_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub bulk_payments: bool,
    pub international_payments: bool,
    /// ISO 4217 codes, uppercase.
    pub supported_currencies: Vec<String>,
    /// Per-transaction ceiling in SAR.
    pub max_transaction_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportContact {
    pub email: String,
    pub phone: String,
}

/// Endpoints, credentials and policy for one bank in one environment.
///
/// Identified by `(bank_code, environment)`. Immutable once loaded into a
/// [`super::BankConfigurationRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankConfiguration {
    pub bank_code: String,
    pub display_name: DisplayName,
    pub environment: Environment,
    pub base_url: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub par_endpoint: String,
    pub client_id: String,
    pub supported_scopes: Vec<String>,
    pub certificate_fingerprints: Vec<CertificateFingerprint>,
    pub rate_limit: RateLimitPolicy,
    pub features: FeatureFlags,
    pub support: SupportContact,
}

impl BankConfiguration {
    /// Every URL the client may connect to, paired with its field name.
    pub fn endpoints(&self) -> [(&'static str, &str); 4] {
        [
            ("base_url", &self.base_url),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("par_endpoint", &self.par_endpoint),
        ]
    }

    /// `{base_url}/{path}` with exactly one separating slash.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn supports_currency(&self, currency: &str) -> bool {
        self.features
            .supported_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(currency.trim()))
    }

    /// Positive and within the per-transaction ceiling.
    pub fn allows_amount(&self, amount: f64) -> bool {
        amount.is_finite() && amount > 0.0 && amount <= self.features.max_transaction_amount
    }

    /// True when every space-separated scope in `scope` is supported.
    pub fn supports_scope(&self, scope: &str) -> bool {
        let mut requested = scope.split_whitespace().peekable();
        requested.peek().is_some()
            && requested.all(|s| self.supported_scopes.iter().any(|known| known == s))
    }
}
