// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the [`ClientSettings`] loader.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SAMA_ENVIRONMENT` | `production`, `sandbox` or `development` | `sandbox` |
//! | `SAMA_BANK_CATALOGUE` | JSON file replacing the built-in bank catalogue | built-in |
//! | `SAMA_MAX_ATTEMPTS` | Attempt budget per bank request (including the first) | `3` |
//! | `SAMA_MAX_RETRY_DELAY_SECS` | Longest wait before a retry; longer waits fail fast | `60` |
//! | `SAMA_HTTP_TIMEOUT_SECS` | Per-request timeout of the pinned transport | `15` |
//! | `SAMA_BANK_CODE` | Bank to connect to (e.g. `ALRAJHI`) | Required |
//! | `SAMA_CLIENT_ID` | Overrides the catalogue client id | catalogue value |
//! | `SAMA_REDIRECT_URI` | OAuth redirect URI registered with the bank | Required |
//! | `SAMA_SCOPE` | Space-separated OAuth scopes | `openid accounts` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,sama_openbanking=debug` |

use std::time::Duration;

use crate::banks::Environment;

/// Target environment of the bank catalogue.
///
/// # Default
/// `sandbox`
pub const ENVIRONMENT_ENV: &str = "SAMA_ENVIRONMENT";

/// Optional path to a JSON bank catalogue.
pub const BANK_CATALOGUE_ENV: &str = "SAMA_BANK_CATALOGUE";

pub const MAX_ATTEMPTS_ENV: &str = "SAMA_MAX_ATTEMPTS";
pub const MAX_RETRY_DELAY_ENV: &str = "SAMA_MAX_RETRY_DELAY_SECS";
pub const HTTP_TIMEOUT_ENV: &str = "SAMA_HTTP_TIMEOUT_SECS";
pub const BANK_CODE_ENV: &str = "SAMA_BANK_CODE";
pub const CLIENT_ID_ENV: &str = "SAMA_CLIENT_ID";
pub const REDIRECT_URI_ENV: &str = "SAMA_REDIRECT_URI";
pub const SCOPE_ENV: &str = "SAMA_SCOPE";

/// `json` for machine-readable logs, anything else for pretty output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_ENVIRONMENT: Environment = Environment::Sandbox;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_RETRY_DELAY_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SCOPE: &str = "openid accounts";
pub const DEFAULT_LOG_FILTER: &str = "info,sama_openbanking=debug";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Settings for one bank connection, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub environment: Environment,
    pub bank_code: String,
    /// `None` means the catalogue's client id is used.
    pub client_id: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub max_attempts: u32,
    /// A retry that would wait longer returns the error instead.
    pub max_retry_delay: Duration,
    pub http_timeout: Duration,
}

impl ClientSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_optional)
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup(ENVIRONMENT_ENV) {
            Some(raw) => raw
                .parse::<Environment>()
                .map_err(|e| ConfigError::Invalid {
                    name: ENVIRONMENT_ENV.to_string(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_ENVIRONMENT,
        };

        let bank_code = lookup(BANK_CODE_ENV)
            .ok_or_else(|| ConfigError::Missing(BANK_CODE_ENV.to_string()))?
            .to_ascii_uppercase();
        let client_id = lookup(CLIENT_ID_ENV);
        let redirect_uri = lookup(REDIRECT_URI_ENV)
            .ok_or_else(|| ConfigError::Missing(REDIRECT_URI_ENV.to_string()))?;
        url::Url::parse(&redirect_uri).map_err(|e| ConfigError::Invalid {
            name: REDIRECT_URI_ENV.to_string(),
            reason: e.to_string(),
        })?;
        let scope = lookup(SCOPE_ENV).unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        let max_attempts = parse_number(&lookup, MAX_ATTEMPTS_ENV, DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: MAX_ATTEMPTS_ENV.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let max_retry_delay_secs =
            parse_number(&lookup, MAX_RETRY_DELAY_ENV, DEFAULT_MAX_RETRY_DELAY_SECS)?;
        let timeout_secs = parse_number(&lookup, HTTP_TIMEOUT_ENV, DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            environment,
            bank_code,
            client_id,
            redirect_uri,
            scope,
            max_attempts,
            max_retry_delay: Duration::from_secs(max_retry_delay_secs),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_number<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Trimmed, non-empty value of an environment variable.
pub fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}
