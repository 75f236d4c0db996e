// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Error Handler
//!
//! Maps HTTP statuses and transport failures onto [`SamaError`] and decides
//! whether and when a failed request is retried.
//!
//! ## Retry policy
//!
//! | Class | Retried | Delay before attempt `n + 1` |
//! |-------|---------|------------------------------|
//! | `NetworkTimeout`, `NetworkError` | yes | `min(1000 · 2^(n-1), 30000)` ms |
//! | `ServerError` | while `n < 3` | `min(1000 · 2^(n-1), 30000)` ms |
//! | `RateLimited` | yes | `Retry-After` seconds |
//! | everything else | no | 0 |
//!
//! No class is retried once the attempt budget is spent.

mod localization;
mod redaction;

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use tracing::warn;

use crate::error::{ErrorKind, SamaError};
use crate::transport::{TransportError, TransportErrorKind};

pub use localization::{localize, message, Locale};
pub use redaction::redact;

/// Seconds to wait when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const BASE_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Attempt number below which a `ServerError` is still retried.
const SERVER_ERROR_RETRY_CEILING: u32 = 3;

/// Stateless classification and retry decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler;

impl ErrorHandler {
    /// Classify a non-success bank response.
    pub fn classify(status: u16, body: &str, headers: &HeaderMap) -> SamaError {
        let details = (!body.trim().is_empty()).then(|| body.to_string());
        let message = extract_message(body).unwrap_or_else(|| format!("HTTP {status}"));

        match status {
            400 => SamaError::BadRequest { message, details },
            401 => SamaError::Unauthorized { message, details },
            403 => SamaError::Forbidden { message, details },
            429 => SamaError::RateLimited {
                retry_after_seconds: retry_after_seconds(headers),
                details,
            },
            500..=599 => SamaError::ServerError {
                status,
                message,
                details,
            },
            _ => SamaError::UnknownError {
                status: Some(status),
                message,
                details,
            },
        }
    }

    /// Classify a failure that produced no HTTP response.
    pub fn classify_transport_failure(err: &TransportError) -> SamaError {
        let message = match &err.host {
            Some(host) => format!("{} ({host})", err.message),
            None => err.message.clone(),
        };
        match err.kind {
            TransportErrorKind::Timeout => SamaError::NetworkTimeout { message },
            TransportErrorKind::Connect | TransportErrorKind::Tls => {
                SamaError::NetworkError { message }
            }
            TransportErrorKind::CertificatePinning => SamaError::CertificatePinning {
                host: err.host.clone().unwrap_or_default(),
            },
            TransportErrorKind::Body | TransportErrorKind::Other => SamaError::UnknownError {
                status: None,
                message,
                details: None,
            },
        }
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn should_retry(error: &SamaError, attempt: u32, max_attempts: u32) -> bool {
        if attempt >= max_attempts {
            return false;
        }
        match error.kind() {
            ErrorKind::NetworkTimeout | ErrorKind::NetworkError | ErrorKind::RateLimited => true,
            ErrorKind::ServerError => attempt < SERVER_ERROR_RETRY_CEILING,
            _ => false,
        }
    }

    /// Wait before the attempt following `attempt`.
    pub fn retry_delay(error: &SamaError, attempt: u32) -> Duration {
        match error {
            SamaError::RateLimited {
                retry_after_seconds,
                ..
            } => Duration::from_millis(retry_after_seconds.saturating_mul(1_000)),
            SamaError::NetworkTimeout { .. }
            | SamaError::NetworkError { .. }
            | SamaError::ServerError { .. } => Duration::from_millis(backoff_ms(attempt)),
            _ => Duration::ZERO,
        }
    }

    /// Whether the class is ever retried, independent of the attempt count.
    pub fn is_retryable(error: &SamaError) -> bool {
        matches!(
            error.kind(),
            ErrorKind::NetworkTimeout
                | ErrorKind::NetworkError
                | ErrorKind::ServerError
                | ErrorKind::RateLimited
        )
    }

    pub fn localize(error: &SamaError, locale: &str) -> &'static str {
        localize(error, locale)
    }

    pub fn redact(text: &str) -> String {
        redact(text)
    }

    /// Emit a redacted warning for `error`.
    pub fn log(error: &SamaError) {
        warn!(
            code = error.error_code(),
            status = ?error.status(),
            retryable = Self::is_retryable(error),
            message = %redact(&error.to_string()),
            details = %error.details().map(redact).unwrap_or_default(),
            "Bank request failed"
        );
    }
}

/// `min(1000 · 2^(attempt-1), 30000)`; attempt 0 is treated as 1.
fn backoff_ms(attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1);
    1u64.checked_shl(exponent)
        .map(|factor| BASE_BACKOFF_MS.saturating_mul(factor))
        .unwrap_or(MAX_BACKOFF_MS)
        .min(MAX_BACKOFF_MS)
}

/// Delay-seconds form of `Retry-After`; the HTTP-date form falls back to the default.
fn retry_after_seconds(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Pull a developer message out of an Open Banking or OAuth error body.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let first_error = value
        .get("Errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first());

    let candidates = [
        value.get("error_description"),
        value.get("Message"),
        first_error.and_then(|e| e.get("Message")),
        value.get("error"),
        value.get("Code"),
    ];
    let message = candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string);
    message
}
