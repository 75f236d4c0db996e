// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by every public operation of the crate.
//!
//! Bank-originated failures (4xx/5xx), transport failures (timeout,
//! connection) and unknown failures are kept apart so callers can decide
//! what to show and what to retry with an exhaustive `match`. The local
//! variants (`NotFound`, `InvalidState`, `CertificatePinning`, `Cancelled`)
//! are produced inside the crate and never from an HTTP status.

use std::fmt;

/// Result alias used across the crate.
pub type SamaResult<T> = Result<T, SamaError>;

/// Typed failure of a bank interaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamaError {
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        details: Option<String>,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        details: Option<String>,
    },

    #[error("Forbidden: {message}")]
    Forbidden {
        message: String,
        details: Option<String>,
    },

    #[error("Rate limited by bank, retry after {retry_after_seconds}s")]
    RateLimited {
        retry_after_seconds: u64,
        details: Option<String>,
    },

    #[error("Bank server error (HTTP {status}): {message}")]
    ServerError {
        status: u16,
        message: String,
        details: Option<String>,
    },

    #[error("Network timeout: {message}")]
    NetworkTimeout { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Unknown error: {message}")]
    UnknownError {
        status: Option<u16>,
        message: String,
        details: Option<String>,
    },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Certificate pinning failed for host {host}")]
    CertificatePinning { host: String },

    #[error("Operation cancelled")]
    Cancelled,
}

/// Payload-free discriminant of [`SamaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    RateLimited,
    ServerError,
    NetworkTimeout,
    NetworkError,
    UnknownError,
    NotFound,
    InvalidState,
    CertificatePinning,
    Cancelled,
}

impl SamaError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        SamaError::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        SamaError::Unauthorized {
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        SamaError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        SamaError::InvalidState {
            message: message.into(),
        }
    }

    /// Malformed or unexpected bank response.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        SamaError::UnknownError {
            status: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SamaError::BadRequest { .. } => ErrorKind::BadRequest,
            SamaError::Unauthorized { .. } => ErrorKind::Unauthorized,
            SamaError::Forbidden { .. } => ErrorKind::Forbidden,
            SamaError::RateLimited { .. } => ErrorKind::RateLimited,
            SamaError::ServerError { .. } => ErrorKind::ServerError,
            SamaError::NetworkTimeout { .. } => ErrorKind::NetworkTimeout,
            SamaError::NetworkError { .. } => ErrorKind::NetworkError,
            SamaError::UnknownError { .. } => ErrorKind::UnknownError,
            SamaError::NotFound { .. } => ErrorKind::NotFound,
            SamaError::InvalidState { .. } => ErrorKind::InvalidState,
            SamaError::CertificatePinning { .. } => ErrorKind::CertificatePinning,
            SamaError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        self.kind().code()
    }

    /// Raw response body or other diagnostic payload, if one was captured.
    ///
    /// Never shown to end users; log it only through
    /// [`crate::error_handler::redact`].
    pub fn details(&self) -> Option<&str> {
        match self {
            SamaError::BadRequest { details, .. }
            | SamaError::Unauthorized { details, .. }
            | SamaError::Forbidden { details, .. }
            | SamaError::RateLimited { details, .. }
            | SamaError::ServerError { details, .. }
            | SamaError::UnknownError { details, .. } => details.as_deref(),
            SamaError::NetworkTimeout { .. }
            | SamaError::NetworkError { .. }
            | SamaError::NotFound { .. }
            | SamaError::InvalidState { .. }
            | SamaError::CertificatePinning { .. }
            | SamaError::Cancelled => None,
        }
    }

    /// HTTP status that produced this error, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SamaError::BadRequest { .. } => Some(400),
            SamaError::Unauthorized { .. } => Some(401),
            SamaError::Forbidden { .. } => Some(403),
            SamaError::RateLimited { .. } => Some(429),
            SamaError::ServerError { status, .. } => Some(*status),
            SamaError::UnknownError { status, .. } => *status,
            _ => None,
        }
    }

    /// Localized message for end users (English fallback).
    pub fn user_message(&self, locale: &str) -> &'static str {
        crate::error_handler::localize(self, locale)
    }
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
            ErrorKind::NetworkTimeout => "network_timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::UnknownError => "unknown_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::CertificatePinning => "certificate_pinning_failed",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_message() {
        let bad = SamaError::bad_request("clientId is required");
        assert_eq!(bad.kind(), ErrorKind::BadRequest);
        assert_eq!(bad.to_string(), "Bad request: clientId is required");

        let missing = SamaError::not_found("consent", "CONSENT-123456");
        assert_eq!(missing.error_code(), "not_found");
        assert_eq!(missing.to_string(), "consent not found: CONSENT-123456");

        let state = SamaError::invalid_state("consent already revoked");
        assert_eq!(state.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn details_only_exposed_for_protocol_errors() {
        let server = SamaError::ServerError {
            status: 503,
            message: "unavailable".into(),
            details: Some("{\"Code\":\"UK.OBIE.Unavailable\"}".into()),
        };
        assert_eq!(server.details(), Some("{\"Code\":\"UK.OBIE.Unavailable\"}"));
        assert_eq!(server.status(), Some(503));

        let timeout = SamaError::NetworkTimeout {
            message: "token endpoint".into(),
        };
        assert_eq!(timeout.details(), None);
        assert_eq!(timeout.status(), None);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            SamaError::RateLimited {
                retry_after_seconds: 60,
                details: None
            }
            .error_code(),
            "rate_limited"
        );
        assert_eq!(SamaError::Cancelled.error_code(), "cancelled");
        assert_eq!(
            SamaError::CertificatePinning {
                host: "api.bank.sa".into()
            }
            .error_code(),
            "certificate_pinning_failed"
        );
    }
}
