// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Bank Transport
//!
//! The HTTP seam between the services and a bank. Services build a
//! [`BankRequest`], hand it to a [`BankTransport`] and receive either a
//! [`BankResponse`] (any status) or a structured [`TransportError`].
//!
//! Production code uses [`PinnedTransport`], which refuses to complete a TLS
//! handshake with a bank host whose certificate chain does not match the
//! bank's pinned fingerprints.

pub mod pinned;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{SamaError, SamaResult};

pub use pinned::PinnedTransport;

/// Correlation header sent with every bank request.
pub const INTERACTION_ID_HEADER: &str = "x-fapi-interaction-id";

/// Request body variants used by the Open Banking endpoints.
#[derive(Clone)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded` (PAR and token endpoints).
    Form(Vec<(String, String)>),
    /// `application/json` (consent endpoints).
    Json(Value),
}

/// A single HTTP request to a bank endpoint.
#[derive(Clone)]
pub struct BankRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl BankRequest {
    fn new(method: Method, url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![(
                INTERACTION_ID_HEADER.to_string(),
                Uuid::new_v4().to_string(),
            )],
            body,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url, RequestBody::Empty)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url, RequestBody::Empty)
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self::new(Method::POST, url, RequestBody::Form(form))
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url, RequestBody::Json(body))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, access_token: &str) -> Self {
        self.header("Authorization", format!("Bearer {access_token}"))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Value of a form field, if this is a form request.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Host part of the target URL, used in logs and pinning errors.
    pub fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

// Headers and bodies carry bearer tokens, client secrets and PKCE verifiers.
impl fmt::Debug for BankRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Raw bank response, any status.
#[derive(Debug, Clone)]
pub struct BankResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl BankResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body, mapping malformed payloads to `UnknownError`.
    pub fn json<T: DeserializeOwned>(&self) -> SamaResult<T> {
        serde_json::from_str(&self.body).map_err(|e| SamaError::UnknownError {
            status: Some(self.status),
            message: format!("invalid JSON in bank response: {e}"),
            details: None,
        })
    }
}

/// Structured transport failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request or connect phase exceeded its deadline.
    Timeout,
    /// TCP/DNS level failure before a response was received.
    Connect,
    /// TLS handshake failed for a reason other than pinning.
    Tls,
    /// The presented certificate chain matched none of the bank's pins.
    CertificatePinning,
    /// The response body could not be read.
    Body,
    Other,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?} transport failure: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub host: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            host: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

/// HTTP client capability used by the services.
#[async_trait]
pub trait BankTransport: Send + Sync {
    /// Send a request; non-2xx statuses are returned as `Ok` responses.
    async fn execute(&self, request: BankRequest) -> Result<BankResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_carry_interaction_id() {
        let first = BankRequest::get("https://api.bank.sa/consents/1");
        let second = BankRequest::get("https://api.bank.sa/consents/1");
        let a = first.header_value(INTERACTION_ID_HEADER).unwrap();
        let b = second.header_value(INTERACTION_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(a).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn debug_output_hides_credentials() {
        let request = BankRequest::post_form(
            "https://auth.bank.sa/token",
            vec![("client_secret".into(), "s3cr3t".into())],
        )
        .bearer("eyJhbGciOi");
        let debug = format!("{request:?}");
        assert!(debug.contains("https://auth.bank.sa/token"));
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("eyJhbGciOi"));
    }

    #[test]
    fn form_and_host_helpers() {
        let request = BankRequest::post_form(
            "https://auth.alrajhibank.com.sa/par",
            vec![("client_id".into(), "c1".into())],
        );
        assert_eq!(request.form_value("client_id"), Some("c1"));
        assert_eq!(request.form_value("scope"), None);
        assert_eq!(request.host(), "auth.alrajhibank.com.sa");
    }

    #[test]
    fn response_json_maps_garbage_to_unknown_error() {
        let response = BankResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: "<html>".into(),
        };
        let err = response.json::<Value>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnknownError);
        assert_eq!(err.status(), Some(200));
    }
}
