// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Certificate-pinned HTTPS transport.
//!
//! ## Security
//!
//! - Only `https` URLs are accepted (`https_only`).
//! - The server chain is first verified against the webpki roots, then at
//!   least one certificate in the chain must match a pinned SHA-256
//!   fingerprint of the bank. A mismatch fails the handshake, so no request
//!   line, header or body is ever written to the socket.
//! - An empty pin set rejects every handshake.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, OtherError, RootCertStore, SignatureScheme};
use tracing::{debug, warn};
use webpki_roots::TLS_SERVER_ROOTS;

use super::{
    BankRequest, BankResponse, BankTransport, RequestBody, TransportError, TransportErrorKind,
};
use crate::banks::BankConfiguration;
use crate::security::pinning::{CertificateFingerprint, CertificatePinningValidator};

/// Raised inside the TLS handshake when no chain certificate matches a pin.
#[derive(Debug, thiserror::Error)]
#[error("certificate chain for {host} matched no pinned fingerprint")]
pub struct PinMismatch {
    pub host: String,
}

/// rustls verifier that layers fingerprint pinning on top of webpki validation.
#[derive(Debug)]
pub struct PinnedCertVerifier {
    inner: Arc<WebPkiServerVerifier>,
    validator: CertificatePinningValidator,
}

impl PinnedCertVerifier {
    pub fn new(
        validator: CertificatePinningValidator,
        provider: Arc<rustls::crypto::CryptoProvider>,
    ) -> Result<Self, TransportError> {
        let mut roots = RootCertStore::empty();
        roots.extend(TLS_SERVER_ROOTS.iter().cloned());

        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Tls,
                    format!("failed to build certificate verifier: {e}"),
                )
            })?;

        Ok(Self { inner, validator })
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;

        let host = match server_name {
            ServerName::DnsName(name) => name.as_ref().to_string(),
            other => format!("{other:?}"),
        };

        let chain: Vec<CertificateFingerprint> = std::iter::once(end_entity)
            .chain(intermediates.iter())
            .map(|cert| CertificateFingerprint::of_der(cert.as_ref()))
            .collect();

        if self.validator.validate_chain(&host, &chain) {
            debug!(host = %host, "Certificate pin matched");
            Ok(ServerCertVerified::assertion())
        } else {
            warn!(
                host = %host,
                presented = chain.len(),
                "Certificate pinning failed, aborting handshake"
            );
            Err(rustls::Error::Other(OtherError(Arc::new(PinMismatch {
                host,
            }))))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// reqwest-backed transport bound to one bank's pin set.
#[derive(Debug, Clone)]
pub struct PinnedTransport {
    bank_code: String,
    http: reqwest::Client,
}

impl PinnedTransport {
    /// Build a transport whose TLS layer only trusts `bank`'s pinned chain.
    pub fn for_bank(bank: &BankConfiguration, timeout: Duration) -> Result<Self, TransportError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let validator = CertificatePinningValidator::new(bank.certificate_fingerprints.clone());
        let verifier = PinnedCertVerifier::new(validator, provider.clone())?;

        let tls = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportError::new(TransportErrorKind::Tls, e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        let http = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .https_only(true)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Other,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            bank_code: bank.bank_code.clone(),
            http,
        })
    }
}

#[async_trait]
impl BankTransport for PinnedTransport {
    async fn execute(&self, request: BankRequest) -> Result<BankResponse, TransportError> {
        let host = request.host();
        debug!(
            bank = %self.bank_code,
            method = %request.method,
            host = %host,
            "Sending bank request"
        );

        let mut builder = self.http.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => builder.form(pairs),
            RequestBody::Json(value) => builder.json(value),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e).with_host(host.clone()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(&e).with_host(host))?;

        Ok(BankResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest failure onto the structured transport taxonomy.
fn map_reqwest_error(err: &reqwest::Error) -> TransportError {
    let kind = if chain_contains(err, is_pin_mismatch) {
        TransportErrorKind::CertificatePinning
    } else if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if chain_contains(err, is_rustls_error) {
        TransportErrorKind::Tls
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
}

fn is_pin_mismatch(err: &(dyn StdError + 'static)) -> bool {
    if err.downcast_ref::<PinMismatch>().is_some() {
        return true;
    }
    matches!(
        err.downcast_ref::<rustls::Error>(),
        Some(rustls::Error::Other(other)) if other.0.downcast_ref::<PinMismatch>().is_some()
    )
}

fn is_rustls_error(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<rustls::Error>().is_some()
}

/// Walk the source chain, looking inside `io::Error` payloads as well
/// (their `source()` skips the wrapped error itself).
fn chain_contains(
    err: &(dyn StdError + 'static),
    predicate: fn(&(dyn StdError + 'static)) -> bool,
) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if predicate(e) {
            return true;
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if let Some(inner) = io.get_ref() {
                if chain_contains(inner, predicate) {
                    return true;
                }
            }
        }
        current = e.source();
    }
    false
}
