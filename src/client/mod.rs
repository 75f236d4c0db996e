// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Bank API client
//!
//! Executes [`BankRequest`]s against one bank: enforces the bank's
//! client-side rate limit, classifies failures through [`ErrorHandler`],
//! waits out backoff delays and re-attempts up to the attempt budget.

mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::banks::BankConfiguration;
use crate::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RETRY_DELAY_SECS};
use crate::error::{SamaError, SamaResult};
use crate::error_handler::ErrorHandler;
use crate::transport::{BankRequest, BankResponse, BankTransport, INTERACTION_ID_HEADER};

pub use rate_limit::RateLimiter;

/// Retrying request executor bound to one bank.
pub struct BankApiClient {
    bank: Arc<BankConfiguration>,
    transport: Arc<dyn BankTransport>,
    limiter: RateLimiter,
    max_attempts: u32,
    max_retry_delay: Duration,
}

impl BankApiClient {
    pub fn new(bank: Arc<BankConfiguration>, transport: Arc<dyn BankTransport>) -> Self {
        let limiter = RateLimiter::new(&bank.rate_limit);
        Self {
            bank,
            transport,
            limiter,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_retry_delay: Duration::from_secs(DEFAULT_MAX_RETRY_DELAY_SECS),
        }
    }

    /// Attempt budget including the first attempt; clamped to at least 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Longest wait the client sleeps before a retry. A longer Retry-After
    /// or rate-limit window is returned to the caller instead.
    pub fn with_max_retry_delay(mut self, max_retry_delay: Duration) -> Self {
        self.max_retry_delay = max_retry_delay;
        self
    }

    pub fn bank(&self) -> &BankConfiguration {
        &self.bank
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn send(&self, request: BankRequest) -> SamaResult<BankResponse> {
        self.send_cancellable(request, &CancellationToken::new()).await
    }

    /// Send with retries. Cancelling `cancel` aborts the in-flight attempt
    /// or the backoff wait and yields [`SamaError::Cancelled`].
    pub async fn send_cancellable(
        &self,
        request: BankRequest,
        cancel: &CancellationToken,
    ) -> SamaResult<BankResponse> {
        let interaction_id = request
            .header_value(INTERACTION_ID_HEADER)
            .unwrap_or_default()
            .to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SamaError::Cancelled),
                outcome = self.attempt_once(request.clone()) => outcome,
            };

            let error = match outcome {
                Ok(response) => {
                    debug!(
                        bank = %self.bank.bank_code,
                        interaction_id = %interaction_id,
                        status = response.status,
                        attempt,
                        "Bank request succeeded"
                    );
                    return Ok(response);
                }
                Err(error) => error,
            };

            ErrorHandler::log(&error);
            if !ErrorHandler::should_retry(&error, attempt, self.max_attempts) {
                return Err(error);
            }

            let delay = ErrorHandler::retry_delay(&error, attempt);
            if delay > self.max_retry_delay {
                info!(
                    bank = %self.bank.bank_code,
                    interaction_id = %interaction_id,
                    code = error.error_code(),
                    delay_ms = delay.as_millis() as u64,
                    max_delay_ms = self.max_retry_delay.as_millis() as u64,
                    "Retry delay exceeds ceiling, returning error"
                );
                return Err(error);
            }
            info!(
                bank = %self.bank.bank_code,
                interaction_id = %interaction_id,
                code = error.error_code(),
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying bank request"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SamaError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Send and deserialize a successful JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: BankRequest) -> SamaResult<T> {
        self.send(request).await?.json()
    }

    async fn attempt_once(&self, request: BankRequest) -> SamaResult<BankResponse> {
        if let Err(wait) = self.limiter.try_acquire() {
            let retry_after_seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return Err(SamaError::RateLimited {
                retry_after_seconds: retry_after_seconds.max(1),
                details: Some(format!(
                    "client-side rate limit for {} exhausted",
                    self.bank.bank_code
                )),
            });
        }

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| ErrorHandler::classify_transport_failure(&e))?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(ErrorHandler::classify(
                response.status,
                &response.body,
                &response.headers,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banks::{BankConfigurationRegistry, Environment, RateLimitPolicy};
    use crate::error::ErrorKind;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::TransportErrorKind;
    use serde_json::json;
    use tokio::time::Instant;

    fn bank() -> Arc<BankConfiguration> {
        BankConfigurationRegistry::builtin()
            .unwrap()
            .get_configuration("SNB", Environment::Sandbox)
            .unwrap()
    }

    fn client(transport: &Arc<ScriptedTransport>) -> BankApiClient {
        BankApiClient::new(bank(), transport.clone())
    }

    fn consents_request() -> BankRequest {
        BankRequest::get(bank().api_url("consents/CONSENT-0001"))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_server_error_with_backoff() {
        let transport = ScriptedTransport::new();
        transport
            .push_status(503, &[], "")
            .push_status(502, &[], "")
            .push_json(200, json!({"ok": true}));

        let started = Instant::now();
        let response = client(&transport).send(consents_request()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.request_count(), 3);
        // 1000 ms after attempt 1, 2000 ms after attempt 2.
        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_budget_is_spent() {
        let transport = ScriptedTransport::new();
        transport
            .push_error(TransportErrorKind::Timeout)
            .push_error(TransportErrorKind::Timeout)
            .push_error(TransportErrorKind::Timeout)
            .push_json(200, json!({}));

        let err = client(&transport).send(consents_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkTimeout);
        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_fails_immediately() {
        let transport = ScriptedTransport::new();
        transport
            .push_status(401, &[], r#"{"error":"invalid_token"}"#)
            .push_json(200, json!({}));

        let err = client(&transport).send(consents_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn honours_retry_after() {
        let transport = ScriptedTransport::new();
        transport
            .push_status(429, &[("Retry-After", "7")], "")
            .push_json(200, json!({}));

        let started = Instant::now();
        client(&transport).send(consents_request()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn long_retry_after_is_returned_to_caller() {
        let transport = ScriptedTransport::new();
        transport
            .push_status(429, &[("Retry-After", "3600")], "")
            .push_json(200, json!({}));

        let started = Instant::now();
        let err = client(&transport).send(consents_request()).await.unwrap_err();

        assert!(matches!(
            err,
            SamaError::RateLimited {
                retry_after_seconds: 3600,
                ..
            }
        ));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_daily_window_is_not_slept_out() {
        let mut config = (*bank()).clone();
        config.rate_limit = RateLimitPolicy {
            requests_per_minute: 0,
            requests_per_hour: 0,
            requests_per_day: 1,
            burst_limit: 0,
        };
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({})).push_json(200, json!({}));

        let client = BankApiClient::new(Arc::new(config), transport.clone())
            .with_max_retry_delay(Duration::from_secs(5));
        client.send(consents_request()).await.unwrap();

        let started = Instant::now();
        let err = client.send(consents_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_reuse_interaction_id() {
        let transport = ScriptedTransport::new();
        transport
            .push_error(TransportErrorKind::Connect)
            .push_json(200, json!({}));

        client(&transport).send(consents_request()).await.unwrap();
        let requests = transport.requests();
        assert_eq!(
            requests[0].header_value(INTERACTION_ID_HEADER),
            requests[1].header_value(INTERACTION_ID_HEADER)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pin_mismatch_is_not_retried() {
        let transport = ScriptedTransport::new();
        transport.push_error(TransportErrorKind::CertificatePinning);

        let err = client(&transport).send(consents_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CertificatePinning);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let transport = ScriptedTransport::new();
        transport
            .push_status(503, &[], "")
            .push_json(200, json!({}));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = client(&transport)
            .send_cancellable(consents_request(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, SamaError::Cancelled);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn client_side_limit_is_reported_as_rate_limited() {
        let mut config = (*bank()).clone();
        config.rate_limit = RateLimitPolicy {
            requests_per_minute: 1,
            requests_per_hour: 100,
            requests_per_day: 1_000,
            burst_limit: 5,
        };
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({})).push_json(200, json!({}));

        let client = BankApiClient::new(Arc::new(config), transport.clone()).with_max_attempts(1);
        client.send(consents_request()).await.unwrap();
        let err = client.send(consents_request()).await.unwrap_err();

        assert!(matches!(
            err,
            SamaError::RateLimited {
                retry_after_seconds: 60,
                ..
            }
        ));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_json_decodes_body() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({"Data": {"ConsentId": "CONSENT-0001"}}));

        let value: serde_json::Value = client(&transport)
            .send_json(consents_request())
            .await
            .unwrap();
        assert_eq!(value["Data"]["ConsentId"], "CONSENT-0001");
    }
}
