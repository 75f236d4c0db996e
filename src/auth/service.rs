// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 PAR + PKCE flow against one bank.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::attempt::{AttemptGuard, AuthorizationAttempt};
use super::single_flight::RefreshRegistry;
use super::state::{AuthEvent, AuthState};
use super::types::{
    AuthenticationToken, ParRequest, ParResponse, TokenResponse, PAR_REQUEST_URI_PREFIX,
};
use crate::banks::BankConfiguration;
use crate::client::BankApiClient;
use crate::error::{ErrorKind, SamaError, SamaResult};
use crate::security::SecurityProvider;
use crate::transport::BankRequest;

/// Authorization, token exchange and refresh for one bank.
pub struct AuthenticationService {
    client: Arc<BankApiClient>,
    security: SecurityProvider,
    refreshes: RefreshRegistry,
}

impl AuthenticationService {
    pub fn new(client: Arc<BankApiClient>) -> Self {
        Self {
            client,
            security: SecurityProvider::new(),
            refreshes: RefreshRegistry::default(),
        }
    }

    pub fn bank(&self) -> &BankConfiguration {
        self.client.bank()
    }

    /// Push the authorization parameters to the bank's PAR endpoint.
    pub async fn initiate_par_request(&self, request: &ParRequest) -> SamaResult<ParResponse> {
        self.push_authorization_request(request, &CancellationToken::new())
            .await
    }

    /// `<authorization_endpoint>?request_uri=…&client_id=…`
    pub fn generate_authorization_url(
        &self,
        request_uri: &str,
        client_id: &str,
    ) -> SamaResult<String> {
        if !request_uri.starts_with(PAR_REQUEST_URI_PREFIX) {
            return Err(SamaError::bad_request(
                "request_uri was not issued by a PAR endpoint",
            ));
        }
        if client_id.trim().is_empty() {
            return Err(SamaError::bad_request("client_id is required"));
        }

        let mut url = url::Url::parse(&self.bank().authorization_endpoint).map_err(|e| {
            SamaError::invalid_state(format!("authorization endpoint is not a valid URL: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("request_uri", request_uri)
            .append_pair("client_id", client_id);
        Ok(url.into())
    }

    /// `authorization_code` grant.
    pub async fn exchange_code_for_token(
        &self,
        code: &str,
        code_verifier: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> SamaResult<AuthenticationToken> {
        self.exchange_code(
            code,
            code_verifier,
            client_id,
            redirect_uri,
            &CancellationToken::new(),
        )
        .await
    }

    /// `client_credentials` grant; the result never carries a refresh token.
    pub async fn client_credentials_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> SamaResult<AuthenticationToken> {
        require("client_id", client_id)?;
        require("client_secret", client_secret)?;

        let mut form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), client_id.to_string()),
            ("client_secret".to_string(), client_secret.to_string()),
        ];
        if !scope.trim().is_empty() {
            form.push(("scope".to_string(), scope.to_string()));
        }

        let mut token = self.token_request(form, &CancellationToken::new()).await?;
        token.refresh_token = None;
        info!(bank = %self.bank().bank_code, "Client credentials token issued");
        Ok(token)
    }

    /// `refresh_token` grant. Concurrent refreshes of the same token share
    /// one request.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> SamaResult<AuthenticationToken> {
        require("refresh_token", refresh_token)?;
        require("client_id", client_id)?;

        let key = RefreshRegistry::key(&self.bank().bank_code, refresh_token);
        self.refreshes
            .run(key, || self.refresh_once(refresh_token, client_id))
            .await
    }

    pub fn is_token_valid(&self, token: &AuthenticationToken) -> bool {
        token.is_valid()
    }

    pub fn is_token_expiring_soon(&self, token: &AuthenticationToken) -> bool {
        token.is_expiring_soon()
    }

    /// Start an authorization: fresh PKCE and state, PAR, authorization URL.
    ///
    /// The returned attempt is `AuthorizationPending`; send the user to
    /// [`AuthorizationAttempt::authorization_url`].
    pub async fn begin_authorization(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        consent_id: Option<&str>,
    ) -> SamaResult<AuthorizationAttempt> {
        let pkce = self
            .security
            .generate_pkce_challenge()
            .map_err(|e| SamaError::invalid_state(e.to_string()))?;
        let oauth_state = self
            .security
            .generate_state()
            .map_err(|e| SamaError::invalid_state(e.to_string()))?;

        let mut request =
            ParRequest::new(client_id, redirect_uri, scope).with_state(oauth_state.clone());
        if let Some(consent_id) = consent_id {
            request = request.with_consent_id(consent_id);
        }
        request = request.with_pkce(&pkce);
        request.validate()?;

        let mut attempt = AuthorizationAttempt::new(
            &self.bank().bank_code,
            client_id,
            redirect_uri,
            scope,
            pkce,
            oauth_state,
        );
        attempt.apply(AuthEvent::ParSent)?;

        let cancel = attempt.cancellation_token();
        let par = match self.push_authorization_request(&request, &cancel).await {
            Ok(par) => par,
            Err(err) => {
                attempt.fail();
                return Err(err);
            }
        };

        let url = match self.generate_authorization_url(&par.request_uri, client_id) {
            Ok(url) => url,
            Err(err) => {
                attempt.fail();
                return Err(err);
            }
        };
        attempt.record_par(par, url);
        attempt.apply(AuthEvent::ParAccepted)?;

        info!(
            attempt = %attempt.id(),
            bank = %self.bank().bank_code,
            "Authorization attempt awaiting user consent"
        );
        Ok(attempt)
    }

    /// Handle the redirect: check the echoed state, exchange the code and
    /// release the verifier.
    pub async fn complete_authorization(
        &self,
        attempt: &mut AuthorizationAttempt,
        code: &str,
        returned_state: &str,
    ) -> SamaResult<AuthenticationToken> {
        if attempt.state() != AuthState::AuthorizationPending {
            return Err(SamaError::invalid_state(format!(
                "attempt is {}, expected authorization_pending",
                attempt.state()
            )));
        }
        if returned_state != attempt.oauth_state() {
            warn!(attempt = %attempt.id(), "Authorization state mismatch, aborting attempt");
            attempt.fail();
            return Err(SamaError::bad_request("authorization state mismatch"));
        }
        require("code", code)?;

        attempt.apply(AuthEvent::CodeReceived)?;
        let mut attempt = AttemptGuard::new(attempt);
        let Some(verifier) = attempt.take_verifier() else {
            return Err(SamaError::invalid_state("PKCE verifier already released"));
        };

        let cancel = attempt.cancellation_token();
        let client_id = attempt.client_id().to_string();
        let redirect_uri = attempt.redirect_uri().to_string();
        let token = self
            .exchange_code(code, &verifier, &client_id, &redirect_uri, &cancel)
            .await?;
        attempt.apply(AuthEvent::TokenIssued)?;
        attempt.disarm();
        Ok(token)
    }

    /// `Authenticated → Refreshing → Authenticated` around a token refresh.
    ///
    /// A rejected refresh token (400/401) ends the session as expired; a
    /// transient failure leaves it authenticated with the old token.
    pub async fn refresh_session(
        &self,
        attempt: &mut AuthorizationAttempt,
        token: &AuthenticationToken,
        client_id: &str,
    ) -> SamaResult<AuthenticationToken> {
        let Some(refresh_token) = token.refresh_token.as_deref() else {
            return Err(SamaError::bad_request("token has no refresh_token"));
        };
        // Local argument errors must not read as a bank rejection below.
        require("refresh_token", refresh_token)?;
        require("client_id", client_id)?;

        attempt.apply(AuthEvent::RefreshStarted)?;
        let mut attempt = AttemptGuard::new(attempt);

        let cancel = attempt.cancellation_token();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SamaError::Cancelled),
            outcome = self.refresh_token(refresh_token, client_id) => outcome,
        };

        let event = match outcome.as_ref().err().map(SamaError::kind) {
            None => AuthEvent::RefreshSucceeded,
            Some(ErrorKind::BadRequest | ErrorKind::Unauthorized) => AuthEvent::Expired,
            // Dropping the armed guard fails the attempt.
            Some(ErrorKind::Cancelled) => return outcome,
            Some(_) => AuthEvent::RefreshFailed,
        };
        attempt.apply(event)?;
        attempt.disarm();
        outcome
    }

    async fn push_authorization_request(
        &self,
        request: &ParRequest,
        cancel: &CancellationToken,
    ) -> SamaResult<ParResponse> {
        request.validate()?;

        let http = BankRequest::post_form(&self.bank().par_endpoint, request.form());
        let response = self.client.send_cancellable(http, cancel).await?;
        let par: ParResponse = response.json()?;

        if !par.request_uri.starts_with(PAR_REQUEST_URI_PREFIX) {
            return Err(SamaError::invalid_response(
                "PAR response request_uri is not a PAR URN",
            ));
        }
        info!(
            bank = %self.bank().bank_code,
            expires_in = par.expires_in,
            "Pushed authorization request accepted"
        );
        Ok(par)
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        client_id: &str,
        redirect_uri: &str,
        cancel: &CancellationToken,
    ) -> SamaResult<AuthenticationToken> {
        require("code", code)?;
        require("code_verifier", code_verifier)?;
        require("client_id", client_id)?;
        require("redirect_uri", redirect_uri)?;

        let form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("code_verifier".to_string(), code_verifier.to_string()),
            ("client_id".to_string(), client_id.to_string()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
        ];
        let token = self.token_request(form, cancel).await?;
        info!(bank = %self.bank().bank_code, "Authorization code exchanged");
        Ok(token)
    }

    async fn refresh_once(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> SamaResult<AuthenticationToken> {
        let form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
            ("client_id".to_string(), client_id.to_string()),
        ];
        let mut token = self.token_request(form, &CancellationToken::new()).await?;
        // Banks that do not rotate refresh tokens omit them from the response.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        info!(bank = %self.bank().bank_code, "Access token refreshed");
        Ok(token)
    }

    async fn token_request(
        &self,
        form: Vec<(String, String)>,
        cancel: &CancellationToken,
    ) -> SamaResult<AuthenticationToken> {
        let request = BankRequest::post_form(&self.bank().token_endpoint, form);
        let response = self.client.send_cancellable(request, cancel).await?;
        let wire: TokenResponse = response.json()?;
        wire.into_token(Utc::now())
    }
}

fn require(field: &str, value: &str) -> SamaResult<()> {
    if value.trim().is_empty() {
        Err(SamaError::bad_request(format!("{field} is required")))
    } else {
        Ok(())
    }
}
