// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One user-delegated authorization attempt.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::state::{AuthEvent, AuthState};
use super::types::ParResponse;
use crate::error::SamaResult;
use crate::security::PkceChallenge;

/// PKCE material, anti-CSRF state and progress of a single authorization.
///
/// The PKCE verifier is held only until the code exchange; cancelling,
/// failing or completing the attempt releases it.
#[derive(Debug)]
pub struct AuthorizationAttempt {
    id: Uuid,
    bank_code: String,
    state: AuthState,
    oauth_state: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
    pkce: Option<PkceChallenge>,
    par: Option<ParResponse>,
    authorization_url: Option<String>,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
}

impl AuthorizationAttempt {
    pub(crate) fn new(
        bank_code: &str,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        pkce: PkceChallenge,
        oauth_state: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bank_code: bank_code.to_string(),
            state: AuthState::Idle,
            oauth_state,
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            pkce: Some(pkce),
            par: None,
            authorization_url: None,
            cancel: CancellationToken::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bank_code(&self) -> &str {
        &self.bank_code
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    /// Value the bank must echo back on the redirect.
    pub fn oauth_state(&self) -> &str {
        &self.oauth_state
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn par_response(&self) -> Option<&ParResponse> {
        self.par.as_ref()
    }

    pub fn authorization_url(&self) -> Option<&str> {
        self.authorization_url.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the PKCE verifier is still held.
    pub fn holds_verifier(&self) -> bool {
        self.pkce.is_some()
    }

    /// Handle another task can use to cancel this attempt's in-flight work.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort the attempt: cancel in-flight requests, release the verifier
    /// and move to `Terminated(Failed)`. No-op once terminated.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.is_terminated() {
            self.fail();
            info!(attempt = %self.id, bank = %self.bank_code, "Authorization attempt cancelled");
        }
    }

    pub fn mark_expired(&mut self) -> SamaResult<()> {
        self.apply(AuthEvent::Expired)?;
        self.pkce = None;
        Ok(())
    }

    pub fn mark_revoked(&mut self) -> SamaResult<()> {
        self.apply(AuthEvent::Revoked)
    }

    pub(crate) fn apply(&mut self, event: AuthEvent) -> SamaResult<()> {
        let next = self.state.transition(event)?;
        info!(
            attempt = %self.id,
            bank = %self.bank_code,
            from = %self.state,
            to = %next,
            "Authorization attempt transition"
        );
        self.state = next;
        Ok(())
    }

    /// Terminate as failed from any live state and release the verifier.
    pub(crate) fn fail(&mut self) {
        if !self.is_terminated() {
            // Every live state accepts `Failed`.
            let _ = self.apply(AuthEvent::Failed);
        }
        self.pkce = None;
    }

    pub(crate) fn take_verifier(&mut self) -> Option<String> {
        self.pkce.take().map(PkceChallenge::into_verifier)
    }

    pub(crate) fn record_par(&mut self, par: ParResponse, authorization_url: String) {
        self.par = Some(par);
        self.authorization_url = Some(authorization_url);
    }
}

/// Fails the attempt when dropped while armed, so a caller that drops an
/// in-flight exchange (timeout, `select!`) never leaves it half-way.
pub(crate) struct AttemptGuard<'a> {
    attempt: &'a mut AuthorizationAttempt,
    armed: bool,
}

impl<'a> AttemptGuard<'a> {
    pub(crate) fn new(attempt: &'a mut AuthorizationAttempt) -> Self {
        Self {
            attempt,
            armed: true,
        }
    }

    /// The attempt reached a state the caller may keep.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Deref for AttemptGuard<'_> {
    type Target = AuthorizationAttempt;

    fn deref(&self) -> &Self::Target {
        self.attempt
    }
}

impl DerefMut for AttemptGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.attempt
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.attempt.fail();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::state::TerminationReason;
    use crate::security::SecurityProvider;

    fn attempt() -> AuthorizationAttempt {
        let security = SecurityProvider::new();
        AuthorizationAttempt::new(
            "ALRAJHI",
            "c1",
            "https://app/cb",
            "openid accounts",
            security.generate_pkce_challenge().unwrap(),
            security.generate_state().unwrap(),
        )
    }

    #[test]
    fn cancel_releases_verifier_and_fails() {
        let mut attempt = attempt();
        let token = attempt.cancellation_token();
        attempt.apply(AuthEvent::ParSent).unwrap();

        attempt.cancel();
        assert!(token.is_cancelled());
        assert!(!attempt.holds_verifier());
        assert_eq!(
            attempt.state(),
            AuthState::Terminated(TerminationReason::Failed)
        );

        attempt.cancel();
        assert_eq!(
            attempt.state(),
            AuthState::Terminated(TerminationReason::Failed)
        );
    }

    #[test]
    fn verifier_is_single_use() {
        let mut attempt = attempt();
        let verifier = attempt.take_verifier().unwrap();
        assert!((43..=128).contains(&verifier.len()));
        assert!(attempt.take_verifier().is_none());
    }

    #[test]
    fn expiry_and_revocation_follow_state_machine() {
        let mut idle = attempt();
        assert!(idle.mark_expired().is_err());
        assert!(idle.mark_revoked().is_err());

        let mut pending = attempt();
        pending.apply(AuthEvent::ParSent).unwrap();
        pending.apply(AuthEvent::ParAccepted).unwrap();
        pending.mark_expired().unwrap();
        assert!(!pending.holds_verifier());
        assert_eq!(
            pending.state(),
            AuthState::Terminated(TerminationReason::Expired)
        );
    }
}
