// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization attempt state machine.
//!
//! ```text
//! Idle ─ParSent→ ParRequested ─ParAccepted→ AuthorizationPending
//!      ─CodeReceived→ CodeReceived ─TokenIssued→ Authenticated
//! Authenticated ─RefreshStarted→ Refreshing ─RefreshSucceeded|RefreshFailed→ Authenticated
//! any live state ─Failed→ Terminated(Failed)
//! pending or authenticated ─Expired→ Terminated(Expired)
//! Authenticated | Refreshing ─Revoked→ Terminated(Revoked)
//! ```

use std::fmt;

use crate::error::SamaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Revoked,
    Expired,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    ParRequested,
    AuthorizationPending,
    CodeReceived,
    Authenticated,
    Refreshing,
    Terminated(TerminationReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    ParSent,
    ParAccepted,
    CodeReceived,
    TokenIssued,
    RefreshStarted,
    RefreshSucceeded,
    /// A transient refresh failure; the current token stays in use.
    RefreshFailed,
    Revoked,
    Expired,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event:?} to an attempt in state {from}")]
pub struct InvalidTransition {
    pub from: AuthState,
    pub event: AuthEvent,
}

impl From<InvalidTransition> for SamaError {
    fn from(value: InvalidTransition) -> Self {
        SamaError::invalid_state(value.to_string())
    }
}

impl AuthState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuthState::Terminated(_))
    }

    /// Pure transition function.
    pub fn transition(self, event: AuthEvent) -> Result<AuthState, InvalidTransition> {
        use AuthEvent as E;
        use AuthState as S;

        let next = match (self, event) {
            (S::Terminated(_), _) => None,
            (S::Idle, E::ParSent) => Some(S::ParRequested),
            (S::ParRequested, E::ParAccepted) => Some(S::AuthorizationPending),
            (S::AuthorizationPending, E::CodeReceived) => Some(S::CodeReceived),
            (S::CodeReceived, E::TokenIssued) => Some(S::Authenticated),
            (S::Authenticated, E::RefreshStarted) => Some(S::Refreshing),
            (S::Refreshing, E::RefreshSucceeded | E::RefreshFailed) => Some(S::Authenticated),
            (S::Authenticated | S::Refreshing, E::Revoked) => {
                Some(S::Terminated(TerminationReason::Revoked))
            }
            (
                S::AuthorizationPending | S::CodeReceived | S::Authenticated | S::Refreshing,
                E::Expired,
            ) => Some(S::Terminated(TerminationReason::Expired)),
            (_, E::Failed) => Some(S::Terminated(TerminationReason::Failed)),
            _ => None,
        };

        next.ok_or(InvalidTransition { from: self, event })
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Idle => f.write_str("idle"),
            AuthState::ParRequested => f.write_str("par_requested"),
            AuthState::AuthorizationPending => f.write_str("authorization_pending"),
            AuthState::CodeReceived => f.write_str("code_received"),
            AuthState::Authenticated => f.write_str("authenticated"),
            AuthState::Refreshing => f.write_str("refreshing"),
            AuthState::Terminated(TerminationReason::Revoked) => f.write_str("terminated(revoked)"),
            AuthState::Terminated(TerminationReason::Expired) => f.write_str("terminated(expired)"),
            AuthState::Terminated(TerminationReason::Failed) => f.write_str("terminated(failed)"),
        }
    }
}
