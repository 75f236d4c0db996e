// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 request/response records.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SamaError, SamaResult};
use crate::security::PkceChallenge;

/// Prefix of every `request_uri` issued by a PAR endpoint (RFC 9126).
pub const PAR_REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";

/// Remaining lifetime under which a token counts as expiring soon.
pub const EXPIRING_SOON_THRESHOLD_SECS: i64 = 5 * 60;

/// Pushed Authorization Request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
    pub consent_id: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

impl ParRequest {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_consent_id(mut self, consent_id: impl Into<String>) -> Self {
        self.consent_id = Some(consent_id.into());
        self
    }

    pub fn with_pkce(mut self, pkce: &PkceChallenge) -> Self {
        self.code_challenge = Some(pkce.code_challenge().to_string());
        self.code_challenge_method = Some(pkce.code_challenge_method().to_string());
        self
    }

    pub(crate) fn validate(&self) -> SamaResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(SamaError::bad_request("client_id is required"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(SamaError::bad_request("redirect_uri is required"));
        }
        Ok(())
    }

    /// `application/x-www-form-urlencoded` body for the PAR endpoint.
    pub(crate) fn form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("response_type".to_string(), "code".to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
        ];
        if !self.scope.trim().is_empty() {
            form.push(("scope".to_string(), self.scope.clone()));
        }
        let optional = [
            ("state", &self.state),
            ("consent_id", &self.consent_id),
            ("code_challenge", &self.code_challenge),
            ("code_challenge_method", &self.code_challenge_method),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                form.push((key.to_string(), value.clone()));
            }
        }
        form
    }
}

/// PAR endpoint response: a short-lived, single-use request handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParResponse {
    pub request_uri: String,
    pub expires_in: u64,
}

/// Issued OAuth2 token set.
///
/// Never persisted by this crate; callers hand it to a
/// [`crate::security::SecureStore`] if it must survive the process.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub issued_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl AuthenticationToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now < self.expires_at()
    }

    pub fn is_expiring_soon(&self) -> bool {
        self.is_expiring_soon_at(Utc::now())
    }

    pub fn is_expiring_soon_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() - now < Duration::seconds(EXPIRING_SOON_THRESHOLD_SECS)
    }
}

impl fmt::Debug for AuthenticationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationToken")
            .field("access_token", &"**redacted**")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "**redacted**"),
            )
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token endpoint wire format.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Validate and stamp with the capture time.
    pub(crate) fn into_token(self, issued_at: DateTime<Utc>) -> SamaResult<AuthenticationToken> {
        if self.access_token.trim().is_empty() {
            return Err(SamaError::invalid_response(
                "token response did not include access_token",
            ));
        }
        if !self.token_type.eq_ignore_ascii_case("bearer") {
            return Err(SamaError::invalid_response(format!(
                "unsupported token_type `{}`",
                self.token_type
            )));
        }
        Ok(AuthenticationToken {
            access_token: self.access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.expires_in,
            issued_at,
            refresh_token: self.refresh_token.filter(|t| !t.trim().is_empty()),
            scope: self.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: u64) -> AuthenticationToken {
        AuthenticationToken {
            access_token: "at-secret".into(),
            token_type: "Bearer".into(),
            expires_in,
            issued_at: Utc::now(),
            refresh_token: Some("rt-secret".into()),
            scope: Some("accounts".into()),
        }
    }

    #[test]
    fn expiry_windows() {
        let fresh = token(3_600);
        assert!(fresh.is_valid());
        assert!(!fresh.is_expiring_soon());

        let closing = token(120);
        assert!(closing.is_valid());
        assert!(closing.is_expiring_soon());

        let now = fresh.issued_at;
        assert!(!fresh.is_valid_at(now + Duration::seconds(3_600)));
        assert!(fresh.is_expiring_soon_at(now + Duration::seconds(3_301)));
        assert!(!fresh.is_expiring_soon_at(now + Duration::seconds(3_300)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", token(300));
        assert!(!debug.contains("at-secret"));
        assert!(!debug.contains("rt-secret"));
        assert!(debug.contains("Bearer"));
    }

    #[test]
    fn par_form_includes_optional_fields() {
        let request = ParRequest::new("c1", "https://app/cb", "openid accounts")
            .with_state("xyz")
            .with_consent_id("CONSENT-0001");
        let form = request.form();
        assert!(form.contains(&("response_type".into(), "code".into())));
        assert!(form.contains(&("state".into(), "xyz".into())));
        assert!(form.contains(&("consent_id".into(), "CONSENT-0001".into())));
        assert!(!form.iter().any(|(k, _)| k == "code_challenge"));
    }

    #[test]
    fn par_validation_rejects_blank_fields() {
        assert!(ParRequest::new(" ", "https://app/cb", "").validate().is_err());
        assert!(ParRequest::new("c1", "", "").validate().is_err());
        assert!(ParRequest::new("c1", "https://app/cb", "").validate().is_ok());
    }

    #[test]
    fn token_response_normalises_type() {
        let wire: TokenResponse = serde_json::from_str(
            r#"{"access_token":"at","token_type":"bearer","expires_in":300,"refresh_token":""}"#,
        )
        .unwrap();
        let token = wire.into_token(Utc::now()).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.refresh_token, None);

        let mac: TokenResponse = serde_json::from_str(
            r#"{"access_token":"at","token_type":"MAC","expires_in":300}"#,
        )
        .unwrap();
        assert!(mac.into_token(Utc::now()).is_err());
    }
}
