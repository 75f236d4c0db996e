// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PKCE (RFC 7636) verifier/challenge pairs. Only `S256` is supported.

use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::SecureRandom;

use super::crypto::{random_bytes, sha256, CryptoError};

/// The only supported challenge method.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// 256 bits of entropy, encoding to a 43-character verifier.
const VERIFIER_ENTROPY_BYTES: usize = 32;

const MIN_VERIFIER_LEN: usize = 43;
const MAX_VERIFIER_LEN: usize = 128;

/// A fresh verifier and its derived challenge.
///
/// Belongs to exactly one authorization attempt. The verifier leaves this
/// struct only through [`PkceChallenge::into_verifier`] at token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    code_verifier: String,
    code_challenge: String,
}

impl PkceChallenge {
    pub fn generate(rng: &dyn SecureRandom) -> Result<Self, CryptoError> {
        let entropy = random_bytes(rng, VERIFIER_ENTROPY_BYTES)?;
        Self::from_verifier(Base64UrlUnpadded::encode_string(&entropy))
    }

    /// Wrap an existing verifier, validating length and alphabet.
    pub fn from_verifier(code_verifier: String) -> Result<Self, CryptoError> {
        if !is_valid_verifier(&code_verifier) {
            return Err(CryptoError::InvalidVerifier(format!(
                "expected {MIN_VERIFIER_LEN}-{MAX_VERIFIER_LEN} characters from [A-Za-z0-9._~-], got {} characters",
                code_verifier.len()
            )));
        }
        let code_challenge = code_challenge_for(&code_verifier);
        Ok(Self {
            code_verifier,
            code_challenge,
        })
    }

    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    pub fn code_challenge_method(&self) -> &'static str {
        CODE_CHALLENGE_METHOD
    }

    pub fn into_verifier(self) -> String {
        self.code_verifier
    }
}

impl fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("code_challenge", &self.code_challenge)
            .field("method", &CODE_CHALLENGE_METHOD)
            .finish_non_exhaustive()
    }
}

/// `BASE64URL-NOPAD(SHA256(ASCII(verifier)))`.
pub fn code_challenge_for(code_verifier: &str) -> String {
    Base64UrlUnpadded::encode_string(&sha256(code_verifier.as_bytes()))
}

pub fn is_valid_verifier(candidate: &str) -> bool {
    (MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&candidate.len())
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use ring::rand::SystemRandom;
    use std::collections::HashSet;

    #[test]
    fn generated_verifier_is_well_formed() {
        let rng = SystemRandom::new();
        let pkce = PkceChallenge::generate(&rng).unwrap();
        let verifier = pkce.code_verifier();
        assert!((43..=128).contains(&verifier.len()));
        assert!(is_valid_verifier(verifier));
        assert_eq!(pkce.code_challenge_method(), "S256");
        assert_ne!(pkce.code_challenge(), verifier);
    }

    #[test]
    fn rfc7636_appendix_b_vector() {
        let pkce =
            PkceChallenge::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into())
                .unwrap();
        assert_eq!(
            pkce.code_challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn challenge_matches_independent_encoder() {
        let rng = SystemRandom::new();
        let pkce = PkceChallenge::generate(&rng).unwrap();
        let expected = URL_SAFE_NO_PAD.encode(sha256(pkce.code_verifier().as_bytes()));
        assert_eq!(pkce.code_challenge(), expected);
    }

    #[test]
    fn hundred_verifiers_are_distinct() {
        let rng = SystemRandom::new();
        let verifiers: HashSet<String> = (0..100)
            .map(|_| PkceChallenge::generate(&rng).unwrap().into_verifier())
            .collect();
        assert_eq!(verifiers.len(), 100);
    }

    #[test]
    fn rejects_short_or_illegal_verifiers() {
        assert!(PkceChallenge::from_verifier("short".into()).is_err());
        assert!(PkceChallenge::from_verifier("a".repeat(129)).is_err());
        assert!(PkceChallenge::from_verifier(format!("{}+/", "a".repeat(43))).is_err());
        assert!(PkceChallenge::from_verifier("a.b_c~d-".repeat(6)).is_ok());
    }

    #[test]
    fn debug_hides_verifier() {
        let rng = SystemRandom::new();
        let pkce = PkceChallenge::generate(&rng).unwrap();
        let debug = format!("{pkce:?}");
        assert!(!debug.contains(pkce.code_verifier()));
        assert!(debug.contains(pkce.code_challenge()));
    }
}
