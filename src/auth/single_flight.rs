// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-flight token refresh.
//!
//! Concurrent refreshes of the same refresh token against the same bank
//! share one network round-trip. Entries are keyed by
//! `(bank_code, SHA-256(refresh_token))` so the registry never holds the
//! token itself, and are removed as soon as the flight lands.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::debug;

use super::types::AuthenticationToken;
use crate::error::SamaResult;
use crate::security::crypto::sha256;

type FlightKey = (String, [u8; 32]);
type Flight = Arc<OnceCell<SamaResult<AuthenticationToken>>>;

#[derive(Debug, Default)]
pub(crate) struct RefreshRegistry {
    in_flight: Mutex<HashMap<FlightKey, Flight>>,
}

/// Removes the leader's entry even if the leading future is dropped.
struct LeaderGuard<'a> {
    registry: &'a RefreshRegistry,
    key: FlightKey,
    flight: Flight,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.key, &self.flight);
    }
}

impl RefreshRegistry {
    pub(crate) fn key(bank_code: &str, refresh_token: &str) -> FlightKey {
        (bank_code.to_string(), sha256(refresh_token.as_bytes()))
    }

    /// Run `refresh` unless an identical refresh is already in flight, in
    /// which case wait for and share its result.
    pub(crate) async fn run<F, Fut>(
        &self,
        key: FlightKey,
        refresh: F,
    ) -> SamaResult<AuthenticationToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SamaResult<AuthenticationToken>>,
    {
        let (flight, leader) = self.join(&key);
        let _guard = leader.then(|| LeaderGuard {
            registry: self,
            key: key.clone(),
            flight: flight.clone(),
        });
        if !leader {
            debug!(bank = %key.0, "Joining in-flight token refresh");
        }

        let result = flight.get_or_init(refresh).await.clone();
        self.remove(&key, &flight);
        result
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn join(&self, key: &FlightKey) -> (Flight, bool) {
        let Ok(mut map) = self.in_flight.lock() else {
            // Poisoned: fall back to an unshared flight.
            return (Arc::new(OnceCell::new()), true);
        };
        if let Some(existing) = map.get(key) {
            return (existing.clone(), false);
        }
        let flight: Flight = Arc::new(OnceCell::new());
        map.insert(key.clone(), flight.clone());
        (flight, true)
    }

    fn remove(&self, key: &FlightKey, flight: &Flight) {
        if let Ok(mut map) = self.in_flight.lock() {
            if map.get(key).is_some_and(|current| Arc::ptr_eq(current, flight)) {
                map.remove(key);
            }
        }
    }
}
