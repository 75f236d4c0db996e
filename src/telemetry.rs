// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing subscriber setup.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{env_or_default, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `json` (any case) selects JSON; everything else is pretty.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }

    pub fn from_env() -> Self {
        Self::parse(&env_or_default(LOG_FORMAT_ENV, "pretty"))
    }
}

/// Install the global subscriber: `RUST_LOG` filter (falling back to
/// [`DEFAULT_LOG_FILTER`]) and the `LOG_FORMAT` output format.
///
/// Errors if a global subscriber is already set.
pub fn init_tracing() -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match LogFormat::from_env() {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
    }
}
