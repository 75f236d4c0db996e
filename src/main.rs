// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `sama-connect`: start an authorization with one bank and print the URL
//! the user must open.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use sama_openbanking::auth::AuthenticationService;
use sama_openbanking::banks::BankConfigurationRegistry;
use sama_openbanking::client::BankApiClient;
use sama_openbanking::config::ClientSettings;
use sama_openbanking::telemetry;
use sama_openbanking::transport::PinnedTransport;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    if let Err(e) = telemetry::init_tracing() {
        eprintln!("Logging disabled: {e}");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "sama-connect failed");
            eprintln!("sama-connect: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let settings = ClientSettings::from_env()?;
    let registry = BankConfigurationRegistry::from_env()?;

    let bank = registry
        .get_configuration(&settings.bank_code, settings.environment)
        .ok_or_else(|| {
            format!(
                "bank {} has no {} configuration",
                settings.bank_code, settings.environment
            )
        })?;
    info!(
        bank = %bank.bank_code,
        environment = %bank.environment,
        "Connecting to bank"
    );

    let transport = PinnedTransport::for_bank(&bank, settings.http_timeout)?;
    let client = BankApiClient::new(bank.clone(), Arc::new(transport))
        .with_max_attempts(settings.max_attempts)
        .with_max_retry_delay(settings.max_retry_delay);
    let auth = AuthenticationService::new(Arc::new(client));

    let client_id = settings
        .client_id
        .clone()
        .unwrap_or_else(|| bank.client_id.clone());
    let attempt = auth
        .begin_authorization(&client_id, &settings.redirect_uri, &settings.scope, None)
        .await?;

    println!("Authorization attempt {}", attempt.id());
    println!("Expected state: {}", attempt.oauth_state());
    if let Some(url) = attempt.authorization_url() {
        println!("Open in a browser: {url}");
    }
    Ok(())
}
