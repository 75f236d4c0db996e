// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Built-in catalogue of the seven supported banks.
//!
//! Pins are per environment: a leaf pin and a backup pin for the next
//! certificate rotation. Deployments that rotate ahead of a release override
//! the catalogue with `SAMA_BANK_CATALOGUE`.

use super::types::{
    BankConfiguration, DisplayName, Environment, FeatureFlags, RateLimitPolicy, SupportContact,
};
use super::RegistryError;
use crate::security::pinning::CertificateFingerprint;

const DEFAULT_SCOPES: &[&str] = &["openid", "accounts", "payments", "fundsconfirmations"];

struct EnvironmentEntry {
    client_id: &'static str,
    api_host: &'static str,
    auth_host: &'static str,
    pins: [&'static str; 2],
}

struct BankEntry {
    code: &'static str,
    name_en: &'static str,
    name_ar: &'static str,
    support_email: &'static str,
    support_phone: &'static str,
    rate_limit: RateLimitPolicy,
    bulk_payments: bool,
    international_payments: bool,
    currencies: &'static [&'static str],
    max_transaction_amount: f64,
    production: EnvironmentEntry,
    sandbox: EnvironmentEntry,
}

const fn limits(per_minute: u32, per_hour: u32, per_day: u32, burst: u32) -> RateLimitPolicy {
    RateLimitPolicy {
        requests_per_minute: per_minute,
        requests_per_hour: per_hour,
        requests_per_day: per_day,
        burst_limit: burst,
    }
}

const BANKS: &[BankEntry] = &[
    BankEntry {
        code: "ALRAJHI",
        name_en: "Al Rajhi Bank",
        name_ar: "مصرف الراجحي",
        support_email: "openbanking@alrajhibank.com.sa",
        support_phone: "+966920003344",
        rate_limit: limits(100, 3_000, 50_000, 10),
        bulk_payments: true,
        international_payments: true,
        currencies: &["SAR", "USD", "EUR", "GBP", "AED"],
        max_transaction_amount: 500_000.0,
        production: EnvironmentEntry {
            client_id: "sama-ob-alrajhi-prod-7f3a",
            api_host: "api.alrajhibank.com.sa",
            auth_host: "auth.alrajhibank.com.sa",
            pins: [
                "70:3E:B9:E5:74:0D:D3:2C:1E:18:EE:0E:A1:26:EA:7C:E2:43:15:56:C6:B1:7A:1B:04:15:47:99:2A:89:D4:CC",
                "A6:86:50:5E:F7:F6:63:23:E9:57:74:B7:69:D6:62:B1:68:5D:F1:49:C2:2D:0C:5A:53:81:33:90:C2:5C:64:AF",
            ],
        },
        sandbox: EnvironmentEntry {
            client_id: "sama-ob-alrajhi-sbx-19c2",
            api_host: "sandbox-api.alrajhibank.com.sa",
            auth_host: "sandbox-auth.alrajhibank.com.sa",
            pins: [
                "CF:E7:E1:35:A8:EB:6E:32:B4:78:FA:18:B4:F8:69:6B:CE:06:60:3F:6B:A5:BF:59:3D:FA:22:84:D6:BF:D4:90",
                "8F:C6:53:44:BF:8C:10:28:07:61:5D:79:A4:7F:F8:11:1C:60:5B:A1:AC:9B:81:6D:05:1C:5C:3B:FC:86:5F:00",
            ],
        },
    },
    BankEntry {
        code: "SNB",
        name_en: "Saudi National Bank",
        name_ar: "البنك الأهلي السعودي",
        support_email: "openbanking@alahli.com",
        support_phone: "+966920001000",
        rate_limit: limits(120, 4_000, 60_000, 12),
        bulk_payments: true,
        international_payments: true,
        currencies: &["SAR", "USD", "EUR", "GBP"],
        max_transaction_amount: 1_000_000.0,
        production: EnvironmentEntry {
            client_id: "sama-ob-snb-prod-4e81",
            api_host: "api.alahli.com",
            auth_host: "auth.alahli.com",
            pins: [
                "97:94:22:D1:F5:8B:CB:28:35:8D:8C:B7:64:A3:34:A9:38:F1:99:E5:EA:5C:9D:3F:66:45:DD:78:B9:C3:56:D4",
                "D5:6C:F7:3A:47:9E:98:1A:A6:11:B1:81:45:11:5C:A7:01:ED:F6:2E:07:1E:0F:7F:81:5C:A8:09:D6:35:89:C5",
            ],
        },
        sandbox: EnvironmentEntry {
            client_id: "sama-ob-snb-sbx-a05d",
            api_host: "sandbox-api.alahli.com",
            auth_host: "sandbox-auth.alahli.com",
            pins: [
                "0A:11:D2:D5:DC:D9:84:13:A4:42:20:46:FA:F9:3C:69:29:3C:B6:C7:12:B7:71:C4:90:B9:48:3B:8F:26:8D:33",
                "CF:30:65:14:75:68:DE:50:9F:4A:53:16:FC:C7:DC:4F:C1:A2:78:E6:CB:2F:84:C6:D4:D6:C3:CD:F0:26:F5:73",
            ],
        },
    },
    BankEntry {
        code: "RIYAD",
        name_en: "Riyad Bank",
        name_ar: "بنك الرياض",
        support_email: "openbanking@riyadbank.com",
        support_phone: "+966920002470",
        rate_limit: limits(80, 2_500, 40_000, 8),
        bulk_payments: true,
        international_payments: false,
        currencies: &["SAR", "USD"],
        max_transaction_amount: 250_000.0,
        production: EnvironmentEntry {
            client_id: "sama-ob-riyad-prod-c6b0",
            api_host: "api.riyadbank.com",
            auth_host: "auth.riyadbank.com",
            pins: [
                "7A:95:55:2F:7B:4A:E8:5B:1F:05:90:B1:12:06:24:01:77:ED:89:3F:1C:7A:84:ED:E6:E0:BC:90:65:5A:C8:D3",
                "FE:10:56:F0:81:DB:F6:A6:B8:0B:E8:9F:CC:FD:B7:0F:6A:80:E1:F8:80:13:B7:ED:2E:7D:F6:48:60:12:A4:E1",
            ],
        },
        sandbox: EnvironmentEntry {
            client_id: "sama-ob-riyad-sbx-2d94",
            api_host: "sandbox-api.riyadbank.com",
            auth_host: "sandbox-auth.riyadbank.com",
            pins: [
                "12:DF:F1:64:19:AF:21:45:20:23:2E:6F:E7:65:80:D3:DB:40:87:6A:89:F3:EF:2A:F2:D3:01:89:E9:29:CF:BF",
                "7B:86:3A:BE:5D:EB:9C:6D:2E:6A:DE:97:C1:6C:0A:0D:0B:BC:E7:55:AD:36:E4:80:80:93:82:13:C1:BC:60:B2",
            ],
        },
    },
    BankEntry {
        code: "SAB",
        name_en: "Saudi Awwal Bank",
        name_ar: "البنك السعودي الأول",
        support_email: "openbanking@sab.com",
        support_phone: "+966920007979",
        rate_limit: limits(90, 2_800, 45_000, 10),
        bulk_payments: false,
        international_payments: true,
        currencies: &["SAR", "USD", "GBP", "EUR"],
        max_transaction_amount: 300_000.0,
        production: EnvironmentEntry {
            client_id: "sama-ob-sab-prod-58e7",
            api_host: "api.sab.com",
            auth_host: "auth.sab.com",
            pins: [
                "34:12:67:0E:67:6B:DB:89:FE:CA:CD:E6:C2:34:5B:A0:3E:90:91:B1:BB:AC:7A:82:29:BC:F7:D0:51:E5:7B:AD",
                "BB:01:30:27:17:CA:EA:FB:C5:FF:D9:D3:C2:DE:AC:2E:F7:D1:A6:7E:7B:5E:F4:D9:9C:0F:34:44:5E:C1:5D:B8",
            ],
        },
        sandbox: EnvironmentEntry {
            client_id: "sama-ob-sab-sbx-f31c",
            api_host: "sandbox-api.sab.com",
            auth_host: "sandbox-auth.sab.com",
            pins: [
                "D0:57:E2:82:64:3B:C1:93:9D:7E:35:0F:30:03:A5:5A:D8:3A:FC:13:87:2A:8E:67:BD:A1:38:74:2A:C6:51:53",
                "A7:B0:9D:FD:CC:03:79:12:D4:0A:63:16:F4:65:33:71:24:2E:50:13:F9:10:40:50:9A:68:1C:12:E6:8E:15:D9",
            ],
        },
    },
    BankEntry {
        code: "ALINMA",
        name_en: "Alinma Bank",
        name_ar: "مصرف الإنماء",
        support_email: "openbanking@alinma.com",
        support_phone: "+966800120800",
        rate_limit: limits(60, 2_000, 30_000, 6),
        bulk_payments: false,
        international_payments: false,
        currencies: &["SAR"],
        max_transaction_amount: 200_000.0,
        production: EnvironmentEntry {
            client_id: "sama-ob-alinma-prod-0b7e",
            api_host: "api.alinma.com",
            auth_host: "auth.alinma.com",
            pins: [
                "79:DB:8F:F3:A0:88:81:7A:85:E0:C9:3D:CB:C9:A5:B0:B4:C0:B9:1C:8D:32:A6:79:E9:69:76:CF:1F:20:6E:AC",
                "87:0E:0A:97:38:A2:36:9D:BD:7E:4D:6A:D5:6E:F4:CB:F9:5D:DF:9E:88:3B:2E:B7:3F:15:6F:08:40:BE:55:8B",
            ],
        },
        sandbox: EnvironmentEntry {
            client_id: "sama-ob-alinma-sbx-6a22",
            api_host: "sandbox-api.alinma.com",
            auth_host: "sandbox-auth.alinma.com",
            pins: [
                "1F:BE:9A:3E:DA:60:80:B5:E4:63:FB:D5:72:6F:4C:1A:E0:7F:E0:08:B0:41:A4:FE:47:A4:D6:9C:76:38:8D:A8",
                "0E:F7:63:32:EA:B3:A5:18:83:B4:49:26:D2:FF:FD:FD:7A:32:34:AA:CD:BB:83:67:5C:97:23:4A:43:FA:AC:E5",
            ],
        },
    },
    BankEntry {
        code: "BSF",
        name_en: "Banque Saudi Fransi",
        name_ar: "البنك السعودي الفرنسي",
        support_email: "openbanking@alfransi.com.sa",
        support_phone: "+966920000576",
        rate_limit: limits(75, 2_200, 35_000, 8),
        bulk_payments: true,
        international_payments: true,
        currencies: &["SAR", "EUR", "USD"],
        max_transaction_amount: 400_000.0,
        production: EnvironmentEntry {
            client_id: "sama-ob-bsf-prod-93d5",
            api_host: "api.alfransi.com.sa",
            auth_host: "auth.alfransi.com.sa",
            pins: [
                "15:90:57:A5:A5:31:42:8B:23:01:08:30:3A:9E:C0:88:CD:70:2F:44:5F:29:87:40:ED:4A:50:C1:68:BC:A5:FE",
                "45:7B:A3:53:08:59:C8:53:46:47:98:82:5C:A3:A0:4E:43:F3:79:07:B1:B4:7D:10:DB:E0:42:27:98:52:C3:90",
            ],
        },
        sandbox: EnvironmentEntry {
            client_id: "sama-ob-bsf-sbx-7c48",
            api_host: "sandbox-api.alfransi.com.sa",
            auth_host: "sandbox-auth.alfransi.com.sa",
            pins: [
                "D1:2F:B7:04:13:38:5A:EC:E7:FA:37:A9:F8:40:73:B6:2D:FB:3A:2C:AA:B2:DE:4D:EA:6A:45:50:EC:68:06:37",
                "76:EF:91:29:D1:97:B2:02:E7:82:B7:24:2E:9B:DC:13:A5:1A:C7:84:C8:24:2E:3D:F8:B1:A0:A1:C8:15:DF:9C",
            ],
        },
    },
    BankEntry {
        code: "ANB",
        name_en: "Arab National Bank",
        name_ar: "البنك العربي الوطني",
        support_email: "openbanking@anb.com.sa",
        support_phone: "+966800124400",
        rate_limit: limits(70, 2_100, 32_000, 7),
        bulk_payments: false,
        international_payments: true,
        currencies: &["SAR", "USD", "AED"],
        max_transaction_amount: 350_000.0,
        production: EnvironmentEntry {
            client_id: "sama-ob-anb-prod-e1f9",
            api_host: "api.anb.com.sa",
            auth_host: "auth.anb.com.sa",
            pins: [
                "25:BD:72:DE:BC:9A:2D:4E:A8:BD:9B:FF:9F:F6:9F:AA:C0:EC:93:22:E9:9F:CA:BE:12:75:C8:99:7C:E6:B8:A1",
                "F7:CF:0E:42:0E:35:11:DE:D4:02:6A:2E:CF:DC:30:11:47:0E:D8:75:12:37:AB:DF:98:F5:9D:35:11:41:5F:BE",
            ],
        },
        sandbox: EnvironmentEntry {
            client_id: "sama-ob-anb-sbx-5b36",
            api_host: "sandbox-api.anb.com.sa",
            auth_host: "sandbox-auth.anb.com.sa",
            pins: [
                "9F:B4:0B:3F:C5:A1:2D:E2:46:ED:5D:95:D7:9E:2F:50:50:CC:DB:06:67:AB:81:B6:EA:B1:3F:DB:8B:F9:DD:3D",
                "32:61:5F:FE:CD:7D:74:28:99:29:5C:53:37:A5:77:A7:00:EB:69:9C:3E:81:3B:1F:67:F7:27:60:F2:5C:8B:F7",
            ],
        },
    },
];

/// Expand the static table into one configuration per (bank, environment).
pub(crate) fn builtin_configurations() -> Result<Vec<BankConfiguration>, RegistryError> {
    let mut configurations = Vec::with_capacity(BANKS.len() * 2);
    for bank in BANKS {
        for (environment, entry) in [
            (Environment::Production, &bank.production),
            (Environment::Sandbox, &bank.sandbox),
        ] {
            configurations.push(configuration(bank, environment, entry)?);
        }
    }
    Ok(configurations)
}

fn configuration(
    bank: &BankEntry,
    environment: Environment,
    entry: &EnvironmentEntry,
) -> Result<BankConfiguration, RegistryError> {
    let certificate_fingerprints = entry
        .pins
        .iter()
        .map(|pin| {
            CertificateFingerprint::parse(pin).map_err(|e| RegistryError::InvalidFingerprint {
                bank_code: bank.code.to_string(),
                environment,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BankConfiguration {
        bank_code: bank.code.to_string(),
        display_name: DisplayName {
            en: bank.name_en.to_string(),
            ar: bank.name_ar.to_string(),
        },
        environment,
        base_url: format!("https://{}/open-banking/v1", entry.api_host),
        authorization_endpoint: format!("https://{}/oauth2/authorize", entry.auth_host),
        token_endpoint: format!("https://{}/oauth2/token", entry.auth_host),
        par_endpoint: format!("https://{}/oauth2/par", entry.auth_host),
        client_id: entry.client_id.to_string(),
        supported_scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        certificate_fingerprints,
        rate_limit: bank.rate_limit,
        features: FeatureFlags {
            bulk_payments: bank.bulk_payments,
            international_payments: bank.international_payments,
            supported_currencies: bank.currencies.iter().map(|c| c.to_string()).collect(),
            max_transaction_amount: bank.max_transaction_amount,
        },
        support: SupportContact {
            email: bank.support_email.to_string(),
            phone: bank.support_phone.to_string(),
        },
    })
}
