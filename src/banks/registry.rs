// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Immutable lookup table of bank configurations.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::info;

use super::catalogue;
use super::types::{BankConfiguration, Environment};
use crate::config::{env_optional, BANK_CATALOGUE_ENV};

static SHARED: OnceLock<BankConfigurationRegistry> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to read bank catalogue {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bank catalogue JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Bank configuration has an empty bank code")]
    EmptyBankCode,

    #[error("{bank_code}/{environment}: {field} is not an https URL ({url})")]
    InsecureEndpoint {
        bank_code: String,
        environment: Environment,
        field: &'static str,
        url: String,
    },

    #[error("{bank_code}/{environment}: no certificate fingerprints configured")]
    MissingFingerprints {
        bank_code: String,
        environment: Environment,
    },

    #[error("{bank_code}/{environment}: invalid certificate fingerprint ({reason})")]
    InvalidFingerprint {
        bank_code: String,
        environment: Environment,
        reason: String,
    },

    #[error("{bank_code}/{environment}: client_id is empty")]
    MissingClientId {
        bank_code: String,
        environment: Environment,
    },

    #[error("{bank_code}: production and sandbox share the same {field}")]
    SharedAcrossEnvironments {
        bank_code: String,
        field: &'static str,
    },

    #[error("{bank_code}/{environment} is configured more than once")]
    Duplicate {
        bank_code: String,
        environment: Environment,
    },
}

/// Bank catalogue keyed by `(bank_code, environment)`.
///
/// Bank codes are stored uppercase; lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct BankConfigurationRegistry {
    configurations: HashMap<(String, Environment), Arc<BankConfiguration>>,
}

impl BankConfigurationRegistry {
    /// Validate and index a set of configurations.
    pub fn from_configurations(
        configurations: Vec<BankConfiguration>,
    ) -> Result<Self, RegistryError> {
        let mut indexed = HashMap::with_capacity(configurations.len());

        for mut configuration in configurations {
            configuration.bank_code = configuration.bank_code.trim().to_ascii_uppercase();
            validate(&configuration)?;

            let key = (configuration.bank_code.clone(), configuration.environment);
            if indexed.contains_key(&key) {
                return Err(RegistryError::Duplicate {
                    bank_code: key.0,
                    environment: key.1,
                });
            }
            indexed.insert(key, Arc::new(configuration));
        }

        check_environment_separation(&indexed)?;

        Ok(Self {
            configurations: indexed,
        })
    }

    /// The seven built-in banks, production and sandbox.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_configurations(catalogue::builtin_configurations()?)
    }

    /// Parse a JSON array of [`BankConfiguration`] records.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let configurations: Vec<BankConfiguration> = serde_json::from_str(json)?;
        Self::from_configurations(configurations)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Catalogue file named by `SAMA_BANK_CATALOGUE`, else the built-in set.
    pub fn from_env() -> Result<Self, RegistryError> {
        let registry = match env_optional(BANK_CATALOGUE_ENV) {
            Some(path) => {
                let registry = Self::from_json_file(&path)?;
                info!(path = %path, banks = registry.len(), "Loaded bank catalogue from file");
                registry
            }
            None => Self::builtin()?,
        };
        Ok(registry)
    }

    /// Process-wide built-in registry, loaded on first use.
    pub fn shared() -> Result<&'static Self, RegistryError> {
        if let Some(registry) = SHARED.get() {
            return Ok(registry);
        }
        let registry = Self::builtin()?;
        let registry = SHARED.get_or_init(|| registry);
        info!(configurations = registry.len(), "Bank registry initialised");
        Ok(registry)
    }

    /// Unknown bank or environment yields `None`.
    pub fn get_configuration(
        &self,
        bank_code: &str,
        environment: Environment,
    ) -> Option<Arc<BankConfiguration>> {
        let key = (bank_code.trim().to_ascii_uppercase(), environment);
        self.configurations.get(&key).cloned()
    }

    /// All banks configured for `environment`, sorted by bank code.
    pub fn get_all_configurations(&self, environment: Environment) -> Vec<Arc<BankConfiguration>> {
        let mut configurations: Vec<_> = self
            .configurations
            .iter()
            .filter(|((_, env), _)| *env == environment)
            .map(|(_, configuration)| configuration.clone())
            .collect();
        configurations.sort_by(|a, b| a.bank_code.cmp(&b.bank_code));
        configurations
    }

    pub fn get_supported_environments(&self, bank_code: &str) -> Vec<Environment> {
        let bank_code = bank_code.trim().to_ascii_uppercase();
        let environments: BTreeSet<Environment> = self
            .configurations
            .keys()
            .filter(|(code, _)| *code == bank_code)
            .map(|(_, env)| *env)
            .collect();
        environments.into_iter().collect()
    }

    /// Distinct bank codes, sorted.
    pub fn bank_codes(&self) -> Vec<String> {
        let codes: BTreeSet<&String> = self.configurations.keys().map(|(code, _)| code).collect();
        codes.into_iter().cloned().collect()
    }

    /// Number of (bank, environment) configurations.
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

fn validate(configuration: &BankConfiguration) -> Result<(), RegistryError> {
    let bank_code = &configuration.bank_code;
    let environment = configuration.environment;

    if bank_code.is_empty() {
        return Err(RegistryError::EmptyBankCode);
    }

    for (field, endpoint) in configuration.endpoints() {
        let is_https = url::Url::parse(endpoint)
            .map(|u| u.scheme() == "https" && u.host_str().is_some())
            .unwrap_or(false);
        if !is_https {
            return Err(RegistryError::InsecureEndpoint {
                bank_code: bank_code.clone(),
                environment,
                field,
                url: endpoint.to_string(),
            });
        }
    }

    if configuration.certificate_fingerprints.is_empty() {
        return Err(RegistryError::MissingFingerprints {
            bank_code: bank_code.clone(),
            environment,
        });
    }

    if configuration.client_id.trim().is_empty() {
        return Err(RegistryError::MissingClientId {
            bank_code: bank_code.clone(),
            environment,
        });
    }

    Ok(())
}

fn check_environment_separation(
    configurations: &HashMap<(String, Environment), Arc<BankConfiguration>>,
) -> Result<(), RegistryError> {
    for ((bank_code, environment), production) in configurations {
        if *environment != Environment::Production {
            continue;
        }
        let Some(sandbox) = configurations.get(&(bank_code.clone(), Environment::Sandbox)) else {
            continue;
        };
        if production.client_id == sandbox.client_id {
            return Err(RegistryError::SharedAcrossEnvironments {
                bank_code: bank_code.clone(),
                field: "client_id",
            });
        }
        if production.base_url.trim_end_matches('/') == sandbox.base_url.trim_end_matches('/') {
            return Err(RegistryError::SharedAcrossEnvironments {
                bank_code: bank_code.clone(),
                field: "base_url",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn builtin_json() -> serde_json::Value {
        let registry = BankConfigurationRegistry::builtin().unwrap();
        let mut all: Vec<BankConfiguration> = Vec::new();
        for env in [Environment::Production, Environment::Sandbox] {
            all.extend(
                registry
                    .get_all_configurations(env)
                    .into_iter()
                    .map(|c| (*c).clone()),
            );
        }
        serde_json::to_value(all).unwrap()
    }

    #[test]
    fn builtin_has_seven_banks_in_two_environments() {
        let registry = BankConfigurationRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 14);
        assert_eq!(
            registry.bank_codes(),
            vec!["ALINMA", "ALRAJHI", "ANB", "BSF", "RIYAD", "SAB", "SNB"]
        );
        assert_eq!(registry.get_all_configurations(Environment::Production).len(), 7);
        assert!(registry
            .get_all_configurations(Environment::Development)
            .is_empty());
    }

    #[test]
    fn lookup_is_case_insensitive_and_unknown_is_none() {
        let registry = BankConfigurationRegistry::builtin().unwrap();
        let bank = registry
            .get_configuration("alrajhi", Environment::Production)
            .unwrap();
        assert_eq!(bank.bank_code, "ALRAJHI");
        assert!(registry
            .get_configuration("NOPE", Environment::Production)
            .is_none());
        assert!(registry
            .get_configuration("SNB", Environment::Development)
            .is_none());
    }

    #[test]
    fn supported_environments_sorted() {
        let registry = BankConfigurationRegistry::builtin().unwrap();
        assert_eq!(
            registry.get_supported_environments("snb"),
            vec![Environment::Production, Environment::Sandbox]
        );
        assert!(registry.get_supported_environments("NOPE").is_empty());
    }

    #[test]
    fn builtin_invariants_hold() {
        let registry = BankConfigurationRegistry::builtin().unwrap();
        for code in registry.bank_codes() {
            let prod = registry
                .get_configuration(&code, Environment::Production)
                .unwrap();
            let sbx = registry.get_configuration(&code, Environment::Sandbox).unwrap();
            assert_ne!(prod.client_id, sbx.client_id);
            assert_ne!(prod.base_url, sbx.base_url);
            for bank in [&prod, &sbx] {
                assert!(!bank.certificate_fingerprints.is_empty());
                for (_, url) in bank.endpoints() {
                    assert!(url.starts_with("https://"), "{url}");
                }
            }
        }
    }

    #[test]
    fn rejects_plain_http_endpoint() {
        let mut json = builtin_json();
        json[0]["token_endpoint"] = "http://auth.alinma.com/oauth2/token".into();
        let err = BankConfigurationRegistry::from_json_str(&json.to_string()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InsecureEndpoint {
                field: "token_endpoint",
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_pin_set() {
        let mut json = builtin_json();
        json[0]["certificate_fingerprints"] = serde_json::json!([]);
        let err = BankConfigurationRegistry::from_json_str(&json.to_string()).unwrap_err();
        assert!(matches!(err, RegistryError::MissingFingerprints { .. }));
    }

    #[test]
    fn rejects_malformed_pin() {
        let mut json = builtin_json();
        json[0]["certificate_fingerprints"] = serde_json::json!(["AB:CD"]);
        let err = BankConfigurationRegistry::from_json_str(&json.to_string()).unwrap_err();
        assert!(matches!(err, RegistryError::Parse(_)));
    }

    #[test]
    fn rejects_shared_client_id_across_environments() {
        let mut json = builtin_json();
        // Index 0 is ALINMA production, index 7 is ALINMA sandbox.
        assert_eq!(json[7]["bank_code"], "ALINMA");
        json[7]["client_id"] = json[0]["client_id"].clone();
        let err = BankConfigurationRegistry::from_json_str(&json.to_string()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::SharedAcrossEnvironments {
                field: "client_id",
                ..
            }
        ));
    }

    #[test]
    fn rejects_duplicate_entries() {
        let mut json = builtin_json();
        let first = json[0].clone();
        json.as_array_mut().unwrap().push(first);
        let err = BankConfigurationRegistry::from_json_str(&json.to_string()).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
    }

    #[test]
    fn loads_catalogue_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(builtin_json().to_string().as_bytes()).unwrap();
        let registry = BankConfigurationRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.len(), 14);

        let missing = BankConfigurationRegistry::from_json_file("/nonexistent/catalogue.json");
        assert!(matches!(missing, Err(RegistryError::Io { .. })));
    }

    #[test]
    fn shared_registry_is_idempotent() {
        let a = BankConfigurationRegistry::shared().unwrap();
        let b = BankConfigurationRegistry::shared().unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.len(), 14);
    }
}
