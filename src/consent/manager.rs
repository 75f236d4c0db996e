// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent lifecycle against one bank.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::audit::{ConsentAction, ConsentAuditEntry};
use super::store::ConsentStore;
use super::types::{
    ConsentDetails, ConsentKind, ConsentRequest, ConsentRequestData, ConsentResponseData,
    ConsentStatus, Envelope, PAYMENTS_PERMISSION,
};
use crate::client::BankApiClient;
use crate::error::{SamaError, SamaResult};
use crate::transport::{BankRequest, INTERACTION_ID_HEADER};

/// Per-consent async locks serialising read-modify-write of one record.
#[derive(Default)]
struct ConsentLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ConsentLocks {
    fn handle(&self, consent_id: &str) -> Arc<AsyncMutex<()>> {
        match self.locks.lock() {
            Ok(mut map) => map.entry(consent_id.to_string()).or_default().clone(),
            // Poisoned: an unshared lock still lets the call proceed.
            Err(_) => Arc::new(AsyncMutex::new(())),
        }
    }

    async fn acquire(&self, consent_id: &str) -> ConsentLockGuard<'_> {
        let guard = self.handle(consent_id).lock_owned().await;
        ConsentLockGuard {
            guard: Some(guard),
            locks: self,
        }
    }

    /// Drop locks nobody holds or waits on.
    fn prune(&self) {
        if let Ok(mut map) = self.locks.lock() {
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|map| map.len()).unwrap_or_default()
    }
}

struct ConsentLockGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a ConsentLocks,
}

impl Drop for ConsentLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.prune();
    }
}

/// Creates, tracks, revokes and audits consents.
pub struct ConsentManager {
    client: Arc<BankApiClient>,
    store: Arc<dyn ConsentStore>,
    locks: ConsentLocks,
}

impl ConsentManager {
    pub fn new(client: Arc<BankApiClient>, store: Arc<dyn ConsentStore>) -> Self {
        Self {
            client,
            store,
            locks: ConsentLocks::default(),
        }
    }

    /// Request an account-access consent; the record starts
    /// `AwaitingAuthorization`.
    pub async fn create_account_consent(
        &self,
        access_token: &str,
        request: &ConsentRequest,
    ) -> SamaResult<ConsentDetails> {
        self.create(access_token, request, ConsentKind::AccountAccess)
            .await
    }

    /// Request a payment consent. `PAYMENTS` is added to the permission set
    /// when missing.
    pub async fn create_payment_consent(
        &self,
        access_token: &str,
        request: &ConsentRequest,
    ) -> SamaResult<ConsentDetails> {
        let mut request = request.clone();
        if !request.permissions.iter().any(|p| p == PAYMENTS_PERMISSION) {
            request.permissions.push(PAYMENTS_PERMISSION.to_string());
        }
        self.create(access_token, &request, ConsentKind::Payment)
            .await
    }

    /// Refresh a consent from the bank.
    ///
    /// Terminal consents are returned as stored without a bank call. A
    /// consent past its expiration is moved to `Expired`.
    pub async fn get_consent_status(
        &self,
        access_token: &str,
        consent_id: &str,
    ) -> SamaResult<ConsentDetails> {
        require_token(access_token)?;
        let _guard = self.locks.acquire(consent_id).await;
        let mut consent = self.load(consent_id).await?;
        if consent.status.is_terminal() {
            return Ok(consent);
        }

        let request = BankRequest::get(self.consent_url(consent_id)?).bearer(access_token);
        let interaction_id = request
            .header_value(INTERACTION_ID_HEADER)
            .map(str::to_string);
        let data = self
            .client
            .send(request)
            .await?
            .json::<Envelope<ConsentResponseData>>()?
            .data;
        if data.consent_id != consent_id {
            return Err(SamaError::invalid_response(format!(
                "bank answered for consent {} instead of {consent_id}",
                data.consent_id
            )));
        }

        if data.status != consent.status {
            match consent.status.transition(data.status) {
                Ok(_) => {
                    self.apply_status(&mut consent, data.status, interaction_id.as_deref())
                        .await?
                }
                Err(err) => warn!(
                    consent_id = %consent_id,
                    bank = %consent.bank_code,
                    reported = %data.status,
                    "Ignoring consent status reported by bank: {err}"
                ),
            }
        }

        if !consent.status.is_terminal() && consent.is_expired_at(Utc::now()) {
            self.apply_status(&mut consent, ConsentStatus::Expired, None)
                .await?;
        }
        Ok(consent)
    }

    /// Withdraw a consent at the bank and mark it `Revoked`.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidState` for consents
    /// that already reached a terminal status.
    pub async fn revoke_consent(&self, access_token: &str, consent_id: &str) -> SamaResult<()> {
        require_token(access_token)?;
        let _guard = self.locks.acquire(consent_id).await;
        let mut consent = self.load(consent_id).await?;
        if consent.status.is_terminal() {
            return Err(SamaError::invalid_state(format!(
                "consent {consent_id} is already {}",
                consent.status
            )));
        }

        let request = BankRequest::delete(self.consent_url(consent_id)?).bearer(access_token);
        let interaction_id = request
            .header_value(INTERACTION_ID_HEADER)
            .map(str::to_string);
        let response = self.client.send(request).await?;
        if response.status != 204 {
            debug!(
                consent_id = %consent_id,
                status = response.status,
                "Consent revocation acknowledged without 204"
            );
        }

        self.apply_status(&mut consent, ConsentStatus::Revoked, interaction_id.as_deref())
            .await
    }

    /// `true` only if the consent is authorized, unexpired and holds every
    /// permission in `required`.
    pub async fn validate_consent_permissions<S: AsRef<str> + Sync>(
        &self,
        consent_id: &str,
        required: &[S],
    ) -> SamaResult<bool> {
        let consent = self.load(consent_id).await?;
        Ok(consent.grants_at(required, Utc::now()))
    }

    pub async fn is_consent_expired(&self, consent_id: &str) -> SamaResult<bool> {
        let consent = self.load(consent_id).await?;
        Ok(consent.is_expired_at(Utc::now()))
    }

    pub async fn get_consent_audit_log(
        &self,
        access_token: &str,
        consent_id: &str,
    ) -> SamaResult<Vec<ConsentAuditEntry>> {
        require_token(access_token)?;
        self.load(consent_id).await?;
        Ok(self.store.audit_log(consent_id).await?)
    }

    async fn create(
        &self,
        access_token: &str,
        request: &ConsentRequest,
        kind: ConsentKind,
    ) -> SamaResult<ConsentDetails> {
        require_token(access_token)?;
        let now = Utc::now();
        request.validate(now)?;

        let body = serde_json::to_value(Envelope {
            data: ConsentRequestData::from(request),
        })
        .map_err(|e| SamaError::invalid_state(format!("consent request not serializable: {e}")))?;
        let http = BankRequest::post_json(self.client.bank().api_url("consents"), body)
            .bearer(access_token);
        let interaction_id = http.header_value(INTERACTION_ID_HEADER).map(str::to_string);

        let data = self
            .client
            .send(http)
            .await?
            .json::<Envelope<ConsentResponseData>>()?
            .data;
        data.check_id()?;

        let _guard = self.locks.acquire(&data.consent_id).await;
        if self.store.get(&data.consent_id).await?.is_some() {
            return Err(SamaError::invalid_response(format!(
                "bank reissued existing consent id {}",
                data.consent_id
            )));
        }

        let created = data.creation_date_time.unwrap_or(now);
        let mut consent = ConsentDetails {
            consent_id: data.consent_id.clone(),
            bank_code: self.client.bank().bank_code.clone(),
            kind,
            status: ConsentStatus::AwaitingAuthorization,
            permissions: data
                .permissions
                .unwrap_or_else(|| request.permissions.clone())
                .into_iter()
                .collect(),
            creation_date_time: created,
            status_update_date_time: data.status_update_date_time.unwrap_or(created),
            expiration_date_time: data
                .expiration_date_time
                .unwrap_or(request.expiration_date_time),
            transaction_from_date_time: request.transaction_from_date_time,
            transaction_to_date_time: request.transaction_to_date_time,
        };
        self.store.put(consent.clone()).await?;
        self.store
            .append_audit(
                ConsentAuditEntry::new(&consent.consent_id, ConsentAction::Created)
                    .with_permissions(consent.permission_snapshot())
                    .with_interaction_id(interaction_id.as_deref()),
            )
            .await?;
        info!(
            consent_id = %consent.consent_id,
            bank = %consent.bank_code,
            kind = ?kind,
            "Consent created"
        );

        if data.status != ConsentStatus::AwaitingAuthorization {
            self.apply_status(&mut consent, data.status, interaction_id.as_deref())
                .await?;
        }
        Ok(consent)
    }

    /// Transition, persist and audit. The caller holds the consent lock.
    async fn apply_status(
        &self,
        consent: &mut ConsentDetails,
        to: ConsentStatus,
        interaction_id: Option<&str>,
    ) -> SamaResult<()> {
        let from = consent.status;
        consent.status = from.transition(to)?;
        consent.status_update_date_time = Utc::now();

        self.store.put(consent.clone()).await?;
        self.store
            .append_audit(
                ConsentAuditEntry::new(&consent.consent_id, ConsentAction::from(to))
                    .with_permissions(consent.permission_snapshot())
                    .with_interaction_id(interaction_id)
                    .at(consent.status_update_date_time),
            )
            .await?;

        info!(
            consent_id = %consent.consent_id,
            bank = %consent.bank_code,
            from = %from,
            to = %to,
            "Consent status changed"
        );
        Ok(())
    }

    async fn load(&self, consent_id: &str) -> SamaResult<ConsentDetails> {
        self.store
            .get(consent_id)
            .await?
            .ok_or_else(|| SamaError::not_found("consent", consent_id))
    }

    fn consent_url(&self, consent_id: &str) -> SamaResult<String> {
        let base = self.client.bank().api_url("consents");
        let mut url = url::Url::parse(&base)
            .map_err(|e| SamaError::invalid_state(format!("invalid consent endpoint {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SamaError::invalid_state(format!("invalid consent endpoint {base}")))?
            .push(consent_id);
        Ok(url.into())
    }
}

fn require_token(access_token: &str) -> SamaResult<()> {
    if access_token.trim().is_empty() {
        Err(SamaError::bad_request("access token is required"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banks::{BankConfigurationRegistry, Environment};
    use crate::consent::store::InMemoryConsentStore;
    use crate::error::ErrorKind;
    use crate::transport::testing::ScriptedTransport;
    use chrono::Duration;
    use reqwest::Method;
    use serde_json::json;

    const TOKEN: &str = "at-consents";
    const CONSENT_ID: &str = "CONSENT-0001";

    struct Fixture {
        transport: Arc<ScriptedTransport>,
        store: Arc<InMemoryConsentStore>,
        manager: ConsentManager,
    }

    fn fixture() -> Fixture {
        let bank = BankConfigurationRegistry::builtin()
            .unwrap()
            .get_configuration("SNB", Environment::Sandbox)
            .unwrap();
        let transport = ScriptedTransport::new();
        let store = Arc::new(InMemoryConsentStore::new());
        let client = Arc::new(BankApiClient::new(bank, transport.clone()));
        let manager = ConsentManager::new(client, store.clone());
        Fixture {
            transport,
            store,
            manager,
        }
    }

    fn consent_body(id: &str, status: &str) -> serde_json::Value {
        json!({
            "Data": {
                "ConsentId": id,
                "Status": status,
                "CreationDateTime": "2026-01-01T00:00:00Z"
            }
        })
    }

    fn account_request() -> ConsentRequest {
        ConsentRequest::new(
            ["ReadAccountsBasic", "ReadBalances"],
            Utc::now() + Duration::days(90),
        )
    }

    async fn actions(fx: &Fixture, id: &str) -> Vec<ConsentAction> {
        fx.manager
            .get_consent_audit_log(TOKEN, id)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }

    #[tokio::test]
    async fn create_then_revoke_lifecycle() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body(CONSENT_ID, "AwaitingAuthorisation"))
            .push_status(204, &[], "");

        let consent = fx
            .manager
            .create_account_consent(TOKEN, &account_request())
            .await
            .unwrap();
        assert_eq!(consent.status, ConsentStatus::AwaitingAuthorization);
        assert_eq!(consent.kind, ConsentKind::AccountAccess);
        assert!(!fx
            .manager
            .validate_consent_permissions(CONSENT_ID, &["ReadBalances"])
            .await
            .unwrap());

        fx.manager.revoke_consent(TOKEN, CONSENT_ID).await.unwrap();
        let revoked = fx
            .manager
            .get_consent_status(TOKEN, CONSENT_ID)
            .await
            .unwrap();
        assert_eq!(revoked.status, ConsentStatus::Revoked);

        let err = fx
            .manager
            .revoke_consent(TOKEN, CONSENT_ID)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        assert_eq!(
            actions(&fx, CONSENT_ID).await,
            [ConsentAction::Created, ConsentAction::Revoked]
        );
        // Create and delete only; terminal status needs no bank call.
        assert_eq!(fx.transport.request_count(), 2);

        let requests = fx.transport.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert!(requests[0].url.ends_with("/open-banking/v1/consents"));
        assert_eq!(
            requests[0].header_value("Authorization"),
            Some("Bearer at-consents")
        );
        assert_eq!(requests[1].method, Method::DELETE);
        assert!(requests[1].url.ends_with("/consents/CONSENT-0001"));
    }

    #[tokio::test]
    async fn authorised_consent_grants_permissions() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body(CONSENT_ID, "AwaitingAuthorisation"))
            .push_json(200, consent_body(CONSENT_ID, "Authorised"));

        fx.manager
            .create_account_consent(TOKEN, &account_request())
            .await
            .unwrap();
        let consent = fx
            .manager
            .get_consent_status(TOKEN, CONSENT_ID)
            .await
            .unwrap();
        assert_eq!(consent.status, ConsentStatus::Authorized);

        assert!(fx
            .manager
            .validate_consent_permissions(CONSENT_ID, &["ReadBalances"])
            .await
            .unwrap());
        assert!(!fx
            .manager
            .validate_consent_permissions(CONSENT_ID, &["ReadTransactionsDetail"])
            .await
            .unwrap());
        assert!(!fx.manager.is_consent_expired(CONSENT_ID).await.unwrap());

        let log = fx
            .manager
            .get_consent_audit_log(TOKEN, CONSENT_ID)
            .await
            .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].action, ConsentAction::Authorised);
        assert_eq!(log[1].permissions, ["ReadAccountsBasic", "ReadBalances"]);
        assert_eq!(
            log[1].interaction_id.as_deref(),
            fx.transport.requests()[1].header_value(INTERACTION_ID_HEADER)
        );
    }

    #[tokio::test]
    async fn lapsed_consent_is_marked_expired() {
        let fx = fixture();
        let past = Utc::now() - Duration::days(1);
        fx.store
            .put(ConsentDetails {
                consent_id: CONSENT_ID.into(),
                bank_code: "SNB".into(),
                kind: ConsentKind::AccountAccess,
                status: ConsentStatus::AwaitingAuthorization,
                permissions: ["ReadBalances".to_string()].into_iter().collect(),
                creation_date_time: past - Duration::days(30),
                status_update_date_time: past - Duration::days(30),
                expiration_date_time: past,
                transaction_from_date_time: None,
                transaction_to_date_time: None,
            })
            .await
            .unwrap();
        fx.transport
            .push_json(200, consent_body(CONSENT_ID, "Authorised"));

        assert!(fx.manager.is_consent_expired(CONSENT_ID).await.unwrap());
        let consent = fx
            .manager
            .get_consent_status(TOKEN, CONSENT_ID)
            .await
            .unwrap();
        assert_eq!(consent.status, ConsentStatus::Expired);
        assert_eq!(
            actions(&fx, CONSENT_ID).await,
            [ConsentAction::Authorised, ConsentAction::Expired]
        );
        assert!(!fx
            .manager
            .validate_consent_permissions(CONSENT_ID, &["ReadBalances"])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_consent_is_not_found() {
        let fx = fixture();
        let id = "CONSENT-9999";

        let errors = [
            fx.manager.get_consent_status(TOKEN, id).await.unwrap_err(),
            fx.manager.revoke_consent(TOKEN, id).await.unwrap_err(),
            fx.manager.is_consent_expired(id).await.unwrap_err(),
            fx.manager
                .validate_consent_permissions(id, &["ReadBalances"])
                .await
                .unwrap_err(),
            fx.manager.get_consent_audit_log(TOKEN, id).await.unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert_eq!(fx.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn invalid_requests_make_no_bank_call() {
        let fx = fixture();
        let empty = ConsentRequest::new(Vec::<String>::new(), Utc::now() + Duration::days(1));
        let past = ConsentRequest::new(["ReadBalances"], Utc::now() - Duration::seconds(1));

        for request in [&empty, &past] {
            let err = fx
                .manager
                .create_account_consent(TOKEN, request)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest);
        }
        let err = fx
            .manager
            .create_account_consent(" ", &account_request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(fx.transport.request_count(), 0);
        assert!(fx.store.is_empty().await);
    }

    #[tokio::test]
    async fn payment_consent_carries_payments_permission() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body("PAY-CONSENT-0001", "AwaitingAuthorisation"));

        let consent = fx
            .manager
            .create_payment_consent(
                TOKEN,
                &ConsentRequest::new(["ReadBalances"], Utc::now() + Duration::days(1)),
            )
            .await
            .unwrap();
        assert_eq!(consent.kind, ConsentKind::Payment);
        assert!(consent.permissions.contains(PAYMENTS_PERMISSION));

        let sent = match &fx.transport.requests()[0].body {
            crate::transport::RequestBody::Json(body) => body.clone(),
            _ => panic!("expected JSON body"),
        };
        assert_eq!(sent["Data"]["Permissions"], json!(["ReadBalances", "PAYMENTS"]));
    }

    #[tokio::test]
    async fn payment_request_keeps_single_payments_permission() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body("PAY-CONSENT-0002", "AwaitingAuthorisation"));

        let consent = fx
            .manager
            .create_payment_consent(TOKEN, &ConsentRequest::payment(Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(consent.kind, ConsentKind::Payment);

        let sent = match &fx.transport.requests()[0].body {
            crate::transport::RequestBody::Json(body) => body.clone(),
            _ => panic!("expected JSON body"),
        };
        assert_eq!(sent["Data"]["Permissions"], json!(["PAYMENTS"]));
    }

    #[tokio::test]
    async fn consent_locks_are_released_after_use() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body(CONSENT_ID, "AwaitingAuthorisation"))
            .push_json(200, consent_body(CONSENT_ID, "Authorised"))
            .push_status(204, &[], "");

        fx.manager
            .create_account_consent(TOKEN, &account_request())
            .await
            .unwrap();
        fx.manager
            .get_consent_status(TOKEN, CONSENT_ID)
            .await
            .unwrap();
        assert_eq!(fx.manager.locks.len(), 0);

        fx.manager.revoke_consent(TOKEN, CONSENT_ID).await.unwrap();
        assert_eq!(fx.manager.locks.len(), 0);
    }

    #[tokio::test]
    async fn rejected_at_creation_is_terminal() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body(CONSENT_ID, "Rejected"));

        let consent = fx
            .manager
            .create_account_consent(TOKEN, &account_request())
            .await
            .unwrap();
        assert_eq!(consent.status, ConsentStatus::Rejected);
        assert_eq!(
            actions(&fx, CONSENT_ID).await,
            [ConsentAction::Created, ConsentAction::Rejected]
        );
    }

    #[tokio::test]
    async fn short_consent_id_from_bank_is_rejected() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body("c-1", "AwaitingAuthorisation"));

        let err = fx
            .manager
            .create_account_consent(TOKEN, &account_request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert!(fx.store.is_empty().await);
    }

    #[tokio::test]
    async fn status_regression_from_bank_is_ignored() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body(CONSENT_ID, "Authorised"))
            .push_json(200, consent_body(CONSENT_ID, "AwaitingAuthorisation"));

        fx.manager
            .create_account_consent(TOKEN, &account_request())
            .await
            .unwrap();
        let consent = fx
            .manager
            .get_consent_status(TOKEN, CONSENT_ID)
            .await
            .unwrap();
        assert_eq!(consent.status, ConsentStatus::Authorized);
    }

    #[tokio::test]
    async fn concurrent_revokes_are_serialised() {
        let fx = fixture();
        fx.transport
            .push_json(201, consent_body(CONSENT_ID, "Authorised"))
            .push_status(204, &[], "")
            .push_status(204, &[], "");
        fx.manager
            .create_account_consent(TOKEN, &account_request())
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            fx.manager.revoke_consent(TOKEN, CONSENT_ID),
            fx.manager.revoke_consent(TOKEN, CONSENT_ID),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(fx.transport.request_count(), 2);
        assert_eq!(fx.transport.remaining(), 1);
    }
}
