//! Component G: the control-plane adapter the (out-of-scope) HTTP layer
//! calls into for trigger and subscription CRUD.

use std::sync::Arc;

use condition::CompiledCondition;
use index::SubscriptionIndex;
use lib::access::AccessClient;
use lib::database::trigger_store::{NewTrigger, TriggerStore};
use lib::error::CoreError;
use lib::identity::IdentityClient;
use lib::signal_catalog;
use lib::types::{AssetDid, DevLicense, Service, Status, TriggerId};
use tracing::{info, warn};
use validator::Validate;

use crate::handshake::verify_target_url;
use crate::request::{
    RegisterTriggerRequest,
    RegisterTriggerResponse,
    SignalDefinitionView,
    SubscribeManyResult,
    SubscriptionFailure,
    SubscriptionView,
    TriggerView,
    UpdateTriggerRequest,
};

const ACCESS_PRIVILEGES: &[&str] =
    &[lib::access::PRIVILEGE_NON_LOCATION_HISTORY, lib::access::PRIVILEGE_LOCATION_HISTORY];

impl From<crate::handshake::VerificationError> for CoreError {
    fn from(value: crate::handshake::VerificationError) -> Self {
        CoreError::Validation(format!("target URL verification failed: {value}"))
    }
}

pub struct ControlPlane<S, A, I> {
    store: Arc<S>,
    index: SubscriptionIndex<S>,
    access: Arc<A>,
    identity: Arc<I>,
    http: reqwest::Client,
}

impl<S, A, I> ControlPlane<S, A, I>
where
    S: TriggerStore + Send + Sync + 'static,
    A: AccessClient,
    I: IdentityClient,
{
    pub fn new(
        store: Arc<S>,
        index: SubscriptionIndex<S>,
        access: Arc<A>,
        identity: Arc<I>,
    ) -> Self {
        Self { store, index, access, identity, http: reqwest::Client::new() }
    }

    fn compile_condition(
        &self,
        service: Service,
        metric_name: &str,
        condition: &str,
    ) -> Result<CompiledCondition, CoreError> {
        if service == Service::Signals && signal_catalog::get_definition(metric_name).is_none() {
            return Err(CoreError::Validation(format!(
                "unknown metric for telemetry.signals: {metric_name}"
            )));
        }
        match service {
            | Service::Signals => CompiledCondition::compile_signal(condition),
            | Service::Events => CompiledCondition::compile_event(condition),
        }
        .map_err(|e| CoreError::Validation(format!("condition failed to compile: {e}")))
    }

    pub async fn register_trigger(
        &self,
        owner: &DevLicense,
        req: RegisterTriggerRequest,
    ) -> Result<RegisterTriggerResponse, CoreError> {
        req.validate()?;
        self.compile_condition(req.service, &req.metric_name, &req.condition)?;
        verify_target_url(&self.http, &req.target_uri, &req.verification_token).await?;

        let trigger = self
            .store
            .create_trigger(NewTrigger {
                display_name: req.display_name,
                owner_dev_license: owner.clone(),
                service: req.service,
                metric_name: req.metric_name,
                condition: req.condition,
                target_uri: req.target_uri,
                cooldown_seconds: req.cooldown_seconds,
                description: req.description,
            })
            .await?;

        self.index.schedule_refresh();
        info!(trigger_id = %trigger.id, %owner, "trigger registered");
        Ok(RegisterTriggerResponse { id: trigger.id })
    }

    pub async fn list_triggers(&self, owner: &DevLicense) -> Result<Vec<TriggerView>, CoreError> {
        let triggers = self.store.get_triggers_by_owner(owner).await?;
        Ok(triggers.into_iter().map(TriggerView::from).collect())
    }

    pub async fn update_trigger(
        &self,
        owner: &DevLicense,
        id: &TriggerId,
        patch: UpdateTriggerRequest,
    ) -> Result<(), CoreError> {
        patch.validate()?;
        let (mut trigger, txn) = self.store.get_trigger_for_update(id, owner).await?;

        if let Some(target_uri) = &patch.target_uri {
            let token = patch.verification_token.as_deref().ok_or_else(|| {
                CoreError::Validation(
                    "verificationToken is required when changing targetUri".to_string(),
                )
            })?;
            verify_target_url(&self.http, target_uri, token).await?;
            trigger.target_uri = target_uri.clone();
        }
        if let Some(display_name) = patch.display_name {
            trigger.display_name = display_name;
        }
        if let Some(metric_name) = patch.metric_name {
            trigger.metric_name = metric_name;
        }
        if let Some(condition) = patch.condition {
            self.compile_condition(trigger.service, &trigger.metric_name, &condition)?;
            trigger.condition = condition;
        } else if patch.metric_name.is_some() {
            self.compile_condition(trigger.service, &trigger.metric_name, &trigger.condition)?;
        }
        if let Some(cooldown_seconds) = patch.cooldown_seconds {
            trigger.cooldown_seconds = cooldown_seconds;
        }
        if patch.description.is_some() {
            trigger.description = patch.description;
        }
        if let Some(status) = patch.status {
            trigger.status = status;
        }
        trigger.failure_count = 0;
        if trigger.status == Status::Failed {
            trigger.status = Status::Enabled;
        }

        // `update_trigger` re-filters by owner/non-deleted on its own; the
        // lock here only serves to read a consistent starting row.
        txn.rollback().await.ok();
        self.store.update_trigger(trigger).await?;
        self.index.schedule_refresh();
        Ok(())
    }

    pub async fn delete_trigger(
        &self,
        owner: &DevLicense,
        id: &TriggerId,
    ) -> Result<(), CoreError> {
        self.store.delete_trigger(id, owner).await?;
        self.index.schedule_refresh();
        Ok(())
    }

    async fn assert_owns_trigger(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
    ) -> Result<(), CoreError> {
        self.store.get_trigger_by_id_and_owner(trigger_id, owner).await?;
        Ok(())
    }

    pub async fn subscribe(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<(), CoreError> {
        self.assert_owns_trigger(owner, trigger_id).await?;
        if !self.access.has_vehicle_permissions(asset_did, owner, ACCESS_PRIVILEGES).await? {
            return Err(CoreError::Forbidden);
        }
        self.store.create_subscription(trigger_id, asset_did).await?;
        self.index.schedule_refresh();
        Ok(())
    }

    pub async fn subscribe_many(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
        asset_dids: &[AssetDid],
    ) -> Result<SubscribeManyResult, CoreError> {
        self.assert_owns_trigger(owner, trigger_id).await?;
        let mut failures = Vec::new();
        for asset_did in asset_dids {
            if let Err(e) = self.subscribe_unchecked(owner, trigger_id, asset_did).await {
                failures.push(SubscriptionFailure { asset_did: asset_did.clone(), msg: e.to_string() });
            }
        }
        self.index.schedule_refresh();
        Ok(SubscribeManyResult { failures })
    }

    pub async fn subscribe_all_shared(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
    ) -> Result<SubscribeManyResult, CoreError> {
        self.assert_owns_trigger(owner, trigger_id).await?;
        let shared = self.identity.get_shared_vehicles(owner).await.map_err(|e| {
            CoreError::Transient(format!("failed to resolve shared vehicles: {e}"))
        })?;
        let mut failures = Vec::new();
        for asset_did in &shared {
            if let Err(e) = self.subscribe_unchecked(owner, trigger_id, asset_did).await {
                failures.push(SubscriptionFailure { asset_did: asset_did.clone(), msg: e.to_string() });
            }
        }
        self.index.schedule_refresh();
        Ok(SubscribeManyResult { failures })
    }

    /// Shared by `subscribe_many`/`subscribe_all_shared`: skips the
    /// redundant ownership re-check already done by the caller but still
    /// enforces the per-asset access check.
    async fn subscribe_unchecked(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<(), CoreError> {
        if !self.access.has_vehicle_permissions(asset_did, owner, ACCESS_PRIVILEGES).await? {
            return Err(CoreError::Forbidden);
        }
        self.store.create_subscription(trigger_id, asset_did).await?;
        Ok(())
    }

    pub async fn unsubscribe(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<(), CoreError> {
        self.assert_owns_trigger(owner, trigger_id).await?;
        self.store.delete_subscription(trigger_id, asset_did).await?;
        self.index.schedule_refresh();
        Ok(())
    }

    pub async fn unsubscribe_many(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
        asset_dids: &[AssetDid],
    ) -> Result<(), CoreError> {
        self.assert_owns_trigger(owner, trigger_id).await?;
        for asset_did in asset_dids {
            if let Err(e) = self.store.delete_subscription(trigger_id, asset_did).await {
                warn!(%trigger_id, %asset_did, "failed to delete subscription: {e}");
            }
        }
        self.index.schedule_refresh();
        Ok(())
    }

    pub async fn unsubscribe_all(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
    ) -> Result<(), CoreError> {
        self.assert_owns_trigger(owner, trigger_id).await?;
        self.store.delete_all_subscriptions(trigger_id).await?;
        self.index.schedule_refresh();
        Ok(())
    }

    pub async fn list_subscribers(
        &self,
        owner: &DevLicense,
        trigger_id: &TriggerId,
    ) -> Result<Vec<AssetDid>, CoreError> {
        self.assert_owns_trigger(owner, trigger_id).await?;
        let subs = self.store.get_subscriptions_by_trigger(trigger_id).await?;
        Ok(subs.into_iter().map(|s| s.asset_did).collect())
    }

    pub async fn list_subscriptions_for(
        &self,
        owner: &DevLicense,
        asset_did: &AssetDid,
    ) -> Result<Vec<SubscriptionView>, CoreError> {
        let subs = self.store.get_subscriptions_for_asset_and_owner(asset_did, owner).await?;
        Ok(subs.into_iter().map(SubscriptionView::from).collect())
    }

    pub fn get_signal_catalog(&self) -> Vec<SignalDefinitionView> {
        signal_catalog::all().iter().copied().map(SignalDefinitionView::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lib::access::StaticAccessClient;
    use lib::database::trigger_store::SqlTriggerStore;
    use lib::database::Database;
    use lib::identity::StaticIdentityClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn plane(
        access_granted: bool,
        shared: Vec<AssetDid>,
    ) -> ControlPlane<SqlTriggerStore, StaticAccessClient, StaticIdentityClient> {
        let store = Arc::new(SqlTriggerStore::new(Database::in_memory().await.unwrap()));
        let index =
            SubscriptionIndex::new(store.clone(), Duration::from_secs(60), Duration::from_secs(5));
        let access = Arc::new(if access_granted {
            StaticAccessClient::allow()
        } else {
            StaticAccessClient::deny()
        });
        let identity = Arc::new(StaticIdentityClient::new(shared));
        ControlPlane::new(store, index, access, identity)
    }

    fn register_request(target_uri: String, token: &str) -> RegisterTriggerRequest {
        RegisterTriggerRequest {
            display_name: "speed-over-20".into(),
            service: Service::Signals,
            metric_name: "speed".into(),
            condition: "valueNumber > 20.0".into(),
            target_uri,
            cooldown_seconds: 0,
            description: None,
            verification_token: token.into(),
        }
    }

    #[tokio::test]
    async fn register_trigger_requires_a_matching_verification_token() {
        std::env::set_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION", "1");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("secret-token"))
            .mount(&server)
            .await;

        let plane = plane(true, vec![]).await;
        let owner = DevLicense::new("0x1111111111111111111111111111111111111111");

        let req = register_request(format!("{}/hook", server.uri()), "secret-token");
        let result = plane.register_trigger(&owner, req).await;
        assert!(result.is_ok());

        let wrong_token = register_request(format!("{}/hook", server.uri()), "wrong-token");
        let result = plane.register_trigger(&owner, wrong_token).await;
        assert!(result.is_err());
        std::env::remove_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION");
    }

    #[tokio::test]
    async fn register_trigger_rejects_unknown_signal_metric() {
        std::env::set_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION", "1");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
            .mount(&server)
            .await;

        let plane = plane(true, vec![]).await;
        let owner = DevLicense::new("0x1111111111111111111111111111111111111111");
        let mut req = register_request(format!("{}/hook", server.uri()), "tok");
        req.metric_name = "notARealSignal".into();

        let err = plane.register_trigger(&owner, req).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        std::env::remove_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION");
    }

    #[tokio::test]
    async fn ownership_mismatch_surfaces_as_not_found() {
        std::env::set_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION", "1");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
            .mount(&server)
            .await;

        let plane = plane(true, vec![]).await;
        let owner = DevLicense::new("0x1111111111111111111111111111111111111111");
        let intruder = DevLicense::new("0x2222222222222222222222222222222222222222");
        let req = register_request(format!("{}/hook", server.uri()), "tok");
        let registered = plane.register_trigger(&owner, req).await.unwrap();

        let err = plane.delete_trigger(&intruder, &registered.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
        std::env::remove_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION");
    }

    #[tokio::test]
    async fn subscribe_without_access_privileges_is_forbidden() {
        std::env::set_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION", "1");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
            .mount(&server)
            .await;

        let plane = plane(false, vec![]).await;
        let owner = DevLicense::new("0x1111111111111111111111111111111111111111");
        let req = register_request(format!("{}/hook", server.uri()), "tok");
        let registered = plane.register_trigger(&owner, req).await.unwrap();
        let asset = AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 1);

        let err = plane.subscribe(&owner, &registered.id, &asset).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));
        std::env::remove_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION");
    }

    #[tokio::test]
    async fn subscribe_all_shared_subscribes_every_identity_vehicle() {
        std::env::set_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION", "1");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
            .mount(&server)
            .await;

        let shared = vec![
            AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 1),
            AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 2),
        ];
        let plane = plane(true, shared.clone()).await;
        let owner = DevLicense::new("0x1111111111111111111111111111111111111111");
        let req = register_request(format!("{}/hook", server.uri()), "tok");
        let registered = plane.register_trigger(&owner, req).await.unwrap();

        let result = plane.subscribe_all_shared(&owner, &registered.id).await.unwrap();
        assert!(result.failures.is_empty());
        let subscribers = plane.list_subscribers(&owner, &registered.id).await.unwrap();
        assert_eq!(subscribers.len(), 2);
        std::env::remove_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION");
    }

    #[tokio::test]
    async fn update_trigger_resets_the_failure_counter() {
        std::env::set_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION", "1");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
            .mount(&server)
            .await;

        let plane = plane(true, vec![]).await;
        let owner = DevLicense::new("0x1111111111111111111111111111111111111111");
        let req = register_request(format!("{}/hook", server.uri()), "tok");
        let registered = plane.register_trigger(&owner, req).await.unwrap();

        plane.store.increment_failure(&registered.id, 1).await.unwrap();
        let triggers = plane.list_triggers(&owner).await.unwrap();
        assert_eq!(triggers[0].status, Status::Failed);

        plane
            .update_trigger(&owner, &registered.id, UpdateTriggerRequest {
                cooldown_seconds: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();

        let triggers = plane.list_triggers(&owner).await.unwrap();
        assert_eq!(triggers[0].status, Status::Enabled);
        assert_eq!(triggers[0].failure_count, 0);
        assert_eq!(triggers[0].cooldown_seconds, 5);
        std::env::remove_var("TRIGGERS__SKIP_PUBLIC_IP_VALIDATION");
    }

    #[tokio::test]
    async fn get_signal_catalog_returns_known_metrics() {
        let plane = plane(true, vec![]).await;
        let catalog = plane.get_signal_catalog();
        assert!(catalog.iter().any(|d| d.name == "speed"));
    }
}
