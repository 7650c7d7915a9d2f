//! The in-memory subscription index ("webhook cache"): an immutable
//! snapshot swapped atomically under a read-mostly lock, rebuilt from the
//! trigger store on a timer and on demand via a coalesced refresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use condition::CompiledCondition;
use lib::database::trigger_store::TriggerStore;
use lib::types::{AssetDid, Service, Trigger};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A trigger paired with its compiled condition program. Deduplicated to
/// one instance per `triggerId` within a snapshot.
#[derive(Debug)]
pub struct CompiledTrigger {
    pub trigger: Trigger,
    pub condition: CompiledCondition,
}

type MetricMap = HashMap<String, Vec<Arc<CompiledTrigger>>>;
type ServiceMap = HashMap<Service, MetricMap>;

/// An immutable point-in-time view of which compiled triggers apply to
/// which (asset, service, metric) keys.
#[derive(Debug, Default)]
pub struct Snapshot {
    by_asset: HashMap<AssetDid, ServiceMap>,
    published_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn lookup(
        &self,
        asset_did: &AssetDid,
        service: Service,
        metric_name: &str,
    ) -> Vec<Arc<CompiledTrigger>> {
        self.by_asset
            .get(asset_did)
            .and_then(|by_service| by_service.get(&service))
            .and_then(|by_metric| by_metric.get(metric_name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }
}

/// The in-memory subscription index (Component B). Holds a shared pointer
/// to the current snapshot plus a single-flight coalescing refresh flag,
/// mirroring the teacher's `Arc<RwLock<_>>` snapshot-swap idiom.
pub struct SubscriptionIndex<S> {
    store: Arc<S>,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    refresh_pending: Arc<AtomicBool>,
    refresh_deferral: Duration,
    refresh_interval: Duration,
}

impl<S> Clone for SubscriptionIndex<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            snapshot: self.snapshot.clone(),
            refresh_pending: self.refresh_pending.clone(),
            refresh_deferral: self.refresh_deferral,
            refresh_interval: self.refresh_interval,
        }
    }
}

impl<S> SubscriptionIndex<S>
where
    S: TriggerStore + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<S>,
        refresh_interval: Duration,
        refresh_deferral: Duration,
    ) -> Self {
        Self {
            store,
            snapshot: Arc::new(RwLock::new(Arc::new(Snapshot::default()))),
            refresh_pending: Arc::new(AtomicBool::new(false)),
            refresh_deferral,
            refresh_interval,
        }
    }

    /// O(1) expected lookup against the currently published snapshot.
    pub async fn lookup(
        &self,
        asset_did: &AssetDid,
        service: Service,
        metric_name: &str,
    ) -> Vec<Arc<CompiledTrigger>> {
        let snapshot = self.snapshot.read().await;
        snapshot.lookup(asset_did, service, metric_name)
    }

    pub async fn last_published_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().await.published_at()
    }

    /// Rebuilds the snapshot from the store and atomically publishes it.
    /// Per-trigger compile/fetch failures are logged and that trigger is
    /// dropped from this snapshot only; its stored status is untouched.
    pub async fn populate_cache(&self) {
        let active_subscriptions = match self.store.get_all_active_subscriptions().await {
            | Ok(subs) => subs,
            | Err(e) => {
                warn!("failed to load active subscriptions, keeping previous snapshot: {e}");
                return;
            }
        };

        let mut by_trigger: HashMap<_, Vec<AssetDid>> = HashMap::new();
        for sub in active_subscriptions {
            by_trigger
                .entry(sub.trigger_id)
                .or_default()
                .push(sub.asset_did);
        }

        let mut by_asset: HashMap<AssetDid, ServiceMap> = HashMap::new();
        let mut compiled_count = 0usize;

        for (trigger_id, assets) in by_trigger {
            let trigger = match self.store.get_trigger_by_id(&trigger_id).await {
                | Ok(trigger) => trigger,
                | Err(e) => {
                    warn!(%trigger_id, "trigger vanished between subscription scan and fetch, skipping: {e}");
                    continue;
                }
            };

            if !trigger.enabled() {
                continue;
            }

            let condition = match trigger.service {
                | Service::Signals => CompiledCondition::compile_signal(&trigger.condition),
                | Service::Events => CompiledCondition::compile_event(&trigger.condition),
            };
            let condition = match condition {
                | Ok(c) => c,
                | Err(e) => {
                    warn!(
                        trigger_id = %trigger.id,
                        "trigger condition failed to compile, dropping from this snapshot: {e}"
                    );
                    continue;
                }
            };

            let compiled = Arc::new(CompiledTrigger {
                trigger: trigger.clone(),
                condition,
            });
            compiled_count += 1;

            for asset in &assets {
                by_asset
                    .entry(asset.clone())
                    .or_default()
                    .entry(trigger.service)
                    .or_default()
                    .entry(trigger.metric_name.clone())
                    .or_default()
                    .push(compiled.clone());
            }
        }

        let snapshot = Arc::new(Snapshot {
            by_asset,
            published_at: Some(Utc::now()),
        });

        {
            let mut guard = self.snapshot.write().await;
            *guard = snapshot;
        }
        info!(triggers = compiled_count, "subscription index refreshed");
    }

    /// Coalescing refresh: sets a pending flag and spawns exactly one
    /// deferred rebuild if one isn't already in flight. Safe to call many
    /// times within the deferral window.
    pub fn schedule_refresh(&self) {
        if self
            .refresh_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // A refresh is already scheduled; this call piggybacks on it.
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.refresh_deferral).await;
            this.populate_cache().await;
            this.refresh_pending.store(false, Ordering::SeqCst);
        });
    }

    /// Runs the 60-second periodic refresh loop until `shutdown` fires.
    pub async fn run_periodic_refresh(&self, mut shutdown: lib::service::Shutdown) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.populate_cache().await;
                }
                _ = shutdown.recv() => {
                    info!("subscription index refresh loop shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lib::database::trigger_store::{NewTrigger, SqlTriggerStore, TriggerStore};
    use lib::database::Database;
    use lib::types::DevLicense;

    use super::*;

    async fn index() -> (SubscriptionIndex<SqlTriggerStore>, Arc<SqlTriggerStore>) {
        let db = Database::in_memory().await.unwrap();
        let store = Arc::new(SqlTriggerStore::new(db));
        let idx = SubscriptionIndex::new(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_millis(1),
        );
        (idx, store)
    }

    fn sample_trigger() -> NewTrigger {
        NewTrigger {
            display_name: "speed-over-80".into(),
            owner_dev_license: DevLicense::new("0x1111111111111111111111111111111111111111"),
            service: Service::Signals,
            metric_name: "speed".into(),
            condition: "valueNumber > 80.0".into(),
            target_uri: "https://example.com/hook".into(),
            cooldown_seconds: 0,
            description: None,
        }
    }

    #[tokio::test]
    async fn lookup_is_empty_before_populate() {
        let (idx, _store) = index().await;
        let asset = AssetDid::new(137, "0xdeadbeef00000000000000000000000000000000", 1);
        assert!(idx.lookup(&asset, Service::Signals, "speed").await.is_empty());
    }

    #[tokio::test]
    async fn populate_cache_makes_subscription_lookupable() {
        let (idx, store) = index().await;
        let trigger = store.create_trigger(sample_trigger()).await.unwrap();
        let asset = AssetDid::new(137, "0xdeadbeef00000000000000000000000000000000", 1);
        store.create_subscription(&trigger.id, &asset).await.unwrap();

        idx.populate_cache().await;

        let matches = idx.lookup(&asset, Service::Signals, "speed").await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].trigger.id, trigger.id);
    }

    #[tokio::test]
    async fn populate_cache_skips_disabled_triggers() {
        let (idx, store) = index().await;
        let trigger = store.create_trigger(sample_trigger()).await.unwrap();
        let asset = AssetDid::new(137, "0xdeadbeef00000000000000000000000000000000", 1);
        store.create_subscription(&trigger.id, &asset).await.unwrap();

        let mut disabled = trigger.clone();
        disabled.status = lib::types::Status::Disabled;
        store.update_trigger(disabled).await.unwrap();

        idx.populate_cache().await;
        assert!(idx.lookup(&asset, Service::Signals, "speed").await.is_empty());
    }

    #[tokio::test]
    async fn schedule_refresh_coalesces_bursts() {
        let (idx, store) = index().await;
        let trigger = store.create_trigger(sample_trigger()).await.unwrap();
        let asset = AssetDid::new(137, "0xdeadbeef00000000000000000000000000000000", 1);
        store.create_subscription(&trigger.id, &asset).await.unwrap();

        for _ in 0..5 {
            idx.schedule_refresh();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let matches = idx.lookup(&asset, Service::Signals, "speed").await;
        assert_eq!(matches.len(), 1);
    }
}
