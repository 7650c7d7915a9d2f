//! Component D: one pipeline instance per telemetry topic, driving the
//! per-record decode → lookup → fan-out → evaluate → deliver sequence
//! under bounded concurrency.

use std::sync::Arc;

use chrono::Utc;
use condition::{SignalReading, SignalValue};
use dispatch::cloud_event::{CloudEvent, EventPayload, SignalPayload};
use dispatch::sender::{SendError, WebhookSender};
use dispatch::{record_failure, record_success};
use index::SubscriptionIndex;
use lib::database::trigger_store::{NewTriggerLog, TriggerStore};
use lib::signal_catalog;
use lib::types::{AssetDid, Service};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use lib::access::{AccessClient, PRIVILEGE_LOCATION_HISTORY, PRIVILEGE_NON_LOCATION_HISTORY};

use crate::record::{EventRecord, SignalRecord};

/// Bound on the per-record fan-out across matching subscriptions, fixed
/// regardless of configuration — spec.md §4.D step 4.
const FANOUT_LIMIT: usize = 100;

pub struct PipelineConfig {
    pub brokers: String,
    pub group_id: String,
    pub topic: String,
    /// Bound on concurrently in-flight *records*. The default of 1
    /// processes records one at a time, preserving the per-asset/per-metric
    /// ordering the store's `previousValue` semantics depend on; raising it
    /// trades that ordering guarantee for higher throughput.
    pub max_in_flight: u32,
    pub chain_id: u64,
    pub vehicle_nft_address: String,
    pub max_webhook_failure_count: i32,
}

pub struct IngestionPipeline<S, A> {
    consumer: StreamConsumer,
    config: PipelineConfig,
    index: SubscriptionIndex<S>,
    store: Arc<S>,
    access: Arc<A>,
    sender: WebhookSender,
    record_semaphore: Arc<Semaphore>,
}

impl<S, A> IngestionPipeline<S, A>
where
    S: TriggerStore + Send + Sync + 'static,
    A: AccessClient + 'static,
{
    pub fn new(
        config: PipelineConfig,
        index: SubscriptionIndex<S>,
        store: Arc<S>,
        access: Arc<A>,
        sender: WebhookSender,
    ) -> Result<Self, rdkafka::error::KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.offset.store", "false")
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[config.topic.as_str()])?;
        let record_semaphore = Arc::new(Semaphore::new(config.max_in_flight.max(1) as usize));
        Ok(Self { consumer, config, index, store, access, sender, record_semaphore })
    }

    pub fn service(&self) -> Service {
        if self.config.topic == "telemetry.events" { Service::Events } else { Service::Signals }
    }

    /// Runs until `shutdown` fires. Up to `max_in_flight` records are
    /// decoded and fanned out concurrently; a record's offset is stored
    /// only once its own processing has finished, never before, so a crash
    /// mid-flight never commits an offset for a record that wasn't acted on.
    pub async fn run(self: Arc<Self>, mut shutdown: lib::service::Shutdown) {
        use futures::StreamExt;
        let mut stream = self.consumer.stream();
        let mut in_flight: JoinSet<(String, i32, i64)> = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(topic = %self.config.topic, "ingestion pipeline shutting down");
                    self.drain(&mut in_flight).await;
                    return;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.store_joined_offset(joined);
                }
                maybe_msg = stream.next() => {
                    let Some(msg) = maybe_msg else {
                        info!(topic = %self.config.topic, "consumer stream ended");
                        self.drain(&mut in_flight).await;
                        return;
                    };
                    match msg {
                        | Ok(msg) => {
                            let permit = self.record_semaphore.clone().acquire_owned().await;
                            let payload = msg.payload().map(|p| p.to_vec());
                            let topic = msg.topic().to_string();
                            let partition = msg.partition();
                            let offset = msg.offset();
                            let pipeline = self.clone();
                            in_flight.spawn(async move {
                                if let Some(payload) = payload {
                                    pipeline.process_message(&payload).await;
                                }
                                drop(permit);
                                (topic, partition, offset)
                            });
                        }
                        | Err(e) => {
                            warn!(topic = %self.config.topic, "consumer error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Stores the offset for one finished record, given the `JoinSet` result
    /// for its task.
    fn store_joined_offset(
        &self,
        joined: Result<(String, i32, i64), tokio::task::JoinError>,
    ) {
        match joined {
            | Ok((topic, partition, offset)) => {
                if let Err(e) = self.consumer.store_offset(&topic, partition, offset) {
                    warn!("failed to store consumer offset: {e}");
                }
            }
            | Err(e) => {
                warn!(topic = %self.config.topic, "record task panicked: {e}");
            }
        }
    }

    /// Waits for every still-running record task to finish, storing its
    /// offset, before the pipeline returns. Run on both shutdown and
    /// stream-end so no in-flight work is silently dropped.
    async fn drain(&self, in_flight: &mut JoinSet<(String, i32, i64)>) {
        while let Some(joined) = in_flight.join_next().await {
            self.store_joined_offset(joined);
        }
    }

    async fn process_message(&self, payload: &[u8]) {
        match self.service() {
            | Service::Signals => self.process_signal_message(payload).await,
            | Service::Events => self.process_event_message(payload).await,
        }
    }

    async fn process_signal_message(&self, payload: &[u8]) {
        let record: SignalRecord = match serde_json::from_slice(payload) {
            | Ok(r) => r,
            | Err(e) => {
                warn!("discarding malformed signal record: {e}");
                return;
            }
        };
        let asset_did =
            AssetDid::new(self.config.chain_id, &self.config.vehicle_nft_address, record.token_id);
        let current = record.to_signal_reading();
        let raw_record = String::from_utf8_lossy(payload).into_owned();
        let subs = self.index.lookup(&asset_did, Service::Signals, &record.name).await;
        if subs.is_empty() {
            return;
        }

        let fanout_permits = Arc::new(Semaphore::new(FANOUT_LIMIT.min(subs.len().max(1))));
        let mut tasks = Vec::with_capacity(subs.len());
        for compiled in subs {
            let asset_did = asset_did.clone();
            let current = current.clone();
            let raw_record = raw_record.clone();
            let permits = fanout_permits.clone();
            let store = self.store.clone();
            let access = self.access.clone();
            let sender = self.sender.clone();
            let max_failure_count = self.config.max_webhook_failure_count;
            let index = self.index.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                deliver_signal(
                    &*store,
                    &*access,
                    &sender,
                    Some(&index),
                    &compiled.trigger,
                    &compiled.condition,
                    &asset_did,
                    &current,
                    &raw_record,
                    max_failure_count,
                )
                .await;
            }));
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!("fan-out task panicked: {e}");
            }
        }
    }

    async fn process_event_message(&self, payload: &[u8]) {
        let records: Vec<EventRecord> = match serde_json::from_slice(payload) {
            | Ok(r) => r,
            | Err(e) => {
                warn!("discarding malformed event record batch: {e}");
                return;
            }
        };
        for record in records {
            let asset_did: AssetDid = match record.subject.parse() {
                | Ok(did) => did,
                | Err(e) => {
                    warn!(subject = %record.subject, "discarding event with unparseable subject: {e}");
                    continue;
                }
            };
            let reading = record.to_event_reading();
            let raw_record = serde_json::to_string(&record).unwrap_or_default();
            let subs = self.index.lookup(&asset_did, Service::Events, &record.name).await;
            if subs.is_empty() {
                continue;
            }

            let fanout_permits = Arc::new(Semaphore::new(FANOUT_LIMIT.min(subs.len().max(1))));
            let mut tasks = Vec::with_capacity(subs.len());
            for compiled in subs {
                let asset_did = asset_did.clone();
                let reading = reading.clone();
                let raw_record = raw_record.clone();
                let permits = fanout_permits.clone();
                let store = self.store.clone();
                let access = self.access.clone();
                let sender = self.sender.clone();
                let max_failure_count = self.config.max_webhook_failure_count;
                let index = self.index.clone();
                tasks.push(tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    deliver_event(
                        &*store,
                        &*access,
                        &sender,
                        Some(&index),
                        &compiled.trigger,
                        &compiled.condition,
                        &asset_did,
                        &reading,
                        &raw_record,
                        max_failure_count,
                    )
                    .await;
                }));
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!("fan-out task panicked: {e}");
                }
            }
        }
    }
}

pub async fn check_access_and_maybe_unsubscribe<S: TriggerStore + Send + Sync + 'static, A: AccessClient>(
    store: &S,
    access: &A,
    index: Option<&SubscriptionIndex<S>>,
    trigger: &lib::types::Trigger,
    asset_did: &AssetDid,
) -> bool {
    let granted = access
        .has_vehicle_permissions(
            asset_did,
            &trigger.owner_dev_license,
            &[PRIVILEGE_NON_LOCATION_HISTORY, PRIVILEGE_LOCATION_HISTORY],
        )
        .await;
    match granted {
        | Ok(true) => true,
        | Ok(false) => {
            info!(
                trigger_id = %trigger.id, %asset_did,
                "access revoked, auto-unsubscribing"
            );
            if let Err(e) = store.delete_subscription(&trigger.id, asset_did).await {
                warn!(trigger_id = %trigger.id, "failed to auto-unsubscribe after access revocation: {e}");
            } else if let Some(index) = index {
                index.schedule_refresh();
            }
            false
        }
        | Err(e) => {
            warn!(trigger_id = %trigger.id, %asset_did, "access-control check failed: {e}");
            false
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn deliver_signal<S: TriggerStore + Send + Sync + 'static, A: AccessClient>(
    store: &S,
    access: &A,
    sender: &WebhookSender,
    index: Option<&SubscriptionIndex<S>>,
    trigger: &lib::types::Trigger,
    condition: &condition::CompiledCondition,
    asset_did: &AssetDid,
    current: &SignalReading,
    raw_record: &str,
    max_failure_count: i32,
) {
    if !check_access_and_maybe_unsubscribe(store, access, index, trigger, asset_did).await {
        return;
    }

    let last_log = match store.get_last_log(&trigger.id, asset_did).await {
        | Ok(log) => log,
        | Err(e) => {
            warn!(trigger_id = %trigger.id, "failed to fetch last trigger log: {e}");
            return;
        }
    };
    let previous = last_log
        .as_ref()
        .and_then(|log| serde_json::from_str::<crate::record::SignalRecord>(&log.snapshot_data).ok())
        .map(|r| r.to_signal_reading())
        .unwrap_or_default();

    let fired = match condition.evaluate_signal(current, &previous) {
        | Ok(b) => b,
        | Err(e) => {
            debug!(trigger_id = %trigger.id, "condition evaluation failed: {e}");
            return;
        }
    };
    if !fired {
        return;
    }

    let now = Utc::now();
    if let Some(log) = &last_log {
        let elapsed = (now - log.last_triggered_at).num_seconds();
        if elapsed < trigger.cooldown_seconds {
            return;
        }
    }
    if !trigger.enabled() || trigger.failure_count >= max_failure_count {
        return;
    }

    let value_type = signal_catalog::get_definition(&trigger.metric_name)
        .map(|d| d.value_type.as_str())
        .unwrap_or("number");
    let unit =
        signal_catalog::get_definition(&trigger.metric_name).map(|d| d.unit).unwrap_or("");
    let payload = CloudEvent::for_signal(
        trigger,
        asset_did,
        now,
        SignalPayload {
            name: trigger.metric_name.clone(),
            source: "vehicle".into(),
            units: unit.to_string(),
            value_type: value_type.to_string(),
            value: signal_reading_as_json(current),
            timestamp: lib::timeutil::to_rfc3339(&now),
            producer: "dimo/integration".into(),
        },
    );

    match sender.send(trigger, &payload).await {
        | Ok(_) => {
            record_success(
                store,
                &trigger.id,
                NewTriggerLog {
                    trigger_id: trigger.id.clone(),
                    asset_did: asset_did.clone(),
                    snapshot_data: raw_record.to_string(),
                    last_triggered_at: now,
                },
            )
            .await;
        }
        | Err(SendError::WebhookFailure(reason)) => {
            debug!(trigger_id = %trigger.id, "webhook delivery failed: {reason}");
            record_failure(store, &trigger.id, max_failure_count).await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn deliver_event<S: TriggerStore + Send + Sync + 'static, A: AccessClient>(
    store: &S,
    access: &A,
    sender: &WebhookSender,
    index: Option<&SubscriptionIndex<S>>,
    trigger: &lib::types::Trigger,
    condition: &condition::CompiledCondition,
    asset_did: &AssetDid,
    reading: &condition::EventReading,
    raw_record: &str,
    max_failure_count: i32,
) {
    if !check_access_and_maybe_unsubscribe(store, access, index, trigger, asset_did).await {
        return;
    }

    let last_log = match store.get_last_log(&trigger.id, asset_did).await {
        | Ok(log) => log,
        | Err(e) => {
            warn!(trigger_id = %trigger.id, "failed to fetch last trigger log: {e}");
            return;
        }
    };

    let fired = match condition.evaluate_event(reading) {
        | Ok(b) => b,
        | Err(e) => {
            debug!(trigger_id = %trigger.id, "condition evaluation failed: {e}");
            return;
        }
    };
    if !fired {
        return;
    }

    let now = Utc::now();
    if let Some(log) = &last_log {
        let elapsed = (now - log.last_triggered_at).num_seconds();
        if elapsed < trigger.cooldown_seconds {
            return;
        }
    }
    if !trigger.enabled() || trigger.failure_count >= max_failure_count {
        return;
    }

    let payload = CloudEvent::for_event(
        trigger,
        asset_did,
        now,
        EventPayload {
            name: reading.name.clone(),
            source: reading.source.clone(),
            producer: reading.producer.clone(),
            duration_ns: reading.duration_ns,
            metadata: reading.metadata.clone(),
        },
    );

    match sender.send(trigger, &payload).await {
        | Ok(_) => {
            record_success(
                store,
                &trigger.id,
                NewTriggerLog {
                    trigger_id: trigger.id.clone(),
                    asset_did: asset_did.clone(),
                    snapshot_data: raw_record.to_string(),
                    last_triggered_at: now,
                },
            )
            .await;
        }
        | Err(SendError::WebhookFailure(reason)) => {
            debug!(trigger_id = %trigger.id, "webhook delivery failed: {reason}");
            record_failure(store, &trigger.id, max_failure_count).await;
        }
    }
}

fn signal_reading_as_json(reading: &SignalReading) -> serde_json::Value {
    match &reading.value {
        | SignalValue::Number(n) => serde_json::json!(n),
        | SignalValue::Text(s) => serde_json::json!(s),
        | SignalValue::Location(loc) => serde_json::json!({
            "Latitude": loc.latitude,
            "Longitude": loc.longitude,
            "HDOP": loc.hdop,
        }),
    }
}
