//! The webhook sender (Component E) and the failure-manager glue the
//! ingestion pipeline calls into (Component F); the counter mutation
//! itself lives in `lib`'s trigger store so it shares the store's
//! transactional re-read semantics.

pub mod cloud_event;
pub mod sender;

pub use cloud_event::{CloudEvent, CloudEventData, EventPayload, SignalPayload};
pub use sender::{DeliveryOutcome, SendError, WebhookSender};

use lib::database::trigger_store::{NewTriggerLog, TriggerStore};
use lib::types::TriggerId;
use tracing::warn;

/// Called by the ingestion pipeline after a successful delivery: resets
/// the failure counter and appends the delivery log entry used as the
/// next `previousValue` source.
pub async fn record_success(
    store: &(impl TriggerStore + Sync),
    trigger_id: &TriggerId,
    log: NewTriggerLog,
) {
    if let Err(e) = store.reset_failure(trigger_id).await {
        warn!(%trigger_id, "failed to reset failure counter after a successful delivery: {e}");
    }
    if let Err(e) = store.append_log(log).await {
        warn!(%trigger_id, "failed to append trigger log after a successful delivery: {e}");
    }
}

/// Called by the ingestion pipeline after a delivery classified as a
/// webhook failure: increments the counter, tripping the circuit breaker
/// at the configured threshold.
pub async fn record_failure(
    store: &(impl TriggerStore + Sync),
    trigger_id: &TriggerId,
    max_failure_count: i32,
) {
    if let Err(e) = store.increment_failure(trigger_id, max_failure_count).await
    {
        warn!(%trigger_id, "failed to record delivery failure: {e}");
    }
}
