use chrono::{DateTime, Utc};
use lib::types::{AssetDid, Service, Trigger};
use serde::Serialize;
use serde_json::Value as Json;

/// The outbound webhook body: a CloudEvents 1.0 envelope wrapping the
/// trigger, the asset, and whichever of `signal`/`event` the firing
/// service produced.
#[derive(Debug, Clone, Serialize)]
pub struct CloudEvent {
    pub id: String,
    pub source: &'static str,
    pub subject: String,
    pub time: String,
    pub datacontenttype: &'static str,
    pub dataversion: String,
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub specversion: &'static str,
    pub data: CloudEventData,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloudEventData {
    pub service: &'static str,
    #[serde(rename = "metricName")]
    pub metric_name: String,
    #[serde(rename = "webhookId")]
    pub webhook_id: String,
    #[serde(rename = "webhookName")]
    pub webhook_name: String,
    #[serde(rename = "assetDid")]
    pub asset_did: String,
    pub condition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalPayload {
    pub name: String,
    pub source: String,
    pub units: String,
    #[serde(rename = "valueType")]
    pub value_type: String,
    pub value: Json,
    pub timestamp: String,
    pub producer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub name: String,
    pub source: String,
    pub producer: String,
    #[serde(rename = "durationNs")]
    pub duration_ns: i64,
    pub metadata: String,
}

impl CloudEvent {
    pub fn for_signal(
        trigger: &Trigger,
        asset_did: &AssetDid,
        now: DateTime<Utc>,
        signal: SignalPayload,
    ) -> Self {
        Self::new(trigger, asset_did, now, Some(signal), None)
    }

    pub fn for_event(
        trigger: &Trigger,
        asset_did: &AssetDid,
        now: DateTime<Utc>,
        event: EventPayload,
    ) -> Self {
        Self::new(trigger, asset_did, now, None, Some(event))
    }

    fn new(
        trigger: &Trigger,
        asset_did: &AssetDid,
        now: DateTime<Utc>,
        signal: Option<SignalPayload>,
        event: Option<EventPayload>,
    ) -> Self {
        let (service_str, dataversion) = match trigger.service {
            | Service::Signals => ("telemetry.signals", "telemetry.signals/v1.0"),
            | Service::Events => ("telemetry.events", "telemetry.events/v1.0"),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: "vehicle-triggers-api",
            subject: asset_did.to_string(),
            time: lib::timeutil::to_rfc3339(&now),
            datacontenttype: "application/json",
            dataversion: dataversion.to_string(),
            event_type: "dimo.trigger",
            specversion: "1.0",
            data: CloudEventData {
                service: service_str,
                metric_name: trigger.metric_name.clone(),
                webhook_id: trigger.id.to_string(),
                webhook_name: trigger.display_name.clone(),
                asset_did: asset_did.to_string(),
                condition: trigger.condition.clone(),
                signal,
                event,
            },
        }
    }
}
