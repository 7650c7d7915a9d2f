//! Request/response DTOs the control plane exposes to the (out-of-scope)
//! HTTP layer, validated the way the teacher validates its trigger
//! upsert bodies before they ever reach the store.

use chrono::{DateTime, Utc};
use lib::types::{AssetDid, Service, Status, Trigger, TriggerId, VehicleSubscription};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn validate_target_uri(url: &str) -> Result<(), ValidationError> {
    lib::validation::validate_webhook_url(url).map_err(Into::into)
}

fn validate_user_status(status: &Status) -> Result<(), ValidationError> {
    match status {
        | Status::Enabled | Status::Disabled => Ok(()),
        | Status::Failed | Status::Deleted => Err(lib::validation::validation_error(
            "STATUS_NOT_USER_SETTABLE",
            "status must be one of enabled, disabled".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterTriggerRequest {
    #[validate(length(min = 1, message = "displayName must not be empty"))]
    pub display_name: String,
    pub service: Service,
    #[validate(length(min = 1, message = "metricName must not be empty"))]
    pub metric_name: String,
    #[validate(length(min = 1, message = "condition must not be empty"))]
    pub condition: String,
    #[validate(custom = "validate_target_uri")]
    pub target_uri: String,
    #[validate(range(min = 0, message = "cooldownSeconds must be >= 0"))]
    pub cooldown_seconds: i64,
    pub description: Option<String>,
    /// Echoed back by the target during the URL verification handshake.
    pub verification_token: String,
}

/// All fields optional; only the ones present are applied. Per spec,
/// applying any patch resets `failureCount` to 0.
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct UpdateTriggerRequest {
    #[validate(length(min = 1, message = "displayName must not be empty"))]
    pub display_name: Option<String>,
    #[validate(length(min = 1, message = "metricName must not be empty"))]
    pub metric_name: Option<String>,
    #[validate(length(min = 1, message = "condition must not be empty"))]
    pub condition: Option<String>,
    #[validate(custom = "validate_target_uri")]
    pub target_uri: Option<String>,
    #[validate(range(min = 0, message = "cooldownSeconds must be >= 0"))]
    pub cooldown_seconds: Option<i64>,
    pub description: Option<String>,
    #[validate(custom = "validate_user_status")]
    pub status: Option<Status>,
    /// Required only when `target_uri` is set, since a target change
    /// re-runs the verification handshake.
    pub verification_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerView {
    pub id: TriggerId,
    pub display_name: String,
    pub service: Service,
    pub metric_name: String,
    pub condition: String,
    pub target_uri: String,
    pub cooldown_seconds: i64,
    pub status: Status,
    pub description: Option<String>,
    pub failure_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Trigger> for TriggerView {
    fn from(t: Trigger) -> Self {
        Self {
            id: t.id,
            display_name: t.display_name,
            service: t.service,
            metric_name: t.metric_name,
            condition: t.condition,
            target_uri: t.target_uri,
            cooldown_seconds: t.cooldown_seconds,
            status: t.status,
            description: t.description,
            failure_count: t.failure_count,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterTriggerResponse {
    pub id: TriggerId,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionFailure {
    pub asset_did: AssetDid,
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SubscribeManyResult {
    pub failures: Vec<SubscriptionFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub trigger_id: TriggerId,
    pub asset_did: AssetDid,
    pub created_at: DateTime<Utc>,
}

impl From<VehicleSubscription> for SubscriptionView {
    fn from(s: VehicleSubscription) -> Self {
        Self { trigger_id: s.trigger_id, asset_did: s.asset_did, created_at: s.created_at }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalDefinitionView {
    pub name: &'static str,
    pub unit: &'static str,
    pub value_type: &'static str,
}

impl From<lib::signal_catalog::SignalDefinition> for SignalDefinitionView {
    fn from(d: lib::signal_catalog::SignalDefinition) -> Self {
        Self { name: d.name, unit: d.unit, value_type: d.value_type.as_str() }
    }
}
