use std::time::{Duration, Instant};

use lib::types::Trigger;
use metrics::counter;
use thiserror::Error;
use tracing::debug;

use crate::cloud_event::CloudEvent;

const RESPONSE_BODY_CAPTURE_LIMIT: usize = 1024;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// The sentinel the ingestion pipeline matches on to decide whether a
/// delivery feeds the failure counter. Every non-2xx outcome — transport
/// error, malformed URL, or a response status >= 400 — is classified the
/// same way; there is no retry.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("webhook delivery failed: {0}")]
    WebhookFailure(String),
}

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub status: u16,
    pub latency: Duration,
}

/// Component E. HTTPS POST with a short timeout and no retries; never
/// follows redirects, matching the teacher's webhook action.
#[derive(Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
}

impl Default for WebhookSender {
    fn default() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self { client }
    }
}

impl WebhookSender {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(self, payload), fields(trigger_id = %trigger.id, target = %trigger.target_uri))]
    pub async fn send(
        &self,
        trigger: &Trigger,
        payload: &CloudEvent,
    ) -> Result<DeliveryOutcome, SendError> {
        counter!("webhook.attempts_total", 1);

        let start = Instant::now();
        let response = self
            .client
            .post(&trigger.target_uri)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::USER_AGENT, "DIMO-Webhook/1.0")
            .timeout(WEBHOOK_TIMEOUT)
            .json(payload)
            .send()
            .await;
        let latency = start.elapsed();

        match response {
            | Ok(resp) => {
                let status = resp.status();
                if status.as_u16() >= 400 {
                    let body = resp.text().await.unwrap_or_default();
                    let snippet: String =
                        body.chars().take(RESPONSE_BODY_CAPTURE_LIMIT).collect();
                    counter!("webhook.failures_total", 1);
                    debug!(status = status.as_u16(), body = %snippet, "webhook responded with failure status");
                    Err(SendError::WebhookFailure(format!(
                        "target responded with status {}: {snippet}",
                        status.as_u16()
                    )))
                } else {
                    Ok(DeliveryOutcome {
                        status: status.as_u16(),
                        latency,
                    })
                }
            }
            | Err(e) => {
                counter!("webhook.failures_total", 1);
                let message = if e.is_connect() {
                    "connection failed"
                } else if e.is_timeout() {
                    "request timed out"
                } else {
                    "request failed"
                };
                debug!("webhook delivery failed: {message}: {e}");
                Err(SendError::WebhookFailure(message.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use lib::types::{DevLicense, Service, Status};

    use super::*;
    use crate::cloud_event::{CloudEvent, SignalPayload};

    fn sample_trigger(target_uri: &str) -> Trigger {
        Trigger {
            id: lib::types::TriggerId::generate(),
            display_name: "speed-over-80".into(),
            owner_dev_license: DevLicense::new("0x1111111111111111111111111111111111111111"),
            service: Service::Signals,
            metric_name: "speed".into(),
            condition: "valueNumber > 80".into(),
            target_uri: target_uri.to_string(),
            cooldown_seconds: 0,
            status: Status::Enabled,
            description: None,
            failure_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn malformed_target_uri_is_classified_as_webhook_failure() {
        let sender = WebhookSender::new();
        let trigger = sample_trigger("not a url");
        let asset = lib::types::AssetDid::new(
            137,
            "0xdeadbeef00000000000000000000000000000000",
            1,
        );
        let payload = CloudEvent::for_signal(
            &trigger,
            &asset,
            Utc::now(),
            SignalPayload {
                name: "speed".into(),
                source: "vehicle".into(),
                units: "km/h".into(),
                value_type: "number".into(),
                value: serde_json::json!(90.0),
                timestamp: lib::timeutil::to_rfc3339(&Utc::now()),
                producer: "dimo/integration".into(),
            },
        );
        let err = sender.send(&trigger, &payload).await.unwrap_err();
        assert!(matches!(err, SendError::WebhookFailure(_)));
    }
}
