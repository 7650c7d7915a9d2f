//! End-to-end exercises of the per-record delivery algorithm (Component D)
//! against an in-memory sqlite trigger store and a mock webhook target.
//! These mirror the literal scenarios from the system's testable
//! properties: threshold crossing, geo-fence, event delivery, permission
//! revocation, and circuit-breaker tripping. Ownership isolation is
//! exercised at the store layer instead, where it belongs.

use condition::{CompiledCondition, EventReading, SignalReading};
use dispatch::sender::WebhookSender;
use ingest::{deliver_event, deliver_signal};
use lib::access::StaticAccessClient;
use lib::database::trigger_store::{NewTrigger, SqlTriggerStore, TriggerStore};
use lib::database::Database;
use lib::types::{AssetDid, DevLicense, Service};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn store() -> SqlTriggerStore {
    SqlTriggerStore::new(Database::in_memory().await.unwrap())
}

fn raw_signal(token_id: u64, name: &str, value_number: f64) -> String {
    format!(
        r#"{{"tokenId":{token_id},"timestamp":"2024-01-01T00:00:00Z","name":"{name}","valueNumber":{value_number}}}"#
    )
}

fn raw_location_signal(token_id: u64, lat: f64, lon: f64, hdop: f64) -> String {
    format!(
        r#"{{"tokenId":{token_id},"timestamp":"2024-01-01T00:00:00Z","name":"currentLocation","valueLocation":{{"Latitude":{lat},"Longitude":{lon},"HDOP":{hdop}}}}}"#
    )
}

fn raw_event(subject: &str, duration_ns: i64) -> String {
    format!(
        r#"{{"subject":"{subject}","timestamp":"2024-01-01T00:00:00Z","name":"HarshBraking","durationNs":{duration_ns},"metadata":"{{}}"}}"#
    )
}

#[tokio::test]
async fn threshold_crossing_fires_once_per_distinct_value() {
    let store = store().await;
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200))
        .mount(&server).await;

    let trigger = store
        .create_trigger(NewTrigger {
            display_name: "speed-over-20".into(),
            owner_dev_license: DevLicense::new("0x1111111111111111111111111111111111111111"),
            service: Service::Signals,
            metric_name: "speed".into(),
            condition: "valueNumber > 20.0 && valueNumber != previousValue".into(),
            target_uri: format!("{}/hook", server.uri()),
            cooldown_seconds: 0,
            description: None,
        })
        .await
        .unwrap();
    let asset = AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 12345);
    store.create_subscription(&trigger.id, &asset).await.unwrap();

    let compiled = CompiledCondition::compile_signal(&trigger.condition).unwrap();
    let access = StaticAccessClient::allow();
    let sender = WebhookSender::new();

    deliver_signal(
        &store, &access, &sender, None, &trigger, &compiled, &asset,
        &SignalReading::number(25.0), &raw_signal(12345, "speed", 25.0), 5,
    ).await;
    deliver_signal(
        &store, &access, &sender, None, &trigger, &compiled, &asset,
        &SignalReading::number(25.0), &raw_signal(12345, "speed", 25.0), 5,
    ).await;
    deliver_signal(
        &store, &access, &sender, None, &trigger, &compiled, &asset,
        &SignalReading::number(24.0), &raw_signal(12345, "speed", 24.0), 5,
    ).await;

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    let last_log = store.get_last_log(&trigger.id, &asset).await.unwrap().unwrap();
    assert!(last_log.snapshot_data.contains("24"));
}

#[tokio::test]
async fn geofence_only_fires_inside_the_radius() {
    let store = store().await;
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200))
        .mount(&server).await;

    let trigger = store
        .create_trigger(NewTrigger {
            display_name: "geofence".into(),
            owner_dev_license: DevLicense::new("0x1111111111111111111111111111111111111111"),
            service: Service::Signals,
            metric_name: "currentLocation".into(),
            condition: "geoDistance(value.Latitude, value.Longitude, 54.7106132, 25.239926) < 0.7138406571965812".into(),
            target_uri: format!("{}/hook", server.uri()),
            cooldown_seconds: 0,
            description: None,
        })
        .await
        .unwrap();
    let asset = AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 1);
    store.create_subscription(&trigger.id, &asset).await.unwrap();

    let compiled = CompiledCondition::compile_signal(&trigger.condition).unwrap();
    let access = StaticAccessClient::allow();
    let sender = WebhookSender::new();

    deliver_signal(
        &store, &access, &sender, None, &trigger, &compiled, &asset,
        &SignalReading::location(condition::Location { latitude: 54.7106132, longitude: 25.239926, hdop: 1.0 }),
        &raw_location_signal(1, 54.7106132, 25.239926, 1.0), 5,
    ).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let far_asset = AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 2);
    store.create_subscription(&trigger.id, &far_asset).await.unwrap();
    deliver_signal(
        &store, &access, &sender, None, &trigger, &compiled, &far_asset,
        &SignalReading::location(condition::Location { latitude: 55.0, longitude: 26.0, hdop: 1.0 }),
        &raw_location_signal(2, 55.0, 26.0, 1.0), 5,
    ).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn event_record_fires_and_carries_duration() {
    let store = store().await;
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200))
        .mount(&server).await;

    let trigger = store
        .create_trigger(NewTrigger {
            display_name: "harsh-braking".into(),
            owner_dev_license: DevLicense::new("0x1111111111111111111111111111111111111111"),
            service: Service::Events,
            metric_name: "HarshBraking".into(),
            condition: "true".into(),
            target_uri: format!("{}/hook", server.uri()),
            cooldown_seconds: 0,
            description: None,
        })
        .await
        .unwrap();
    let asset = AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 1);
    store.create_subscription(&trigger.id, &asset).await.unwrap();

    let compiled = CompiledCondition::compile_event(&trigger.condition).unwrap();
    let access = StaticAccessClient::allow();
    let sender = WebhookSender::new();
    let reading = EventReading {
        name: "HarshBraking".into(),
        duration_ns: 1_000_000_000,
        ..Default::default()
    };

    deliver_event(
        &store, &access, &sender, None, &trigger, &compiled, &asset, &reading,
        &raw_event(&asset.to_string(), 1_000_000_000), 5,
    ).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["data"]["event"]["durationNs"], 1_000_000_000);
}

#[tokio::test]
async fn permission_revocation_auto_unsubscribes_without_firing() {
    let store = store().await;
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200))
        .mount(&server).await;

    let trigger = store
        .create_trigger(NewTrigger {
            display_name: "speed-over-20".into(),
            owner_dev_license: DevLicense::new("0x1111111111111111111111111111111111111111"),
            service: Service::Signals,
            metric_name: "speed".into(),
            condition: "valueNumber > 20.0".into(),
            target_uri: format!("{}/hook", server.uri()),
            cooldown_seconds: 0,
            description: None,
        })
        .await
        .unwrap();
    let asset = AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 1);
    store.create_subscription(&trigger.id, &asset).await.unwrap();

    let compiled = CompiledCondition::compile_signal(&trigger.condition).unwrap();
    let access = StaticAccessClient::deny();
    let sender = WebhookSender::new();

    deliver_signal(
        &store, &access, &sender, None, &trigger, &compiled, &asset,
        &SignalReading::number(25.0), &raw_signal(1, "speed", 25.0), 5,
    ).await;

    assert!(server.received_requests().await.unwrap().is_empty());
    let subs = store.get_subscriptions_by_trigger(&trigger.id).await.unwrap();
    assert!(subs.is_empty());
}

#[tokio::test]
async fn circuit_trips_after_max_failures_and_recovers_on_update() {
    let store = store().await;
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(500))
        .mount(&server).await;

    let mut trigger = store
        .create_trigger(NewTrigger {
            display_name: "always-fails".into(),
            owner_dev_license: DevLicense::new("0x1111111111111111111111111111111111111111"),
            service: Service::Signals,
            metric_name: "speed".into(),
            condition: "valueNumber > 10.0".into(),
            target_uri: format!("{}/hook", server.uri()),
            cooldown_seconds: 0,
            description: None,
        })
        .await
        .unwrap();
    let asset = AssetDid::new(137, "0xba5738a18d83d41847dffbdc6101d37c69c9b0cf", 1);
    store.create_subscription(&trigger.id, &asset).await.unwrap();

    let compiled = CompiledCondition::compile_signal(&trigger.condition).unwrap();
    let access = StaticAccessClient::allow();
    let sender = WebhookSender::new();
    const MAX_FAILURES: i32 = 5;

    for _ in 0..MAX_FAILURES {
        deliver_signal(
            &store, &access, &sender, None, &trigger, &compiled, &asset,
            &SignalReading::number(25.0), &raw_signal(1, "speed", 25.0), MAX_FAILURES,
        ).await;
        trigger = store.get_trigger_by_id(&trigger.id).await.unwrap();
    }
    assert_eq!(trigger.status, lib::types::Status::Failed);
    assert_eq!(server.received_requests().await.unwrap().len(), MAX_FAILURES as usize);

    // A sixth matching record produces no further delivery attempt.
    deliver_signal(
        &store, &access, &sender, None, &trigger, &compiled, &asset,
        &SignalReading::number(25.0), &raw_signal(1, "speed", 25.0), MAX_FAILURES,
    ).await;
    assert_eq!(server.received_requests().await.unwrap().len(), MAX_FAILURES as usize);

    // An Update implicitly resets the circuit.
    store.reset_failure(&trigger.id).await.unwrap();
    let recovered = store.get_trigger_by_id(&trigger.id).await.unwrap();
    assert_eq!(recovered.status, lib::types::Status::Enabled);
    assert_eq!(recovered.failure_count, 0);
}
