mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use common::{endpoint, fake_client, identity};
use powrmatic_bridge::{
    AccessoryAdapter, AccessoryCache, Bridge, BridgeConfig, Characteristic, DeviceClient,
    DeviceIdentity, Error, ErrorKind, Platform, SyncEngine, accessory_uuid,
};
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingService {
    updates: Mutex<Vec<(Characteristic, Value)>>,
}

impl RecordingService {
    fn last(&self, characteristic: Characteristic) -> Option<Value> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(c, _)| *c == characteristic)
            .map(|(_, v)| v.clone())
    }

    fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl Platform for RecordingService {
    fn update_characteristic(&self, characteristic: Characteristic, value: Value) {
        self.updates.lock().unwrap().push((characteristic, value));
    }
}

#[tokio::test]
async fn poll_pushes_characteristics() {
    let (device, client) = fake_client();
    device.set_status(1, 1, 1, 0, 22, 25);
    let service = Arc::new(RecordingService::default());
    let adapter = AccessoryAdapter::bind(
        SyncEngine::builder(identity(), client),
        Arc::clone(&service),
    );

    adapter.engine().poll().await.unwrap();

    assert_eq!(service.last(Characteristic::Active), Some(json!(1)));
    assert_eq!(service.last(Characteristic::CurrentHeaterCoolerState), Some(json!(3)));
    assert_eq!(service.last(Characteristic::TargetHeaterCoolerState), Some(json!(2)));
    assert_eq!(service.last(Characteristic::CurrentTemperature), Some(json!(25.0)));
    assert_eq!(service.last(Characteristic::RotationSpeed), Some(json!(25)));
    assert_eq!(service.last(Characteristic::SwingMode), Some(json!(1)));
    // setpoint was already at the default 22, nothing to push
    assert_eq!(service.last(Characteristic::CoolingThresholdTemperature), None);
}

#[tokio::test]
async fn set_forwards_command_and_updates_coupled_threshold() {
    let (device, client) = fake_client();
    let service = Arc::new(RecordingService::default());
    let adapter = AccessoryAdapter::bind(
        SyncEngine::builder(identity(), client),
        Arc::clone(&service),
    );

    adapter
        .set(Characteristic::CoolingThresholdTemperature, &json!(20))
        .await
        .unwrap();

    assert_eq!(
        service.last(Characteristic::HeatingThresholdTemperature),
        Some(json!(20.0))
    );
    assert_eq!(endpoint(&device.posts()[0].0), "set/setpoint");
}

#[tokio::test]
async fn unsupported_target_mode_is_rejected_locally() {
    let (device, client) = fake_client();
    let service = Arc::new(RecordingService::default());
    let adapter = AccessoryAdapter::bind(
        SyncEngine::builder(identity(), client),
        Arc::clone(&service),
    );

    let err = adapter
        .set(Characteristic::TargetHeaterCoolerState, &json!(3))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedTargetMode(3)));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(device.posts().is_empty());
    assert_eq!(service.count(), 0);
}

#[tokio::test]
async fn information_uses_display_name() {
    let (_device, client) = fake_client();
    let adapter = AccessoryAdapter::bind(
        SyncEngine::builder(identity(), client),
        Arc::new(RecordingService::default()),
    );

    let info = adapter.information();
    assert_eq!(info.manufacturer, "Powrmatic");
    assert_eq!(info.model, "Default-Model");
    assert_eq!(info.serial_number, "Default-Serial");
    assert_eq!(info.name, "Lounge");
}

#[tokio::test]
async fn rotation_zero_over_http_powers_off() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v/1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "RESULT": {"ps": 1, "wm": 1, "fs": 2, "fr": 0, "sp": 22, "t": 25}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v/1/power/off"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let addr = server.address();
    let client = Arc::new(DeviceClient::builder().build().unwrap());
    let identity = DeviceIdentity::new(format!("{}:{}", addr.ip(), addr.port()), "Office");
    let service = Arc::new(RecordingService::default());
    let adapter = AccessoryAdapter::bind(SyncEngine::builder(identity, client), Arc::clone(&service));

    adapter.engine().poll().await.unwrap();
    assert!(adapter.engine().state().active);

    adapter.set(Characteristic::RotationSpeed, &json!(0)).await.unwrap();

    let state = adapter.engine().state();
    assert!(!state.active);
    assert_eq!(state.fan_percent, 0);
    assert_eq!(service.last(Characteristic::Active), Some(json!(0)));
}

#[derive(Default)]
struct MemoryCache(HashMap<Uuid, String>);

impl AccessoryCache for MemoryCache {
    fn contains(&self, uuid: &Uuid) -> bool {
        self.0.contains_key(uuid)
    }

    fn register(&mut self, uuid: Uuid, identity: &DeviceIdentity) {
        self.0.insert(uuid, identity.display_name.clone());
    }
}

#[tokio::test]
async fn bridge_launches_one_session_per_device() {
    let (_device, client) = fake_client();
    let config = BridgeConfig::from_json_str(
        r#"{"devices": [
            {"ipAddress": "10.0.0.5", "displayName": "Lounge"},
            {"ipAddress": "10.0.0.6", "displayName": "Bedroom"},
            {"displayName": "Broken"}
        ]}"#,
    )
    .unwrap();
    let mut cache = MemoryCache::default();
    cache.0.insert(accessory_uuid("10.0.0.6"), "Bedroom".into());

    let services: Arc<Mutex<Vec<Arc<RecordingService>>>> = Arc::default();
    let bridge = Bridge::launch(&config, &mut cache, client, |_| {
        let service = Arc::new(RecordingService::default());
        services.lock().unwrap().push(Arc::clone(&service));
        service
    });

    assert_eq!(bridge.len(), 2);
    let restored: Vec<bool> = bridge.registrations().map(|r| r.restored).collect();
    assert_eq!(restored, vec![false, true]);

    // start() pushed the default state to every accessory
    for service in services.lock().unwrap().iter() {
        assert!(service.count() >= 8);
    }

    let adapter = bridge.adapter(&accessory_uuid("10.0.0.5")).unwrap();
    assert_eq!(adapter.information().name, "Lounge");
}
