use powrmatic_bridge::{
    AccessoryAdapter, Characteristic, DeviceClient, DeviceIdentity, MessageLogMode, Platform,
    SyncEngine,
};
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;

struct Console;

impl Platform for Console {
    fn update_characteristic(&self, characteristic: Characteristic, value: Value) {
        println!("{:<28} {value}", characteristic.name());
    }
}

#[tokio::main]
async fn main() -> powrmatic_bridge::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let ip = args
        .get(1)
        .expect("usage: monitor <ip> [name] [--log <path>]");
    let name = args
        .get(2)
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "Air Conditioner".to_string());
    let log_path = args
        .iter()
        .position(|a| a == "--log")
        .and_then(|i| args.get(i + 1));

    let mut builder = DeviceClient::builder();
    if let Some(path) = log_path {
        builder = builder.message_log(MessageLogMode::Diffed, path);
    }
    let client = Arc::new(builder.build()?);

    let engine = SyncEngine::builder(DeviceIdentity::new(ip.as_str(), name), client)
        .poll_interval(Duration::from_secs(5));
    let adapter = AccessoryAdapter::bind(engine, Arc::new(Console));

    let info = adapter.information();
    println!("{} {} ({}) at {ip}", info.manufacturer, info.model, info.name);
    let _poller = adapter.start();

    std::future::pending::<()>().await;
    Ok(())
}
