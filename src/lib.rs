mod accessory;
mod client;
mod config;
mod diff;
mod engine;
mod error;
mod logger;
mod platform;
pub mod protocol;
pub mod translate;
mod types;

pub use accessory::{
    AccessoryAdapter, AccessoryInformation, Characteristic, MANUFACTURER, MODEL, Platform, Props,
    SERIAL_NUMBER, decode, encode,
};
pub use client::{
    DEFAULT_TIMEOUT, DeviceClient, DeviceClientBuilder, HttpResponse, HttpTransport, Transport,
};
pub use config::{BridgeConfig, DeviceConfig};
pub use engine::{
    DEFAULT_POLL_INTERVAL, Event, PollHandle, PollOutcome, SessionState, SyncEngine,
    SyncEngineBuilder,
};
pub use error::{Error, ErrorKind, Result};
pub use logger::MessageLogMode;
pub use platform::{AccessoryCache, Bridge, Registration, accessory_uuid, register_devices};
pub use types::*;
