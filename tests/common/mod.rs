#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use powrmatic_bridge::{
    DeviceClient, DeviceClientBuilder, DeviceIdentity, Error, HttpResponse, Result, Transport,
};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// In-memory unit. Status and command replies are scripted; GETs and POSTs
/// can be held until released to simulate a slow device.
pub struct FakeDevice {
    status: Mutex<Option<Value>>,
    commands_ok: AtomicBool,
    gets: AtomicUsize,
    posts: Mutex<Vec<(String, Value)>>,
    hold_gets: AtomicBool,
    hold_posts: AtomicBool,
    release_get: Notify,
    release_post: Notify,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            status: Mutex::new(None),
            commands_ok: AtomicBool::new(true),
            gets: AtomicUsize::new(0),
            posts: Mutex::new(Vec::new()),
            hold_gets: AtomicBool::new(false),
            hold_posts: AtomicBool::new(false),
            release_get: Notify::new(),
            release_post: Notify::new(),
        }
    }
}

impl FakeDevice {
    /// Subsequent polls return this RESULT block.
    pub fn set_status(&self, ps: u8, wm: u8, fs: u8, fr: u8, sp: i64, t: i64) {
        *self.status.lock().unwrap() = Some(json!({
            "success": true,
            "RESULT": {"ps": ps, "wm": wm, "fs": fs, "fr": fr, "sp": sp, "t": t}
        }));
    }

    /// Subsequent polls fail as if the unit were unreachable.
    pub fn go_offline(&self) {
        *self.status.lock().unwrap() = None;
        self.commands_ok.store(false, Ordering::SeqCst);
    }

    pub fn reject_commands(&self) {
        self.commands_ok.store(false, Ordering::SeqCst);
    }

    pub fn hold_gets(&self) {
        self.hold_gets.store(true, Ordering::SeqCst);
    }

    pub fn hold_posts(&self) {
        self.hold_posts.store(true, Ordering::SeqCst);
    }

    pub fn release_gets(&self) {
        self.hold_gets.store(false, Ordering::SeqCst);
        self.release_get.notify_one();
    }

    pub fn release_posts(&self) {
        self.hold_posts.store(false, Ordering::SeqCst);
        self.release_post.notify_one();
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

pub struct FakeTransport(pub Arc<FakeDevice>);

impl Transport for FakeTransport {
    fn get(&self, _url: &str) -> impl Future<Output = Result<HttpResponse>> + Send {
        let device = Arc::clone(&self.0);
        async move {
            device.gets.fetch_add(1, Ordering::SeqCst);
            if device.hold_gets.load(Ordering::SeqCst) {
                device.release_get.notified().await;
            }
            let body = device.status.lock().unwrap().clone();
            match body {
                Some(body) => Ok(HttpResponse::ok(body.to_string())),
                None => Err(Error::Timeout),
            }
        }
    }

    fn post(&self, url: &str, body: &Value) -> impl Future<Output = Result<HttpResponse>> + Send {
        let device = Arc::clone(&self.0);
        let entry = (url.to_string(), body.clone());
        async move {
            device.posts.lock().unwrap().push(entry);
            if device.hold_posts.load(Ordering::SeqCst) {
                device.release_post.notified().await;
            }
            if device.commands_ok.load(Ordering::SeqCst) {
                Ok(HttpResponse::ok(r#"{"success": true}"#))
            } else {
                Err(Error::Timeout)
            }
        }
    }
}

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::new("10.0.0.5", "Lounge")
}

pub fn fake_client() -> (Arc<FakeDevice>, Arc<DeviceClient<FakeTransport>>) {
    fake_client_with_timeout(powrmatic_bridge::DEFAULT_TIMEOUT)
}

pub fn fake_client_with_timeout(
    timeout: Duration,
) -> (Arc<FakeDevice>, Arc<DeviceClient<FakeTransport>>) {
    let device = Arc::new(FakeDevice::default());
    let client = DeviceClientBuilder::new()
        .timeout(timeout)
        .build_with(FakeTransport(Arc::clone(&device)))
        .unwrap();
    (device, Arc::new(client))
}

/// Yields to spawned tasks until `cond` holds.
pub async fn until(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Endpoint part of a recorded POST url.
pub fn endpoint(url: &str) -> &str {
    url.split("/api/v/1/").nth(1).unwrap_or(url)
}
