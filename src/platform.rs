//! Registration of configured units with the host's accessory cache.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::accessory::{AccessoryAdapter, Platform};
use crate::client::{DeviceClient, HttpTransport, Transport};
use crate::config::BridgeConfig;
use crate::engine::{PollHandle, SyncEngine};
use crate::types::DeviceIdentity;
use crate::Result;

const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_52a4_3b8e_4c1a_9d27_5e0c_b4a8_f311);

/// Stable accessory id for a unit, derived from its address only.
pub fn accessory_uuid(address: &str) -> Uuid {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, address.as_bytes())
}

/// The host's store of previously published accessories.
pub trait AccessoryCache {
    fn contains(&self, uuid: &Uuid) -> bool;

    fn register(&mut self, uuid: Uuid, identity: &DeviceIdentity);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub identity: DeviceIdentity,
    pub uuid: Uuid,
    /// `true` when the host already knew the accessory.
    pub restored: bool,
}

/// Restores cached accessories and registers new ones for every usable
/// device in `config`.
pub fn register_devices<C: AccessoryCache>(config: &BridgeConfig, cache: &mut C) -> Vec<Registration> {
    config
        .identities()
        .into_iter()
        .map(|identity| {
            let uuid = accessory_uuid(&identity.address);
            debug!(device = %identity.display_name, address = %identity.address, %uuid, "derived accessory id");
            let restored = cache.contains(&uuid);
            if restored {
                info!(device = %identity.display_name, "restoring existing accessory from cache");
            } else {
                info!(device = %identity.display_name, "adding new accessory");
                cache.register(uuid, &identity);
            }
            Registration {
                identity,
                uuid,
                restored,
            }
        })
        .collect()
}

struct Running<P: Platform, T: Transport> {
    registration: Registration,
    adapter: AccessoryAdapter<P, T>,
    _poller: PollHandle,
}

/// All device sessions of one bridge. Dropping it stops every poll loop.
pub struct Bridge<P: Platform, T: Transport = HttpTransport> {
    client: Arc<DeviceClient<T>>,
    sessions: Vec<Running<P, T>>,
}

impl<P: Platform> Bridge<P, HttpTransport> {
    /// Builds the shared HTTP client from `config` (request timeout) and
    /// launches every configured device on it.
    pub fn from_config<C: AccessoryCache>(
        config: &BridgeConfig,
        cache: &mut C,
        service_for: impl FnMut(&Registration) -> Arc<P>,
    ) -> Result<Self> {
        let client = DeviceClient::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::launch(config, cache, Arc::new(client), service_for))
    }
}

impl<P: Platform, T: Transport> Bridge<P, T> {
    /// Registers every configured device and starts its session.
    /// `service_for` supplies the host service handle of each accessory.
    pub fn launch<C: AccessoryCache>(
        config: &BridgeConfig,
        cache: &mut C,
        client: Arc<DeviceClient<T>>,
        mut service_for: impl FnMut(&Registration) -> Arc<P>,
    ) -> Self {
        let sessions = register_devices(config, cache)
            .into_iter()
            .map(|registration| {
                let builder = SyncEngine::builder(registration.identity.clone(), Arc::clone(&client))
                    .poll_interval(config.poll_interval());
                let adapter = AccessoryAdapter::bind(builder, service_for(&registration));
                let poller = adapter.start();
                Running {
                    registration,
                    adapter,
                    _poller: poller,
                }
            })
            .collect();
        Self { client, sessions }
    }

    pub fn client(&self) -> &Arc<DeviceClient<T>> {
        &self.client
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.sessions.iter().map(|s| &s.registration)
    }

    pub fn adapter(&self, uuid: &Uuid) -> Option<&AccessoryAdapter<P, T>> {
        self.sessions
            .iter()
            .find(|s| s.registration.uuid == *uuid)
            .map(|s| &s.adapter)
    }
}
