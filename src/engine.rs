use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::client::{DeviceClient, HttpTransport, Transport};
use crate::error::ErrorKind;
use crate::protocol::base_url;
use crate::translate::{command_setpoint, from_raw, quantize_fan_percent, to_request};
use crate::types::{AbstractState, Change, Command, DeviceIdentity, Field};
use crate::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;

/// Emitted by the engine; the accessory layer is the only consumer that logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Changed(Change),
    PollFailed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Status was read and merged. Holds only the fields that actually moved.
    Updated(Vec<Change>),
    /// Another poll for this device was still waiting on the network.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Active,
}

struct Session {
    phase: SessionState,
    state: AbstractState,
    in_flight: HashMap<Field, usize>,
    /// Commands ever written per field. Bumped on the optimistic write.
    writes: HashMap<Field, u64>,
}

impl Session {
    /// Fields a poll must not overwrite: a command is still on the wire, or
    /// one was written after the poll's request went out.
    fn held_fields(&self, since: &HashMap<Field, u64>) -> Vec<Field> {
        let pending = self
            .in_flight
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(f, _)| *f);
        let newer = self
            .writes
            .iter()
            .filter(|(f, n)| since.get(*f) != Some(*n))
            .map(|(f, _)| *f);
        let mut held: Vec<Field> = pending.chain(newer).collect();
        held.sort_by_key(|f| *f as u8);
        held.dedup();
        held
    }
}

struct Inner<T: Transport> {
    identity: DeviceIdentity,
    base: String,
    client: Arc<DeviceClient<T>>,
    poll_interval: Duration,
    session: Mutex<Session>,
    polling: AtomicBool,
    event_callbacks: Vec<EventCallback>,
}

pub struct SyncEngineBuilder<T: Transport = HttpTransport> {
    identity: DeviceIdentity,
    client: Arc<DeviceClient<T>>,
    poll_interval: Duration,
    event_callbacks: Vec<EventCallback>,
}

impl<T: Transport> SyncEngineBuilder<T> {
    pub fn new(identity: DeviceIdentity, client: Arc<DeviceClient<T>>) -> Self {
        Self {
            identity,
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_callbacks: Vec::new(),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> SyncEngine<T> {
        let base = base_url(&self.identity.address);
        SyncEngine {
            inner: Arc::new(Inner {
                identity: self.identity,
                base,
                client: self.client,
                poll_interval: self.poll_interval,
                session: Mutex::new(Session {
                    phase: SessionState::Initializing,
                    state: AbstractState::default(),
                    in_flight: HashMap::new(),
                    writes: HashMap::new(),
                }),
                polling: AtomicBool::new(false),
                event_callbacks: self.event_callbacks,
            }),
        }
    }
}

/// Keeps the abstract state of one unit in step with the hardware.
///
/// Commands are written to the local state before they reach the network and
/// are never rolled back; the next successful poll is authoritative. Fields
/// with a command still on the wire are left alone by reconciliation.
pub struct SyncEngine<T: Transport = HttpTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SyncEngine<T> {
    pub fn builder(identity: DeviceIdentity, client: Arc<DeviceClient<T>>) -> SyncEngineBuilder<T> {
        SyncEngineBuilder::new(identity, client)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn state(&self) -> AbstractState {
        self.inner.session.lock().state
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session.lock().phase
    }

    /// Pushes the current state in full, then polls on the configured period
    /// until the returned handle is stopped or dropped.
    pub fn start(&self) -> PollHandle {
        let snapshot = {
            let mut session = self.inner.session.lock();
            session.phase = SessionState::Active;
            session.state.snapshot()
        };
        for change in snapshot {
            self.emit(&Event::Changed(change));
        }

        let engine = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                // failures are reported through Event::PollFailed
                let _ = engine.poll().await;
            }
        });
        PollHandle { task }
    }

    /// Reads the unit's status once and reconciles it into the local state.
    ///
    /// At most one poll per device is on the wire; a call made while another
    /// is pending returns [`PollOutcome::Skipped`] without touching the network.
    pub async fn poll(&self) -> Result<PollOutcome> {
        if self.inner.polling.swap(true, Ordering::AcqRel) {
            trace!(device = %self.inner.identity.display_name, "poll already in flight, skipping");
            return Ok(PollOutcome::Skipped);
        }
        let _guard = PollGuard(&self.inner.polling);
        let writes_before = self.inner.session.lock().writes.clone();

        let raw = match self.inner.client.fetch_status(&self.inner.base).await {
            Ok(raw) => raw,
            Err(e) => {
                self.emit(&Event::PollFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let patch = from_raw(&raw);
        let changes = {
            let mut session = self.inner.session.lock();
            let hold = session.held_fields(&writes_before);
            session.state.merge(&patch, &hold)
        };
        for change in &changes {
            self.emit(&Event::Changed(*change));
        }
        Ok(PollOutcome::Updated(changes))
    }

    /// Applies a command locally, then sends it to the unit.
    ///
    /// Validation failures leave everything untouched. Network failures are
    /// returned, but the optimistic write stays in place.
    pub async fn apply_command(&self, command: Command) -> Result<()> {
        validate(&command)?;

        let (changes, fields) = {
            let mut session = self.inner.session.lock();
            let writes = optimistic_writes(&session.state, &command);
            let fields: Vec<Field> = writes.iter().map(Change::field).collect();
            for field in &fields {
                *session.in_flight.entry(*field).or_insert(0) += 1;
                *session.writes.entry(*field).or_insert(0) += 1;
            }
            let changes: Vec<Change> = writes
                .into_iter()
                .filter_map(|c| session.state.apply(c))
                .collect();
            (changes, fields)
        };
        let _in_flight = InFlight {
            session: &self.inner.session,
            fields,
        };

        for change in &changes {
            self.emit(&Event::Changed(*change));
        }

        let request = to_request(&command);
        self.inner.client.send_command(&self.inner.base, &request).await
    }

    fn emit(&self, event: &Event) {
        for cb in &self.inner.event_callbacks {
            cb(event);
        }
    }
}

fn validate(command: &Command) -> Result<()> {
    match *command {
        Command::SetFanPercent(p) if p > 100 => Err(Error::OutOfRange {
            field: Field::FanPercent,
            value: f64::from(p),
        }),
        Command::SetCoolingThreshold(t) | Command::SetHeatingThreshold(t) if !t.is_finite() => {
            Err(Error::OutOfRange {
                field: command.field(),
                value: t,
            })
        }
        _ => Ok(()),
    }
}

/// Every field a command writes locally, including coupled fields.
fn optimistic_writes(state: &AbstractState, command: &Command) -> Vec<Change> {
    match *command {
        Command::SetActive(on) => vec![Change::Active(on)],
        Command::SetTargetMode(mode) => vec![Change::TargetMode(mode)],
        Command::SetFanPercent(0) => vec![Change::Active(false), Change::FanPercent(0)],
        Command::SetFanPercent(p) if !state.active => {
            vec![Change::FanPercent(quantize_fan_percent(p)), Change::Active(true)]
        }
        Command::SetFanPercent(p) => vec![Change::FanPercent(quantize_fan_percent(p))],
        Command::SetSwing(on) => vec![Change::Swing(on)],
        // single setpoint on the unit: both thresholds always move together
        Command::SetCoolingThreshold(t) => {
            let t = command_setpoint(t);
            vec![Change::CoolingThreshold(t), Change::HeatingThreshold(t)]
        }
        Command::SetHeatingThreshold(t) => {
            let t = command_setpoint(t);
            vec![Change::HeatingThreshold(t), Change::CoolingThreshold(t)]
        }
    }
}

struct PollGuard<'a>(&'a AtomicBool);

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct InFlight<'a> {
    session: &'a Mutex<Session>,
    fields: Vec<Field>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        for field in &self.fields {
            if let Some(n) = session.in_flight.get_mut(field) {
                *n = n.saturating_sub(1);
            }
        }
    }
}

/// Running poll loop. Dropping it stops future ticks as well.
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
