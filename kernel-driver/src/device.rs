//! myioctl counter device: registration, sessions and persistence hooks.
//!
//!  * The counter starts at zero when the device registers.
//!  * `DeviceLifetime` loads once at registration and saves once when the
//!    device goes away; `SessionLifetime` loads on every open and saves on
//!    every close.
//!  * A storage failure is reported as an event and never fails an open, a
//!    close or the deregistration.

use std::ffi::c_long;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use shared::IoctlCode;

use crate::chrdev::{CharDevRegistry, Major, MajorTable, Registration};
use crate::config::{DeviceConfig, PersistencePolicy};
use crate::dispatch::{ioctl_status, Dispatcher, IoctlArg};
use crate::error::{DriverError, DriverResult};
use crate::events::{DeviceEvent, EventSink, LogSink, SessionId, StorageOp};
use crate::state::SharedCounter;
use crate::store::{CounterStore, FileStore};
use crate::user_ptr::{UserAddr, UserMemory};

struct Persistence {
    policy: PersistencePolicy,
    store: Box<dyn CounterStore>,
}

/*──────────────────────────────── builder ───────────────────────────────*/

/// Collects the collaborators of a [`CounterDevice`] before registering it.
pub struct DeviceBuilder {
    name: String,
    persistence: Option<Persistence>,
    registry: Option<Arc<dyn CharDevRegistry>>,
    events: Option<Arc<dyn EventSink>>,
}

impl DeviceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), persistence: None, registry: None, events: None }
    }

    /// Name and file-backed persistence taken from `config`.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let builder = Self::new(config.name.clone());
        match &config.persistence {
            Some(p) => builder.persistence(p.policy, FileStore::new(&p.path)),
            None => builder,
        }
    }

    pub fn persistence(mut self, policy: PersistencePolicy, store: impl CounterStore + 'static) -> Self {
        self.persistence = Some(Persistence { policy, store: Box::new(store) });
        self
    }

    /// Defaults to a private [`MajorTable`].
    pub fn registry(mut self, registry: Arc<dyn CharDevRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Defaults to [`LogSink`].
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Registers the device and, under `DeviceLifetime`, loads the counter.
    pub fn register(self) -> DriverResult<CounterDevice> {
        let registry = self.registry.unwrap_or_else(|| Arc::new(MajorTable::new()));
        let events = self.events.unwrap_or_else(|| Arc::new(LogSink));
        let registration = Registration::new(registry, &self.name)?;

        let counter = Arc::new(SharedCounter::new());
        let device = CounterDevice {
            dispatcher: Dispatcher::new(counter.clone(), events.clone()),
            counter,
            persistence: self.persistence,
            events,
            next_session: AtomicU64::new(1),
            registration,
        };

        if let Some(store) = device.store_for(PersistencePolicy::DeviceLifetime) {
            device.load(store);
        }
        device.events.emit(&DeviceEvent::Registered {
            name: device.name().to_owned(),
            major: device.major(),
        });
        Ok(device)
    }
}

/*──────────────────────────────── device ────────────────────────────────*/

/// A registered counter device. Dropping it unregisters it.
pub struct CounterDevice {
    counter: Arc<SharedCounter>,
    dispatcher: Dispatcher,
    persistence: Option<Persistence>,
    events: Arc<dyn EventSink>,
    next_session: AtomicU64,
    // dropped last, after the final save
    registration: Registration,
}

impl CounterDevice {
    pub fn builder(name: impl Into<String>) -> DeviceBuilder {
        DeviceBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        self.registration.name()
    }

    pub fn major(&self) -> Major {
        self.registration.major()
    }

    pub fn policy(&self) -> Option<PersistencePolicy> {
        self.persistence.as_ref().map(|p| p.policy)
    }

    /// Opens a session for a caller whose memory is `memory`.
    ///
    /// Always succeeds; under `SessionLifetime` the counter is reloaded first
    /// and a failed load keeps the value already in memory.
    pub fn open(&self, memory: Arc<dyn UserMemory>) -> Session<'_> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.events.emit(&DeviceEvent::SessionOpened { session: id });
        if let Some(store) = self.store_for(PersistencePolicy::SessionLifetime) {
            self.load(store);
        }
        Session { device: self, id, memory }
    }

    /// Unregisters the device, saving the counter under `DeviceLifetime`.
    pub fn unregister(self) {}

    fn release(&self, session: SessionId) {
        if let Some(store) = self.store_for(PersistencePolicy::SessionLifetime) {
            self.save(store);
        }
        self.events.emit(&DeviceEvent::SessionClosed { session });
    }

    fn store_for(&self, policy: PersistencePolicy) -> Option<&dyn CounterStore> {
        self.persistence
            .as_ref()
            .filter(|p| p.policy == policy)
            .map(|p| p.store.as_ref())
    }

    fn load(&self, store: &dyn CounterStore) {
        let event = {
            let mut state = self.counter.lock();
            match store.load().map_err(DriverError::StorageUnavailable) {
                Ok(value) => {
                    state.value = value;
                    DeviceEvent::StateLoaded { value }
                }
                Err(err) => storage_unavailable(StorageOp::Load, store, err),
            }
        };
        self.events.emit(&event);
    }

    fn save(&self, store: &dyn CounterStore) {
        let event = {
            let state = self.counter.lock();
            match store.save(state.value).map_err(DriverError::StorageUnavailable) {
                Ok(()) => DeviceEvent::StateSaved { value: state.value },
                Err(err) => storage_unavailable(StorageOp::Save, store, err),
            }
        };
        self.events.emit(&event);
    }
}

fn storage_unavailable(op: StorageOp, store: &dyn CounterStore, err: DriverError) -> DeviceEvent {
    DeviceEvent::StorageUnavailable {
        op,
        location: store.location(),
        errno: err.errno(),
        reason: err.to_string(),
    }
}

impl Drop for CounterDevice {
    fn drop(&mut self) {
        if let Some(store) = self.store_for(PersistencePolicy::DeviceLifetime) {
            self.save(store);
        }
        self.events.emit(&DeviceEvent::Unregistered {
            name: self.name().to_owned(),
            major: self.major(),
        });
    }
}

/*──────────────────────────────── session ───────────────────────────────*/

/// An open file on the device. Closing it (or dropping it) runs the
/// `SessionLifetime` save.
pub struct Session<'a> {
    device: &'a CounterDevice,
    id: SessionId,
    memory: Arc<dyn UserMemory>,
}

impl Session<'_> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Runs one control command with `arg` pointing into the caller's memory.
    pub fn ioctl(&self, code: IoctlCode, arg: UserAddr) -> DriverResult {
        self.device.dispatcher.dispatch(code, IoctlArg::new(self.memory.as_ref(), arg))
    }

    /// `unlocked_ioctl` as the syscall layer sees it: raw command and
    /// argument in, 0 or a negated errno out.
    pub fn ioctl_raw(&self, cmd: u32, arg: usize) -> c_long {
        ioctl_status(&self.ioctl(IoctlCode::from_raw(cmd), UserAddr::new(arg)))
    }

    pub fn close(self) {}
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.device.release(self.id);
    }
}
