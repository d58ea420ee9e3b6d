//! myioctl: a character device holding one `long` counter.
//!
//! User space drives it with three ioctls (see [`shared::Command`]):
//! `RESET`, `GET_COUNT` and `INCREMENT`. The counter can be persisted to a
//! small file, either across the whole device lifetime or around every
//! session.
//!
//! ```no_run
//! use std::sync::Arc;
//! use myioctl_driver::{CounterDevice, FileStore, LocalUserMemory, PersistencePolicy};
//!
//! let device = CounterDevice::builder("myioctl")
//!     .persistence(PersistencePolicy::SessionLifetime, FileStore::new("/etc/my_variable_file"))
//!     .register()?;
//! let session = device.open(Arc::new(LocalUserMemory::new()));
//! session.ioctl(shared::MYIOCTL_RESET, myioctl_driver::UserAddr::NULL)?;
//! session.close();
//! device.unregister();
//! # Ok::<(), myioctl_driver::DriverError>(())
//! ```

mod macros;

pub mod chrdev;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod state;
pub mod store;
pub mod user_ptr;

#[doc(hidden)]
pub use log as __log;

pub use chrdev::{CharDevRegistry, Major, MajorTable, Registration};
pub use config::{DeviceConfig, PersistenceConfig, PersistencePolicy};
pub use device::{CounterDevice, DeviceBuilder, Session};
pub use dispatch::{ioctl_status, Dispatcher, IoctlArg};
pub use error::{DriverError, DriverResult};
pub use events::{DeviceEvent, EventSink, LogSink, RecordingSink, Rejection, SessionId, StorageOp};
pub use state::{CounterState, SharedCounter};
pub use store::{CounterStore, FileStore};
pub use user_ptr::{Access, LocalUserMemory, UserAddr, UserMemory};
