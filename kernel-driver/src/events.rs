//! Structured device events.
//!
//! The device reports what it does to an [`EventSink`] handed in at
//! registration instead of writing log lines from the middle of its logic.
//! [`LogSink`] turns events into log records; [`RecordingSink`] keeps them for
//! inspection.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::Level;
use shared::{Command, CommandError, Count, IoctlCode};

use crate::chrdev::Major;
use crate::myioctl_log;

/// Identifies one open session of a device.
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidNamespace,
    UnknownCommand,
}

impl From<&CommandError> for Rejection {
    fn from(err: &CommandError) -> Self {
        match err {
            CommandError::InvalidNamespace { .. } => Rejection::InvalidNamespace,
            CommandError::UnknownCommand { .. } => Rejection::UnknownCommand,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Load,
    Save,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageOp::Load => "load",
            StorageOp::Save => "save",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Registered { name: String, major: Major },
    Unregistered { name: String, major: Major },
    SessionOpened { session: SessionId },
    SessionClosed { session: SessionId },
    CommandDispatched { command: Command },
    CommandRejected { code: IoctlCode, reason: Rejection },
    CopyFaulted { command: Command, addr: usize, len: usize },
    StateLoaded { value: Count },
    StateSaved { value: Count },
    StorageUnavailable { op: StorageOp, location: String, errno: i32, reason: String },
}

/// Receives every event a device emits. Never called with the counter lock
/// held.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DeviceEvent);
}

/// Writes events to the `log` facade under the `myioctl` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &DeviceEvent) {
        match event {
            DeviceEvent::Registered { name, major } => {
                myioctl_log!(Level::Info, "chrdev", "{} loaded. Major number: {}", name, major)
            }
            DeviceEvent::Unregistered { name, major } => {
                myioctl_log!(Level::Info, "chrdev", "{} unloaded (major {})", name, major)
            }
            DeviceEvent::SessionOpened { session } => {
                myioctl_log!(Level::Info, "session", "device opened (session {})", session)
            }
            DeviceEvent::SessionClosed { session } => {
                myioctl_log!(Level::Info, "session", "device closed (session {})", session)
            }
            DeviceEvent::CommandDispatched { command } => {
                myioctl_log!(Level::Info, "dispatch", "IOCTL: {}", command)
            }
            DeviceEvent::CommandRejected { code, reason: Rejection::InvalidNamespace } => {
                myioctl_log!(Level::Error, "dispatch", "invalid magic number in ioctl {}", code)
            }
            DeviceEvent::CommandRejected { code, reason: Rejection::UnknownCommand } => {
                myioctl_log!(Level::Error, "dispatch", "unknown ioctl command {}", code)
            }
            DeviceEvent::CopyFaulted { command, addr, len } => myioctl_log!(
                Level::Warn,
                "dispatch",
                "{}: bad user buffer {:#x} ({} bytes)",
                command,
                addr,
                len
            ),
            DeviceEvent::StateLoaded { value } => {
                myioctl_log!(Level::Debug, "store", "counter loaded: {}", value)
            }
            DeviceEvent::StateSaved { value } => {
                myioctl_log!(Level::Debug, "store", "counter saved: {}", value)
            }
            DeviceEvent::StorageUnavailable { op, location, errno, reason } => myioctl_log!(
                Level::Warn,
                "store",
                "cannot {} counter at {}: {} (errno {})",
                op,
                location,
                reason,
                errno
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DeviceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> MutexGuard<'_, Vec<DeviceEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<DeviceEvent> {
        self.events().clone()
    }

    /// Drains the recorded events.
    pub fn take(&self) -> Vec<DeviceEvent> {
        std::mem::take(&mut *self.events())
    }

    pub fn count(&self, pred: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &DeviceEvent) {
        self.events().push(event.clone());
    }
}
