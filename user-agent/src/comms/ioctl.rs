//! IOCTL communication interface with the counter device.
//!
//! [`CounterClient`] plays the part of a user process: it owns an address
//! space, keeps one session open and issues the raw `ioctl(2)` calls, turning
//! a negative return into an errno the way `perror` would.

use std::mem::size_of;
use std::sync::Arc;

use myioctl_driver::{Access, CounterDevice, LocalUserMemory, Session, SessionId, UserAddr};
use shared::constants::{EFAULT, ENOTTY};
use shared::{Command, Count, IoctlCode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("ioctl {code} ({name}) failed: {} (errno {errno})", strerror(.errno))]
pub struct IoctlError {
    pub code: IoctlCode,
    pub name: &'static str,
    pub errno: i32,
}

fn strerror(errno: &i32) -> &'static str {
    match *errno {
        ENOTTY => "Inappropriate ioctl for device",
        EFAULT => "Bad address",
        _ => "Unknown error",
    }
}

/// One open session on a counter device, plus the memory its arguments live in.
pub struct CounterClient<'d> {
    memory: Arc<LocalUserMemory>,
    session: Session<'d>,
}

impl<'d> CounterClient<'d> {
    /// Opens a new session on `device`.
    pub fn open(device: &'d CounterDevice) -> Self {
        let memory = Arc::new(LocalUserMemory::new());
        let session = device.open(memory.clone());
        Self { memory, session }
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    pub fn reset(&self) -> Result<(), IoctlError> {
        self.call(Command::Reset.code(), UserAddr::NULL)
    }

    pub fn get_count(&self) -> Result<Count, IoctlError> {
        let out = self.memory.map(size_of::<Count>(), Access::ReadWrite);
        let result = self.call(Command::GetCount.code(), out).map(|()| {
            self.memory.peek_value::<Count>(out).unwrap_or_default()
        });
        self.memory.unmap(out);
        result
    }

    pub fn increment(&self, delta: Count) -> Result<(), IoctlError> {
        let arg = self.memory.map_value(delta, Access::ReadOnly);
        let result = self.call(Command::Increment.code(), arg);
        self.memory.unmap(arg);
        result
    }

    /// Issues `code` with a raw argument, as `ioctl(fd, code, arg)` would.
    pub fn raw(&self, code: IoctlCode, arg: usize) -> Result<(), IoctlError> {
        self.call(code, UserAddr::new(arg))
    }

    /// Closes the session.
    pub fn close(self) {}

    fn call(&self, code: IoctlCode, arg: UserAddr) -> Result<(), IoctlError> {
        let ret = self.session.ioctl_raw(code.raw(), arg.get());
        if ret < 0 {
            let name = Command::decode(code).map_or("unknown", Command::name);
            log::debug!("ioctl {} returned {}", code, ret);
            return Err(IoctlError { code, name, errno: -ret as i32 });
        }
        Ok(())
    }
}
