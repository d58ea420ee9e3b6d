//! Driver errors and their errno mapping.

use std::io;

use shared::constants::{EBUSY, EFAULT, EIO, ENOTTY};
use shared::{CommandError, IoctlCode};
use thiserror::Error;

/// Everything the device can fail with.
///
/// Only the first three variants ever reach an ioctl caller; storage errors
/// are reported as events and swallowed, registration errors stop the device
/// from coming up at all.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("ioctl {code} is outside this device's namespace")]
    InvalidNamespace { code: IoctlCode },

    #[error("unknown ioctl {code}")]
    UnknownCommand { code: IoctlCode },

    #[error("cannot copy {len} byte(s) at user address {addr:#x}")]
    CopyFault { addr: usize, len: usize },

    /// Built by the device from a failed load or save; never returned from
    /// an ioctl.
    #[error("counter store unavailable: {0}")]
    StorageUnavailable(io::Error),

    #[error("device name '{0}' is already registered")]
    NameInUse(String),

    #[error("no free character device major")]
    NoFreeMajor,
}

impl DriverError {
    /// Positive errno reported at the boundary for this error.
    pub fn errno(&self) -> i32 {
        match self {
            DriverError::InvalidNamespace { .. } | DriverError::UnknownCommand { .. } => ENOTTY,
            DriverError::CopyFault { .. } => EFAULT,
            DriverError::StorageUnavailable(_) => EIO,
            DriverError::NameInUse(_) | DriverError::NoFreeMajor => EBUSY,
        }
    }
}

impl From<CommandError> for DriverError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::InvalidNamespace { code } => DriverError::InvalidNamespace { code },
            CommandError::UnknownCommand { code } => DriverError::UnknownCommand { code },
        }
    }
}

/// A [`Result`] with a [`DriverError`] error type.
pub type DriverResult<T = ()> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_follows_the_kind_of_failure() {
        let storage = DriverError::StorageUnavailable(io::Error::other("disk on fire"));
        assert_eq!(storage.errno(), EIO);
        assert_eq!(storage.to_string(), "counter store unavailable: disk on fire");

        assert_eq!(DriverError::CopyFault { addr: 0, len: 8 }.errno(), EFAULT);
        assert_eq!(DriverError::NoFreeMajor.errno(), EBUSY);
    }

    #[test]
    fn command_errors_keep_their_code() {
        let code = IoctlCode::from_raw(0x5309);
        let err = DriverError::from(CommandError::InvalidNamespace { code });
        assert!(matches!(err, DriverError::InvalidNamespace { code: c } if c == code));
        assert_eq!(err.errno(), ENOTTY);
    }
}
