//! ioctl command codes of the myioctl device.
//!
//! Codes follow the generic Linux `_IOC` layout (`include/uapi/asm-generic/ioctl.h`):
//!
//! ```text
//!  31 30 29            16 15        8 7         0
//! +-----+----------------+-----------+-----------+
//! | dir |      size      |   type    |    nr     |
//! +-----+----------------+-----------+-----------+
//! ```
//!
//! `type` is the namespace ("magic") tag. The direction is seen from the
//! caller: `Write` means the caller hands a buffer *to* the device, `Read`
//! means the device fills a caller buffer.

use core::ffi::c_long;
use core::fmt;
use core::mem::size_of;

use thiserror::Error;

use crate::constants::{ENOTTY, MYIOCTL_MAGIC, NR_GET_COUNT, NR_INCREMENT, NR_RESET};

/// The counter value, and the payload of `GET_COUNT` and `INCREMENT`.
///
/// Both commands move exactly one `long` across the boundary and the persisted
/// blob is one `long` as well.
pub type Count = c_long;

pub const IOC_NRBITS: u32 = 8;
pub const IOC_TYPEBITS: u32 = 8;
pub const IOC_SIZEBITS: u32 = 14;
pub const IOC_DIRBITS: u32 = 2;

pub const IOC_NRSHIFT: u32 = 0;
pub const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
pub const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
pub const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NRMASK: u32 = (1 << IOC_NRBITS) - 1;
const IOC_TYPEMASK: u32 = (1 << IOC_TYPEBITS) - 1;
const IOC_SIZEMASK: u32 = (1 << IOC_SIZEBITS) - 1;
const IOC_DIRMASK: u32 = (1 << IOC_DIRBITS) - 1;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// Buffer direction encoded in an ioctl code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `_IO`: no argument buffer.
    None,
    /// `_IOW`: caller → device.
    Write,
    /// `_IOR`: device → caller.
    Read,
    /// `_IOWR`: both ways.
    ReadWrite,
}

impl Direction {
    const fn bits(self) -> u32 {
        match self {
            Direction::None => IOC_NONE,
            Direction::Write => IOC_WRITE,
            Direction::Read => IOC_READ,
            Direction::ReadWrite => IOC_READ | IOC_WRITE,
        }
    }
}

/// A raw 32-bit ioctl command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoctlCode(u32);

impl IoctlCode {
    /// Equivalent of the `_IOC` macro.
    pub const fn new(dir: Direction, kind: u8, nr: u8, size: usize) -> Self {
        Self(
            (dir.bits() << IOC_DIRSHIFT)
                | ((size as u32 & IOC_SIZEMASK) << IOC_SIZESHIFT)
                | ((kind as u32) << IOC_TYPESHIFT)
                | ((nr as u32) << IOC_NRSHIFT),
        )
    }

    /// `_IO(kind, nr)`
    pub const fn io(kind: u8, nr: u8) -> Self {
        Self::new(Direction::None, kind, nr, 0)
    }

    /// `_IOR(kind, nr, T)` with `size_of::<T>() == size`
    pub const fn ior(kind: u8, nr: u8, size: usize) -> Self {
        Self::new(Direction::Read, kind, nr, size)
    }

    /// `_IOW(kind, nr, T)` with `size_of::<T>() == size`
    pub const fn iow(kind: u8, nr: u8, size: usize) -> Self {
        Self::new(Direction::Write, kind, nr, size)
    }

    /// `_IOWR(kind, nr, T)` with `size_of::<T>() == size`
    pub const fn iowr(kind: u8, nr: u8, size: usize) -> Self {
        Self::new(Direction::ReadWrite, kind, nr, size)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `_IOC_DIR`
    pub const fn dir(self) -> Direction {
        match (self.0 >> IOC_DIRSHIFT) & IOC_DIRMASK {
            IOC_NONE => Direction::None,
            IOC_WRITE => Direction::Write,
            IOC_READ => Direction::Read,
            _ => Direction::ReadWrite,
        }
    }

    /// `_IOC_TYPE`, the namespace tag.
    pub const fn kind(self) -> u8 {
        ((self.0 >> IOC_TYPESHIFT) & IOC_TYPEMASK) as u8
    }

    /// `_IOC_NR`
    pub const fn nr(self) -> u8 {
        ((self.0 >> IOC_NRSHIFT) & IOC_NRMASK) as u8
    }

    /// `_IOC_SIZE`, the argument buffer length in bytes.
    pub const fn size(self) -> usize {
        ((self.0 >> IOC_SIZESHIFT) & IOC_SIZEMASK) as usize
    }
}

impl From<u32> for IoctlCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<IoctlCode> for u32 {
    fn from(code: IoctlCode) -> Self {
        code.0
    }
}

impl fmt::Display for IoctlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

pub const MYIOCTL_RESET: IoctlCode = IoctlCode::io(MYIOCTL_MAGIC, NR_RESET);
pub const MYIOCTL_GET_COUNT: IoctlCode =
    IoctlCode::ior(MYIOCTL_MAGIC, NR_GET_COUNT, size_of::<Count>());
pub const MYIOCTL_INCREMENT: IoctlCode =
    IoctlCode::iow(MYIOCTL_MAGIC, NR_INCREMENT, size_of::<Count>());

/// The closed set of operations the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    GetCount,
    Increment,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Reset, Command::GetCount, Command::Increment];

    pub const fn code(self) -> IoctlCode {
        match self {
            Command::Reset => MYIOCTL_RESET,
            Command::GetCount => MYIOCTL_GET_COUNT,
            Command::Increment => MYIOCTL_INCREMENT,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Command::Reset => "RESET",
            Command::GetCount => "GET_COUNT",
            Command::Increment => "INCREMENT",
        }
    }

    /// Maps a raw code onto a command.
    ///
    /// The namespace tag is checked before anything else; within the tag the
    /// whole code (direction and size included) must match exactly.
    pub fn decode(code: IoctlCode) -> Result<Self, CommandError> {
        if code.kind() != MYIOCTL_MAGIC {
            return Err(CommandError::InvalidNamespace { code });
        }
        match code {
            MYIOCTL_RESET => Ok(Command::Reset),
            MYIOCTL_GET_COUNT => Ok(Command::GetCount),
            MYIOCTL_INCREMENT => Ok(Command::Increment),
            _ => Err(CommandError::UnknownCommand { code }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a code was refused before reaching any handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("ioctl {code} is outside the '{}' namespace", MYIOCTL_MAGIC as char)]
    InvalidNamespace { code: IoctlCode },

    #[error("unknown ioctl {code}")]
    UnknownCommand { code: IoctlCode },
}

impl CommandError {
    pub const fn code(&self) -> IoctlCode {
        match *self {
            CommandError::InvalidNamespace { code } | CommandError::UnknownCommand { code } => code,
        }
    }

    /// Both rejections surface as "no such ioctl".
    pub const fn errno(&self) -> i32 {
        ENOTTY
    }
}
