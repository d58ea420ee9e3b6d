//! Protocol shared by the myioctl driver and user space: device constants,
//! ioctl code layout and the command table.

#![cfg_attr(feature = "kernel", no_std)]

pub mod constants;
pub mod ioctl;

pub use constants::{DEFAULT_STORE_PATH, DEVICE_NAME, MYIOCTL_MAGIC};
pub use ioctl::{
    Command, CommandError, Count, Direction, IoctlCode, MYIOCTL_GET_COUNT, MYIOCTL_INCREMENT,
    MYIOCTL_RESET,
};
