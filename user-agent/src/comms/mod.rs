pub mod ioctl;

pub use ioctl::{CounterClient, IoctlError};
