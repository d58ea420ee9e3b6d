//! Character device registration.
//!
//! [`CharDevRegistry`] is the `register_chrdev` / `unregister_chrdev` pair.
//! [`MajorTable`] hands out dynamic majors the way the kernel does for a
//! `register_chrdev(0, ...)` call: highest free number first, from the
//! dynamic range 234..=254. [`Registration`] releases its major when dropped.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{DriverError, DriverResult};

/// A character device major number.
pub type Major = u32;

pub const CHRDEV_MAJOR_DYN_START: Major = 254;
pub const CHRDEV_MAJOR_DYN_END: Major = 234;

pub trait CharDevRegistry: Send + Sync {
    /// Allocates a major for `name`.
    fn register(&self, name: &str) -> DriverResult<Major>;

    /// Releases a major obtained from [`CharDevRegistry::register`].
    fn unregister(&self, major: Major, name: &str);
}

/// In-process major allocator. A name can hold at most one major at a time.
#[derive(Debug, Default)]
pub struct MajorTable {
    slots: Mutex<BTreeMap<Major, String>>,
}

impl MajorTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, BTreeMap<Major, String>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The major currently held by `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Major> {
        self.slots().iter().find(|(_, n)| n.as_str() == name).map(|(m, _)| *m)
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CharDevRegistry for MajorTable {
    fn register(&self, name: &str) -> DriverResult<Major> {
        let mut slots = self.slots();
        if slots.values().any(|n| n == name) {
            return Err(DriverError::NameInUse(name.to_owned()));
        }
        let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .find(|m| !slots.contains_key(m))
            .ok_or(DriverError::NoFreeMajor)?;
        slots.insert(major, name.to_owned());
        Ok(major)
    }

    fn unregister(&self, major: Major, name: &str) {
        let mut slots = self.slots();
        if slots.get(&major).is_some_and(|n| n == name) {
            slots.remove(&major);
        }
    }
}

/// A registered device name; unregisters on drop.
pub struct Registration {
    registry: Arc<dyn CharDevRegistry>,
    name: String,
    major: Major,
}

impl Registration {
    pub fn new(registry: Arc<dyn CharDevRegistry>, name: &str) -> DriverResult<Self> {
        let major = registry.register(name)?;
        Ok(Self { registry, name: name.to_owned(), major })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn major(&self) -> Major {
        self.major
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.major, &self.name);
    }
}
