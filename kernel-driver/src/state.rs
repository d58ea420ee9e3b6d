//! The counter and the lock that guards it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use shared::Count;

/// The device's only piece of domain state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    pub value: Count,
}

/// [`CounterState`] behind the device-wide mutex.
///
/// Every access goes through [`SharedCounter::lock`] or one of the helpers
/// built on it, so no command can observe a torn update.
#[derive(Debug, Default)]
pub struct SharedCounter {
    inner: Mutex<CounterState>,
}

impl SharedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A plain integer cannot be left half-written, so a poisoned lock is
    /// taken over as is.
    pub fn lock(&self) -> MutexGuard<'_, CounterState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Count {
        self.lock().value
    }

    pub fn reset(&self) {
        self.lock().value = 0;
    }

    /// Adds `delta` with native wraparound and returns the new value.
    pub fn add(&self, delta: Count) -> Count {
        let mut state = self.lock();
        state.value = state.value.wrapping_add(delta);
        state.value
    }
}
