use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::error::{LinkError, Result};

/// Exclusive access to per-connection state, one holder at a time.
///
/// Other threads block in [`Gate::acquire`] until the holder's guard is
/// dropped. The holding thread itself fails fast with [`LinkError::Reentrant`]
/// instead of deadlocking.
pub struct Gate<T> {
    owner: Mutex<Option<ThreadId>>,
    inner: Mutex<T>,
}

/// Proof of exclusive access; releases the gate on drop.
pub struct GateGuard<'a, T> {
    owner: &'a Mutex<Option<ThreadId>>,
    guard: MutexGuard<'a, T>,
}

impl<T> Gate<T> {
    pub fn new(inner: T) -> Self {
        Self {
            owner: Mutex::new(None),
            inner: Mutex::new(inner),
        }
    }

    /// Block until the gate is free, then take it.
    ///
    /// Fails with [`LinkError::Broken`] if a previous holder panicked.
    pub fn acquire(&self) -> Result<GateGuard<'_, T>> {
        let me = thread::current().id();
        if *self.lock_owner() == Some(me) {
            return Err(LinkError::Reentrant);
        }
        let guard = self.inner.lock().map_err(|_| LinkError::Broken)?;
        *self.lock_owner() = Some(me);
        Ok(GateGuard {
            owner: &self.owner,
            guard,
        })
    }

    /// Whether the calling thread currently holds the gate.
    pub fn held_by_current_thread(&self) -> bool {
        *self.lock_owner() == Some(thread::current().id())
    }

    fn lock_owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for GateGuard<'_, T> {
    fn drop(&mut self) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
