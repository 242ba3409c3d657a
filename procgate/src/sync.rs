//! Lock helpers shared by the gate and the process handle.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Acquire `mutex`, recovering the guard if another thread panicked while holding it.
///
/// Every critical section in this crate leaves its data consistent, so a
/// poisoned lock still holds valid state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Acquire `mutex` only if no other thread holds it.
pub(crate) fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
