//! Poison-tolerant wrappers around the standard mutex and condition
//! variable primitives.
//!
//! Queue handlers and delegate callbacks run user code; a panic inside one
//! is caught and logged, but may still poison a lock held by the panicking
//! frame. The protected state is always left structurally valid (slots are
//! taken before handlers run), so waiters recover the guard instead of
//! propagating the poison.

use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait<'a, T>(cv: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

/// Wait on `cv` for up to `timeout` while `keep_waiting` holds, returning
/// the reacquired guard.
pub(crate) fn wait_timeout_while<'a, T, F>(
    cv: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
    keep_waiting: F,
) -> MutexGuard<'a, T>
where
    F: FnMut(&mut T) -> bool,
{
    cv.wait_timeout_while(guard, timeout, keep_waiting)
        .map(|(guard, _timeout)| guard)
        .unwrap_or_else(|e| e.into_inner().0)
}
