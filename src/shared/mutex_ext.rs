//! Usage: `lock_or_recover` for std mutexes: a poisoned lock is logged once, cleared and reused.

use std::sync::{Mutex, MutexGuard};

pub(crate) trait MutexExt<T> {
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        let caller = std::panic::Location::caller();
        self.lock().unwrap_or_else(|poisoned| {
            tracing::error!(
                guarded = std::any::type_name::<T>(),
                at = %caller,
                "lock poisoned by a panicking holder; continuing with its last state"
            );
            self.clear_poison();
            poisoned.into_inner()
        })
    }
}
