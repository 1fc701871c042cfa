//! Scope-guarded critical regions.
//!
//! A [`RegionGuard`] acquires a lock when it is created and releases it
//! exactly once when it goes out of scope, whichever way control leaves the
//! scope: falling off the end, an early `return`, `?`, or a panic unwinding
//! through it.
//!
//! ```
//! use critsec::{RegionGuard, ReentrantLock};
//!
//! fn update(lock: &ReentrantLock) -> Result<(), critsec::LockError> {
//!     let _region = RegionGuard::enter(lock)?;
//!     // ... critical region ...
//!     Ok(())
//! } // released here
//! ```

use crate::error::{LockError, Status};
use crate::raw::{RawLock, RawReentrant};
use critsec_logging::{error, TARGET};
use std::marker::PhantomData;

/// Holds one level of a borrowed lock until dropped.
///
/// Works over a [`RawLock`] or a [`ReentrantLock`](crate::ReentrantLock).
/// The guard is not `Send`: ownership belongs to the context that acquired
/// it, so the release must happen there too.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct RegionGuard<'a, L: RawReentrant + ?Sized = RawLock> {
    lock: &'a L,
    // releases must come from the acquiring context
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: RawReentrant + ?Sized> RegionGuard<'a, L> {
    /// Blocks until `lock` is held, then returns the guard. A context that
    /// already holds `lock` gets a nested guard immediately.
    pub fn enter(lock: &'a L) -> Result<Self, LockError> {
        lock.acquire()?;
        Ok(Self::acquired(lock))
    }

    /// Like [`enter`](Self::enter) but fails with
    /// [`LockError::WouldBlock`] instead of waiting.
    pub fn try_enter(lock: &'a L) -> Result<Self, LockError> {
        lock.try_acquire()?;
        Ok(Self::acquired(lock))
    }

    fn acquired(lock: &'a L) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Leaves the region now and reports the release status, which a plain
    /// drop cannot.
    pub fn unlock(self) -> Status {
        let lock = self.lock;
        std::mem::forget(self);
        lock.release()
    }

    /// The lock this guard holds
    pub fn lock(&self) -> &'a L {
        self.lock
    }
}

impl<L: RawReentrant + ?Sized> Drop for RegionGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release() {
            error!(target: TARGET, "failed to release lock on leaving critical region: {err}");
        }
    }
}

impl<L: RawReentrant + ?Sized> std::fmt::Debug for RegionGuard<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionGuard").finish_non_exhaustive()
    }
}

/// Runs a block as a critical region over a lock.
///
/// `critical_region!(&lock => { ... })` acquires `lock`, evaluates the block
/// and releases `lock` when the block is left by any path. The whole
/// expression is a `Result`: `Ok` with the block's value, or `Err` with the
/// acquire failure, in which case the block never runs. `return` and `?`
/// inside the block leave the enclosing function as usual.
#[macro_export]
macro_rules! critical_region {
    ($lock:expr => $body:block) => {
        match $crate::RegionGuard::enter($lock) {
            ::core::result::Result::Ok(_region_guard) => ::core::result::Result::Ok($body),
            ::core::result::Result::Err(err) => ::core::result::Result::Err(err),
        }
    };
}
