//! The owning wrapper around [`RawLock`].
//!
//! A [`ReentrantLock`] creates its native lock when constructed and destroys
//! it when dropped, reporting the destroy outcome exactly once.

use crate::context::ContextId;
use crate::error::{LockError, Status};
use crate::guard::RegionGuard;
use crate::options::LockOptions;
use crate::raw::{RawLock, RawReentrant};
use critsec_logging::{debug, warn, TARGET};
use std::sync::atomic::{AtomicBool, Ordering};

/// A reentrant lock that owns its native lock for its whole lifetime.
///
/// The owning context may acquire it repeatedly and must release it the same
/// number of times before another context can get it. Waiters are granted the
/// lock by priority unless created with [`QueueDiscipline::Fifo`](crate::QueueDiscipline::Fifo).
///
/// The lock can be placed in a `static`; its constructors are `const` and
/// do not depend on any other static initialisation.
///
/// ```
/// use critsec::{critical_region, ReentrantLock};
///
/// static SETUP: ReentrantLock = ReentrantLock::new();
///
/// fn init() -> Result<(), critsec::LockError> {
///     critical_region!(&SETUP => {
///         // only one context runs this at a time
///     })
/// }
/// ```
pub struct ReentrantLock {
    raw: RawLock,
    destroy_reported: AtomicBool,
}

impl ReentrantLock {
    /// Creates a priority-queued, deletion-safe lock
    pub const fn new() -> Self {
        Self::with_options(LockOptions::DEFAULT)
    }

    pub const fn with_options(options: LockOptions) -> Self {
        Self {
            raw: RawLock::with_options(options),
            destroy_reported: AtomicBool::new(false),
        }
    }

    /// The native lock, for code that works with raw locks directly
    pub fn raw(&self) -> &RawLock {
        &self.raw
    }

    /// Blocks until the calling context holds the lock
    pub fn acquire(&self) -> Status {
        self.raw.acquire()
    }

    pub fn try_acquire(&self) -> Status {
        self.raw.try_acquire()
    }

    /// Releases one level of ownership
    pub fn release(&self) -> Status {
        self.raw.release()
    }

    /// Acquires the lock for the lifetime of the returned guard
    pub fn enter(&self) -> Result<RegionGuard<'_, Self>, LockError> {
        RegionGuard::enter(self)
    }

    pub fn try_enter(&self) -> Result<RegionGuard<'_, Self>, LockError> {
        RegionGuard::try_enter(self)
    }

    /// Destroys the lock now instead of on drop, reporting the outcome
    pub fn destroy(self) -> Status {
        self.take_destroy_status().unwrap_or(Ok(()))
    }

    /// Destroys the native lock the first time it is called. Later calls
    /// return `None` so `Drop` stays quiet after an explicit `destroy`.
    fn take_destroy_status(&self) -> Option<Status> {
        if self.destroy_reported.swap(true, Ordering::AcqRel) {
            return None;
        }

        Some(self.raw.destroy())
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    pub fn is_held_by_current(&self) -> bool {
        self.raw.is_held_by_current()
    }

    pub fn owner(&self) -> Option<ContextId> {
        self.raw.owner()
    }

    pub fn depth(&self) -> u32 {
        self.raw.depth()
    }

    pub fn waiting(&self) -> Vec<ContextId> {
        self.raw.waiting()
    }

    pub fn options(&self) -> &LockOptions {
        self.raw.options()
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReentrantLock").field(&self.raw).finish()
    }
}

impl Drop for ReentrantLock {
    fn drop(&mut self) {
        match self.take_destroy_status() {
            None => {}
            Some(Ok(())) => debug!(target: TARGET, "dropped reentrant lock"),
            Some(Err(err)) => {
                warn!(target: TARGET, "reentrant lock dropped while in use: {err}")
            }
        }
    }
}

impl RawReentrant for ReentrantLock {
    fn acquire(&self) -> Status {
        self.raw.acquire()
    }

    fn try_acquire(&self) -> Status {
        self.raw.try_acquire()
    }

    fn release(&self) -> Status {
        self.raw.release()
    }
}
