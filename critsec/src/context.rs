//! Execution contexts.
//!
//! A context is an OS thread. Each thread is lazily given a [`ContextId`] the
//! first time it touches a lock, and carries a scheduling [`Priority`] that
//! decides its place in a lock's wait queue.

use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: LocalContext = LocalContext::new();
}

/// Process-unique identity of an execution context. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(NonZeroU64);

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Scheduling priority of a context. Lower values are more urgent: 0 is the
/// highest priority and 255 the lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Priority(pub u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const DEFAULT: Priority = Priority(100);
    pub const LOWEST: Priority = Priority(u8::MAX);

    /// Returns true if a context at `self` must be served before one at `other`
    pub fn is_higher_than(&self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct LocalContext {
    id: ContextId,
    priority: Cell<Priority>,
}

impl LocalContext {
    fn new() -> Self {
        let raw = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        // the counter starts at one and a u64 cannot realistically wrap
        let id = NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN);
        Self {
            id: ContextId(id),
            priority: Cell::new(Priority::DEFAULT),
        }
    }
}

/// The id of the calling context
pub fn current() -> ContextId {
    CURRENT.with(|ctx| ctx.id)
}

/// The priority the calling context currently runs at
pub fn priority() -> Priority {
    CURRENT.with(|ctx| ctx.priority.get())
}

/// Sets the calling context's priority, returning the previous one. Only
/// affects lock requests made after the call.
pub fn set_priority(priority: Priority) -> Priority {
    CURRENT.with(|ctx| ctx.priority.replace(priority))
}

/// Runs `f` at `priority`, restoring the previous priority afterwards even if
/// `f` unwinds.
pub fn with_priority<R>(priority: Priority, f: impl FnOnce() -> R) -> R {
    struct Restore(Priority);

    impl Drop for Restore {
        fn drop(&mut self) {
            let _ = set_priority(self.0);
        }
    }

    let _restore = Restore(set_priority(priority));
    f()
}
