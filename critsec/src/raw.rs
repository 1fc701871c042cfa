//! The native lock primitive.
//!
//! [`RawLock`] is a reentrant mutual-exclusion lock tracked as an owner
//! [`ContextId`] plus a hold count. Contexts that find it held by someone else
//! enqueue themselves and park on a condition variable. When the owner releases
//! its last hold, ownership is handed directly to the waiter chosen by the
//! lock's [`QueueDiscipline`], so a context arriving later cannot barge past
//! an already queued one.

use crate::context::{self, ContextId, Priority};
use crate::error::{LockError, Status};
use crate::options::{LockOptions, QueueDiscipline};
use critsec_logging::{debug, trace, TARGET};
use parking_lot::{Condvar, Mutex};

/// Operations every lock usable by a [`RegionGuard`](crate::RegionGuard) provides
pub trait RawReentrant {
    /// Blocks until the caller holds the lock. Succeeds immediately, one
    /// level deeper, if the caller already holds it.
    fn acquire(&self) -> Status;
    /// Acquires only if that is possible without blocking
    fn try_acquire(&self) -> Status;
    /// Releases one level of ownership
    fn release(&self) -> Status;
}

#[derive(Debug, Clone, Copy)]
struct Waiter {
    context: ContextId,
    priority: Priority,
    ticket: u64,
}

#[derive(Debug)]
struct State {
    owner: Option<ContextId>,
    depth: u32,
    waiters: Vec<Waiter>,
    next_ticket: u64,
    destroyed: bool,
}

impl State {
    const fn new() -> Self {
        Self {
            owner: None,
            depth: 0,
            waiters: Vec::new(),
            next_ticket: 0,
            destroyed: false,
        }
    }

    /// Index of the waiter that receives the lock next
    fn next_waiter(&self, discipline: QueueDiscipline) -> Option<usize> {
        let candidates = self.waiters.iter().enumerate();
        match discipline {
            QueueDiscipline::Priority => candidates
                .reduce(|best, candidate| {
                    let (_, b) = best;
                    let (_, c) = candidate;
                    let more_urgent = c.priority.is_higher_than(b.priority)
                        || (c.priority == b.priority && c.ticket < b.ticket);
                    if more_urgent {
                        candidate
                    } else {
                        best
                    }
                })
                .map(|(idx, _)| idx),
            QueueDiscipline::Fifo => candidates
                .min_by_key(|(_, waiter)| waiter.ticket)
                .map(|(idx, _)| idx),
        }
    }

    fn remove_waiter(&mut self, context: ContextId) {
        self.waiters.retain(|waiter| waiter.context != context);
    }
}

/// A reentrant, queue-ordered lock with no owned data.
///
/// Usable in a `static`; see [`RawLock::new`].
pub struct RawLock {
    state: Mutex<State>,
    handoff: Condvar,
    options: LockOptions,
}

impl RawLock {
    /// Creates a priority-queued, deletion-safe lock
    pub const fn new() -> Self {
        Self::with_options(LockOptions::DEFAULT)
    }

    pub const fn with_options(options: LockOptions) -> Self {
        Self {
            state: parking_lot::const_mutex(State::new()),
            handoff: Condvar::new(),
            options,
        }
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    fn name(&self) -> &'static str {
        self.options.name.unwrap_or("unnamed")
    }

    /// Blocks the calling context until it owns the lock. There is no timeout.
    pub fn acquire(&self) -> Status {
        let me = context::current();
        let mut state = self.state.lock();

        if state.destroyed {
            return Err(LockError::Destroyed);
        }

        match state.owner {
            Some(owner) if owner == me => {
                state.depth = state.depth.checked_add(1).ok_or(LockError::DepthOverflow)?;
                trace!(target: TARGET, lock = self.name(), context = %me, depth = state.depth, "reentered");
                return Ok(());
            }

            None => {
                state.owner = Some(me);
                state.depth = 1;
                trace!(target: TARGET, lock = self.name(), context = %me, "acquired");
                return Ok(());
            }

            Some(_) => {}
        }

        let priority = context::priority();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push(Waiter {
            context: me,
            priority,
            ticket,
        });
        trace!(target: TARGET, lock = self.name(), context = %me, %priority, ticket, "waiting");

        loop {
            self.handoff.wait(&mut state);

            if state.owner == Some(me) {
                trace!(target: TARGET, lock = self.name(), context = %me, "acquired after handoff");
                return Ok(());
            }

            if state.destroyed {
                state.remove_waiter(me);
                return Err(LockError::Destroyed);
            }
        }
    }

    /// Acquires without blocking. Fails with [`LockError::WouldBlock`] when
    /// another context holds the lock.
    pub fn try_acquire(&self) -> Status {
        let me = context::current();
        let mut state = self.state.lock();

        if state.destroyed {
            return Err(LockError::Destroyed);
        }

        match state.owner {
            Some(owner) if owner == me => {
                state.depth = state.depth.checked_add(1).ok_or(LockError::DepthOverflow)?;
                Ok(())
            }

            Some(owner) => Err(LockError::WouldBlock { owner }),

            None => {
                state.owner = Some(me);
                state.depth = 1;
                trace!(target: TARGET, lock = self.name(), context = %me, "acquired without waiting");
                Ok(())
            }
        }
    }

    /// Releases one level of ownership. When the hold count reaches zero the
    /// lock passes to the next waiter, if any.
    pub fn release(&self) -> Status {
        let me = context::current();
        let mut state = self.state.lock();

        if state.destroyed {
            return Err(LockError::Destroyed);
        }

        if state.owner != Some(me) {
            return Err(LockError::NotOwner {
                caller: me,
                owner: state.owner,
            });
        }

        state.depth -= 1;
        if state.depth > 0 {
            trace!(target: TARGET, lock = self.name(), context = %me, depth = state.depth, "released one level");
            return Ok(());
        }

        match state.next_waiter(self.options.discipline) {
            Some(idx) => {
                let next = state.waiters.remove(idx);
                state.owner = Some(next.context);
                state.depth = 1;
                trace!(target: TARGET, lock = self.name(), from = %me, to = %next.context, priority = %next.priority, "handed off");
                // every waiter shares the condvar; only the new owner proceeds
                let _ = self.handoff.notify_all();
            }

            None => {
                state.owner = None;
                trace!(target: TARGET, lock = self.name(), context = %me, "released");
            }
        }

        Ok(())
    }

    /// Marks the lock destroyed. Later operations fail with
    /// [`LockError::Destroyed`].
    ///
    /// A deletion-safe lock refuses while held. Otherwise the current owner
    /// loses the lock and every waiter returns [`LockError::Destroyed`].
    /// Destroying an already destroyed lock is a no-op.
    pub fn destroy(&self) -> Status {
        let mut state = self.state.lock();

        if state.destroyed {
            return Ok(());
        }

        if let Some(owner) = state.owner {
            if self.options.deletion_safe {
                return Err(LockError::StillHeld {
                    owner,
                    depth: state.depth,
                });
            }
        }

        state.destroyed = true;
        state.owner = None;
        state.depth = 0;
        let woken = self.handoff.notify_all();
        debug!(target: TARGET, lock = self.name(), woken, "destroyed");
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Whether any context currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    pub fn is_held_by_current(&self) -> bool {
        self.state.lock().owner == Some(context::current())
    }

    pub fn owner(&self) -> Option<ContextId> {
        self.state.lock().owner
    }

    /// The owner's hold count; zero when unlocked
    pub fn depth(&self) -> u32 {
        self.state.lock().depth
    }

    /// Contexts blocked in [`acquire`](Self::acquire), in arrival order
    pub fn waiting(&self) -> Vec<ContextId> {
        let state = self.state.lock();
        let mut waiters = state.waiters.clone();
        waiters.sort_by_key(|waiter| waiter.ticket);
        waiters.into_iter().map(|waiter| waiter.context).collect()
    }
}

impl Default for RawLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RawLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RawLock")
            .field("name", &self.name())
            .field("owner", &state.owner)
            .field("depth", &state.depth)
            .field("waiting", &state.waiters.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

impl RawReentrant for RawLock {
    fn acquire(&self) -> Status {
        RawLock::acquire(self)
    }

    fn try_acquire(&self) -> Status {
        RawLock::try_acquire(self)
    }

    fn release(&self) -> Status {
        RawLock::release(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::time::Duration;

    fn wait_for_waiters(lock: &RawLock, count: usize) {
        while lock.waiting().len() < count {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(16)]
    fn held_until_every_level_is_released(#[case] levels: u32) {
        critsec_logging::setup_log_no_panic_hook();
        let lock = Arc::new(RawLock::new());

        for _ in 0..levels {
            lock.acquire().unwrap();
        }
        assert_eq!(lock.depth(), levels);

        for remaining in (0..levels).rev() {
            let other = lock.clone();
            let attempt = std::thread::spawn(move || other.try_acquire())
                .join()
                .unwrap();
            assert!(matches!(attempt, Err(LockError::WouldBlock { .. })));
            lock.release().unwrap();
            assert_eq!(lock.depth(), remaining);
        }

        assert!(!lock.is_locked());
        let other = lock.clone();
        std::thread::spawn(move || {
            other.try_acquire().unwrap();
            other.release().unwrap();
        })
        .join()
        .unwrap();
    }

    #[test]
    fn release_without_acquire_is_rejected() {
        critsec_logging::setup_log_no_panic_hook();
        let lock = RawLock::new();
        let me = context::current();
        assert_eq!(
            lock.release(),
            Err(LockError::NotOwner {
                caller: me,
                owner: None
            })
        );
    }

    #[test]
    fn release_by_another_context_is_rejected() {
        critsec_logging::setup_log_no_panic_hook();
        let lock = Arc::new(RawLock::new());
        lock.acquire().unwrap();
        let me = context::current();
        let other = lock.clone();
        let result = std::thread::spawn(move || other.release()).join().unwrap();
        assert!(matches!(result, Err(LockError::NotOwner { owner: Some(owner), .. }) if owner == me));
        assert_eq!(lock.depth(), 1);
        lock.release().unwrap();
    }

    #[test]
    fn deletion_safe_lock_refuses_destroy_while_held() {
        critsec_logging::setup_log_no_panic_hook();
        let lock = RawLock::new();
        lock.acquire().unwrap();
        lock.acquire().unwrap();
        assert_eq!(
            lock.destroy(),
            Err(LockError::StillHeld {
                owner: context::current(),
                depth: 2
            })
        );
        lock.release().unwrap();
        lock.release().unwrap();
        lock.destroy().unwrap();
        assert!(lock.is_destroyed());
        assert_eq!(lock.acquire(), Err(LockError::Destroyed));
        assert_eq!(lock.try_acquire(), Err(LockError::Destroyed));
        lock.destroy().unwrap();
    }

    #[rstest]
    #[timeout(std::time::Duration::from_secs(10))]
    fn forced_destroy_wakes_waiters() {
        critsec_logging::setup_log_no_panic_hook();
        let lock = Arc::new(RawLock::with_options(
            LockOptions::new().deletion_safe(false).name("forced"),
        ));
        lock.acquire().unwrap();

        let waiter = {
            let lock = lock.clone();
            std::thread::spawn(move || lock.acquire())
        };
        wait_for_waiters(&lock, 1);

        lock.destroy().unwrap();
        assert_eq!(waiter.join().unwrap(), Err(LockError::Destroyed));
        assert!(lock.waiting().is_empty());
        assert_eq!(lock.release(), Err(LockError::Destroyed));
    }

    #[rstest]
    #[timeout(std::time::Duration::from_secs(10))]
    fn blocked_context_proceeds_once_owner_releases() {
        critsec_logging::setup_log_no_panic_hook();
        let lock = Arc::new(RawLock::new());
        lock.acquire().unwrap();

        let waiter = {
            let lock = lock.clone();
            std::thread::spawn(move || {
                lock.acquire().unwrap();
                let me = context::current();
                lock.release().unwrap();
                me
            })
        };
        wait_for_waiters(&lock, 1);
        let queued = lock.waiting()[0];
        assert!(lock.is_held_by_current());

        lock.release().unwrap();
        assert_eq!(waiter.join().unwrap(), queued);
        assert!(!lock.is_locked());
    }

    fn grant_order(discipline: QueueDiscipline, priorities: &[Priority]) -> Vec<Priority> {
        let lock = Arc::new(RawLock::with_options(
            LockOptions::new().discipline(discipline),
        ));
        let granted = Arc::new(Mutex::new(Vec::new()));
        lock.acquire().unwrap();

        let mut handles = Vec::new();
        for (idx, priority) in priorities.iter().copied().enumerate() {
            let waiter_lock = lock.clone();
            let granted = granted.clone();
            handles.push(std::thread::spawn(move || {
                context::with_priority(priority, || {
                    waiter_lock.acquire().unwrap();
                    granted.lock().push(priority);
                    waiter_lock.release().unwrap();
                })
            }));
            // enqueue one at a time so arrival order is known
            wait_for_waiters(&lock, idx + 1);
        }

        lock.release().unwrap();
        for handle in handles {
            handle.join().unwrap();
        }

        let order = granted.lock().clone();
        order
    }

    #[rstest]
    #[timeout(std::time::Duration::from_secs(10))]
    fn priority_discipline_serves_most_urgent_first() {
        critsec_logging::setup_log_no_panic_hook();
        let order = grant_order(
            QueueDiscipline::Priority,
            &[Priority(150), Priority(10), Priority(100), Priority(10)],
        );
        assert_eq!(
            order,
            vec![Priority(10), Priority(10), Priority(100), Priority(150)]
        );
    }

    #[rstest]
    #[timeout(std::time::Duration::from_secs(10))]
    fn fifo_discipline_ignores_priority() {
        critsec_logging::setup_log_no_panic_hook();
        let priorities = [Priority(150), Priority(10), Priority(100)];
        let order = grant_order(QueueDiscipline::Fifo, &priorities);
        assert_eq!(order, priorities.to_vec());
    }

    #[rstest]
    #[timeout(std::time::Duration::from_secs(10))]
    fn equal_priorities_are_served_in_arrival_order() {
        critsec_logging::setup_log_no_panic_hook();
        let lock = Arc::new(RawLock::new());
        let granted = Arc::new(Mutex::new(Vec::new()));
        lock.acquire().unwrap();

        let mut handles = Vec::new();
        for idx in 0..4 {
            let waiter_lock = lock.clone();
            let granted = granted.clone();
            handles.push(std::thread::spawn(move || {
                waiter_lock.acquire().unwrap();
                granted.lock().push(idx);
                waiter_lock.release().unwrap();
            }));
            wait_for_waiters(&lock, idx + 1);
        }

        lock.release().unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*granted.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn hold_count_saturation_is_reported() {
        critsec_logging::setup_log_no_panic_hook();
        let lock = RawLock::new();
        {
            let mut state = lock.state.lock();
            state.owner = Some(context::current());
            state.depth = u32::MAX;
        }

        assert_eq!(lock.acquire(), Err(LockError::DepthOverflow));
        assert_eq!(lock.try_acquire(), Err(LockError::DepthOverflow));
        assert_eq!(lock.depth(), u32::MAX);
        assert!(lock.is_held_by_current());

        lock.release().unwrap();
        assert_eq!(lock.depth(), u32::MAX - 1);
    }

    #[test]
    fn usable_as_static() {
        static LOCK: RawLock = RawLock::new();
        LOCK.acquire().unwrap();
        assert!(LOCK.is_held_by_current());
        LOCK.release().unwrap();
        assert!(!LOCK.is_locked());
    }
}
