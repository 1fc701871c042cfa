use crate::context::ContextId;
use std::fmt::{Debug, Display, Formatter};

/// The outcome of every lock operation. `Ok(())` is the success status.
pub type Status = Result<(), LockError>;

/// The default error type for this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// The lock has been destroyed, or was destroyed while the caller waited on it
    Destroyed,
    /// The calling context released a lock it does not hold
    NotOwner {
        caller: ContextId,
        owner: Option<ContextId>,
    },
    /// A non-blocking acquire found the lock held by another context
    WouldBlock { owner: ContextId },
    /// A deletion-safe lock cannot be destroyed while a context holds it
    StillHeld { owner: ContextId, depth: u32 },
    /// The owner acquired the lock more times than the hold count can represent
    DepthOverflow,
}

impl Display for LockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl std::error::Error for LockError {}
