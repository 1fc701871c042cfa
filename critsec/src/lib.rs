//! # critsec
//!
//! A reentrant, priority-queued lock and a scope guard that brackets critical
//! regions with it.
//!
//! ## Features
//!
//! * **Reentrancy**: the owning context may acquire a lock repeatedly and must
//!   release it as many times before anyone else can take it
//! * **Priority queueing**: when a lock is released, the most urgent waiting
//!   context gets it next, ties going to whoever arrived first
//! * **Guaranteed release**: [`RegionGuard`] and [`critical_region!`] release on
//!   every way out of a scope, unwinding included
//! * **Explicit status**: every operation returns a [`Status`]; there is no
//!   shared last-error slot
//!
//! ## Example
//!
//! ```
//! use critsec::{critical_region, LockError, ReentrantLock};
//!
//! static STATE_LOCK: ReentrantLock = ReentrantLock::new();
//!
//! fn reconfigure() -> Result<(), LockError> {
//!     critical_region!(&STATE_LOCK => {
//!         // nested regions on the same lock do not block
//!         critical_region!(&STATE_LOCK => {})?;
//!     })
//! }
//! ```
//!
//! ## Important Notes
//!
//! * Contexts are OS threads; see [`context`] for ids and priorities
//! * Acquiring blocks without a timeout
//! * Nothing orders multiple locks. Taking two locks in different orders on
//!   different contexts can deadlock

#![deny(
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
#![forbid(unsafe_code)]

pub mod context;
mod error;
mod guard;
mod lock;
mod options;
mod raw;

pub use context::{ContextId, Priority};
pub use error::{LockError, Status};
pub use guard::RegionGuard;
pub use lock::ReentrantLock;
pub use options::{LockOptions, QueueDiscipline};
pub use raw::{RawLock, RawReentrant};
