use strum::{Display, EnumString};

/// How a lock chooses which waiter receives it on release
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum QueueDiscipline {
    /// Highest priority waiter first, ties in arrival order
    #[default]
    Priority,
    /// Strict arrival order
    Fifo,
}

/// Creation options for a [`RawLock`](crate::RawLock).
///
/// The defaults are priority queueing and deletion safety, matching
/// [`LockOptions::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub(crate) discipline: QueueDiscipline,
    pub(crate) deletion_safe: bool,
    pub(crate) name: Option<&'static str>,
}

impl LockOptions {
    pub const DEFAULT: LockOptions = LockOptions::new();

    pub const fn new() -> Self {
        Self {
            discipline: QueueDiscipline::Priority,
            deletion_safe: true,
            name: None,
        }
    }

    pub const fn discipline(mut self, discipline: QueueDiscipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// When set, destroying the lock while a context holds it is refused with
    /// [`LockError::StillHeld`](crate::LockError::StillHeld). When unset the
    /// destroy goes through and every waiter is woken with
    /// [`LockError::Destroyed`](crate::LockError::Destroyed).
    pub const fn deletion_safe(mut self, deletion_safe: bool) -> Self {
        self.deletion_safe = deletion_safe;
        self
    }

    /// A label attached to this lock's log events
    pub const fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn get_discipline(&self) -> QueueDiscipline {
        self.discipline
    }

    pub fn is_deletion_safe(&self) -> bool {
        self.deletion_safe
    }

    pub fn get_name(&self) -> Option<&'static str> {
        self.name
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::new()
    }
}
