//! Thread and event identifiers

use core::fmt;

/// Index of a thread descriptor in the kernel thread table.
///
/// Thread 0 is always the idle thread, i.e. the context that built the
/// kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u8);

impl ThreadId {
    /// The idle thread
    pub const IDLE: ThreadId = ThreadId(0);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ThreadId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "T{}", self.0);
    }
}

/// Handle to an event slot.
///
/// The generation changes every time a slot is reused after a delete, so a
/// handle kept past `event_delete` no longer matches the live slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventId {
    index: u8,
    generation: u16,
}

impl EventId {
    pub const fn new(index: u8, generation: u16) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> usize {
        self.index as usize
    }

    pub const fn generation(self) -> u16 {
        self.generation
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}.{}", self.index, self.generation)
    }
}

/// Type tag of an event.
///
/// The tag only feeds sanity checks; waking behaviour is identical for every
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// Slot was deleted or never created
    Invalid,
    Semaphore,
    Mutex,
    Queue,
    Flags,
    Mailbox,
    /// Application-defined primitive
    User(u8),
}

impl EventKind {
    pub const fn is_valid(self) -> bool {
        !matches!(self, EventKind::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_handles_compare_generation() {
        let first = EventId::new(3, 0);
        let reused = EventId::new(3, 1);
        assert_eq!(first.index(), reused.index());
        assert_ne!(first, reused);
    }

    #[test]
    fn invalid_kind_is_not_valid() {
        assert!(!EventKind::Invalid.is_valid());
        assert!(EventKind::Semaphore.is_valid());
        assert!(EventKind::User(9).is_valid());
    }
}
