//! Thread state flags

use core::fmt;

bitflags::bitflags! {
    /// Orthogonal thread state flags.
    ///
    /// Legal combinations:
    ///
    /// | flags                | meaning                                  |
    /// |----------------------|------------------------------------------|
    /// | `READY`              | in the ready queue                       |
    /// | `READY \| RUNNING`   | in the ready queue and owning the CPU    |
    /// | `WAITING`            | blocked on an event without timeout      |
    /// | `SLEEPING`           | timed sleep, no event                    |
    /// | `WAITING \| SLEEPING`| blocked on an event with a timeout       |
    ///
    /// `RUNNING` also stays set on a thread that has just blocked until the
    /// trampoline switches it out.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ThreadState: u8 {
        const READY = 0x01;
        const RUNNING = 0x02;
        const WAITING = 0x04;
        const SLEEPING = 0x08;
    }
}

impl ThreadState {
    /// Flags a blocking call may request
    pub const BLOCKED: ThreadState = ThreadState::WAITING.union(ThreadState::SLEEPING);

    pub const fn is_ready(self) -> bool {
        self.contains(Self::READY)
    }

    pub const fn is_running(self) -> bool {
        self.contains(Self::RUNNING)
    }

    pub const fn is_waiting(self) -> bool {
        self.contains(Self::WAITING)
    }

    pub const fn is_sleeping(self) -> bool {
        self.contains(Self::SLEEPING)
    }

    /// Blocked on an event, in a timed sleep, or both
    pub const fn is_blocked(self) -> bool {
        self.intersects(Self::BLOCKED)
    }

    /// Checks the combinations listed on the type
    pub const fn is_legal(self) -> bool {
        self.is_ready() != self.is_blocked()
    }
}

impl Default for ThreadState {
    fn default() -> Self {
        ThreadState::READY
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ThreadState {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ThreadState({=u8:b})", self.bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_combinations() {
        assert!(ThreadState::READY.is_legal());
        assert!((ThreadState::READY | ThreadState::RUNNING).is_legal());
        assert!(ThreadState::WAITING.is_legal());
        assert!(ThreadState::SLEEPING.is_legal());
        assert!(ThreadState::BLOCKED.is_legal());
        assert!((ThreadState::WAITING | ThreadState::RUNNING).is_legal());
    }

    #[test]
    fn illegal_combinations() {
        assert!(!ThreadState::empty().is_legal());
        assert!(!ThreadState::RUNNING.is_legal());
        assert!(!(ThreadState::READY | ThreadState::WAITING).is_legal());
        assert!(!(ThreadState::READY | ThreadState::SLEEPING).is_legal());
    }

    #[test]
    fn accessors() {
        let state = ThreadState::WAITING | ThreadState::SLEEPING;
        assert!(state.is_waiting());
        assert!(state.is_sleeping());
        assert!(state.is_blocked());
        assert!(!state.is_ready());
        assert!(!state.is_running());
    }
}
