//! Tick counters

use core::fmt;

/// Remaining ticks of a thread's timeout; zero means no timeout is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeoutCounter(u32);

impl TimeoutCounter {
    /// No timeout armed
    pub const DISARMED: Self = Self(0);

    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u32 {
        self.0
    }

    pub const fn is_armed(self) -> bool {
        self.0 != 0
    }

    /// Decrement an armed counter by one tick.
    ///
    /// Returns true on the tick that brings it to zero. A disarmed counter
    /// never expires.
    pub fn decrement(&mut self) -> bool {
        if self.0 > 0 {
            self.0 -= 1;
            self.0 == 0
        } else {
            false
        }
    }

    pub fn disarm(&mut self) {
        self.0 = 0;
    }
}

impl fmt::Display for TimeoutCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TimeoutCounter {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ticks", self.0);
    }
}

/// Monotonic system tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Tick(u64);

impl Tick {
    /// Zero tick
    pub const ZERO: Self = Self(0);

    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "tick:{}", self.0);
    }
}
