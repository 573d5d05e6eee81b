//! Thread priority levels
//!
//! Lower numeric values are more urgent: priority 0 preempts everything,
//! [`Priority::IDLE`] runs only when nothing else is ready.

use core::fmt;
use crate::{KernelError, KResult};

/// Type-safe thread priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Most urgent priority level
    pub const HIGHEST: Priority = Priority(0);

    /// Least urgent priority usable by application threads
    pub const LOWEST: Priority = Priority(u8::MAX - 1);

    /// Reserved for the idle thread
    pub const IDLE: Priority = Priority(u8::MAX);

    /// Create a priority for an application thread
    pub fn new(priority: u8) -> KResult<Self> {
        if priority == Self::IDLE.0 {
            Err(KernelError::InvalidPriority)
        } else {
            Ok(Priority(priority))
        }
    }

    /// Create priority without validation (const fn)
    pub const fn new_unchecked(priority: u8) -> Self {
        Priority(priority)
    }

    /// Get the raw priority value
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// True for the reserved idle level
    pub const fn is_idle(self) -> bool {
        self.0 == Self::IDLE.0
    }

    /// Strictly more urgent than `other`
    pub const fn preempts(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Priority {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Priority({})", self.0);
    }
}

/// Macro to create compile-time priority constants
#[macro_export]
macro_rules! priority {
    ($value:literal) => {
        $crate::Priority::new_unchecked($value)
    };
}
