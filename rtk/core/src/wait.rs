//! Wait outcomes and timeouts

use core::fmt;
use crate::{KernelError, KResult};

/// Why a blocked thread was made ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeReason {
    /// Woken by a matching signal
    Signaled,
    /// The timeout expired first
    Timeout,
    /// The event was deleted while the thread waited
    Deleted,
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeReason::Signaled => write!(f, "signaled"),
            WakeReason::Timeout => write!(f, "timed out"),
            WakeReason::Deleted => write!(f, "event deleted"),
        }
    }
}

/// How long a blocking call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Wait until signaled or deleted
    Infinite,
    /// Wait at most this many ticks
    Ticks(u32),
}

impl Timeout {
    /// Tick count stored in a thread descriptor; 0 stands for infinite.
    pub fn to_counter(self) -> KResult<u32> {
        match self {
            Timeout::Infinite => Ok(0),
            Timeout::Ticks(0) => Err(KernelError::ZeroTimeout),
            Timeout::Ticks(ticks) => Ok(ticks),
        }
    }
}

impl From<u32> for Timeout {
    fn from(ticks: u32) -> Self {
        Timeout::Ticks(ticks)
    }
}
