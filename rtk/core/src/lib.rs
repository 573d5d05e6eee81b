#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! # RTK Core
//!
//! Plain data types shared by the kernel and its architecture ports:
//! identifiers, priorities, thread state flags, wake reasons, tick counters,
//! configuration and trace record identifiers.
//!
//! Nothing in this crate touches hardware or global state.

use core::fmt;

pub mod config;
pub mod ids;
pub mod priority;
pub mod records;
pub mod state;
pub mod time;
pub mod wait;

pub use config::*;
pub use ids::*;
pub use priority::*;
pub use records::TraceHook;
pub use state::*;
pub use time::*;
pub use wait::*;

/// Kernel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of thread descriptors, idle thread included.
pub const MAX_THREADS: usize = 32;

/// Maximum number of live events.
pub const MAX_EVENTS: usize = 32;

/// Result type used throughout the kernel
pub type KResult<T> = Result<T, KernelError>;

/// Programming errors reported by kernel operations.
///
/// Wake outcomes are not errors; they are reported as [`WakeReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Event handle is unknown, deleted or of the wrong kind
    InvalidEvent,
    /// Thread id does not name a created thread
    InvalidThread,
    /// Priority is reserved or out of range
    InvalidPriority,
    /// Wait flags select neither WAITING nor SLEEPING
    InvalidWaitFlags,
    /// Finite timeout of zero ticks
    ZeroTimeout,
    /// Blocking call issued from interrupt context
    InIsr,
    /// Blocking call issued while the scheduler is locked
    SchedulerLocked,
    /// Blocking call issued while holding a critical section
    InCriticalSection,
    /// The idle thread must never block
    IdleCannotBlock,
    /// Scheduler unlock without a matching lock
    NotLocked,
    /// Scheduler locking is disabled in the configuration
    LockDisabled,
    /// Thread table is full
    TooManyThreads,
    /// Event table is full
    TooManyEvents,
    /// Stack too small for the initial context frame
    StackTooSmall,
    /// Thread was asked for its wake reason while not running
    NotRunning,
    /// Thread resumed without a recorded wake reason
    NotWoken,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::InvalidEvent => write!(f, "Invalid or deleted event"),
            KernelError::InvalidThread => write!(f, "Unknown thread"),
            KernelError::InvalidPriority => write!(f, "Invalid priority level"),
            KernelError::InvalidWaitFlags => write!(f, "Wait flags select no blocking state"),
            KernelError::ZeroTimeout => write!(f, "Zero-length finite timeout"),
            KernelError::InIsr => write!(f, "Blocking call from interrupt context"),
            KernelError::SchedulerLocked => write!(f, "Blocking call with scheduler locked"),
            KernelError::InCriticalSection => write!(f, "Blocking call inside critical section"),
            KernelError::IdleCannotBlock => write!(f, "Idle thread cannot block"),
            KernelError::NotLocked => write!(f, "Scheduler is not locked"),
            KernelError::LockDisabled => write!(f, "Scheduler lock disabled"),
            KernelError::TooManyThreads => write!(f, "Thread table is full"),
            KernelError::TooManyEvents => write!(f, "Event table is full"),
            KernelError::StackTooSmall => write!(f, "Stack too small for initial frame"),
            KernelError::NotRunning => write!(f, "Thread is not running"),
            KernelError::NotWoken => write!(f, "Thread resumed without wake reason"),
        }
    }
}

#[cfg(all(feature = "std", not(test)))]
extern crate std;

#[cfg(feature = "std")]
impl std::error::Error for KernelError {}

#[cfg(feature = "defmt")]
impl defmt::Format for KernelError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            KernelError::InvalidEvent => defmt::write!(fmt, "InvalidEvent"),
            KernelError::InvalidThread => defmt::write!(fmt, "InvalidThread"),
            KernelError::InvalidPriority => defmt::write!(fmt, "InvalidPriority"),
            KernelError::InvalidWaitFlags => defmt::write!(fmt, "InvalidWaitFlags"),
            KernelError::ZeroTimeout => defmt::write!(fmt, "ZeroTimeout"),
            KernelError::InIsr => defmt::write!(fmt, "InIsr"),
            KernelError::SchedulerLocked => defmt::write!(fmt, "SchedulerLocked"),
            KernelError::InCriticalSection => defmt::write!(fmt, "InCriticalSection"),
            KernelError::IdleCannotBlock => defmt::write!(fmt, "IdleCannotBlock"),
            KernelError::NotLocked => defmt::write!(fmt, "NotLocked"),
            KernelError::LockDisabled => defmt::write!(fmt, "LockDisabled"),
            KernelError::TooManyThreads => defmt::write!(fmt, "TooManyThreads"),
            KernelError::TooManyEvents => defmt::write!(fmt, "TooManyEvents"),
            KernelError::StackTooSmall => defmt::write!(fmt, "StackTooSmall"),
            KernelError::NotRunning => defmt::write!(fmt, "NotRunning"),
            KernelError::NotWoken => defmt::write!(fmt, "NotWoken"),
        }
    }
}
