//! Trace record identifiers shared across the workspace.
//!
//! Records are delivered to a [`TraceHook`] as a record id plus a short
//! little-endian payload described next to each constant.

/// Receives kernel trace records. Called after the kernel state update that
/// produced the record, outside the critical section.
pub type TraceHook = fn(record: u8, payload: &[u8]);

/// Scheduler related record identifiers.
pub mod sched {
    /// Scheduler locked: `[depth]`.
    pub const LOCK: u8 = 50;
    /// Scheduler unlocked: `[depth]`.
    pub const UNLOCK: u8 = 51;
    /// New highest-priority candidate chosen: `[thread, priority]`.
    pub const NEXT: u8 = 52;
    /// Trampoline swapped contexts: `[from, to]`.
    pub const SWITCH: u8 = 53;
}

/// Event record identifiers.
pub mod event {
    /// Thread blocked: `[thread, event index, flags]`; event index is
    /// `0xFF` for a pure sleep.
    pub const WAIT: u8 = 60;
    /// Waiter released: `[thread, event index, reason]`.
    pub const SIGNAL: u8 = 61;
    /// Event deleted: `[event index, woken count]`.
    pub const DELETE: u8 = 62;
    /// Timeout expired: `[thread]`.
    pub const TIMEOUT: u8 = 63;
}

/// Interrupt bookkeeping record identifiers.
pub mod isr {
    /// Handler entered: `[nesting]`.
    pub const ENTER: u8 = 70;
    /// Handler left: `[nesting]`.
    pub const EXIT: u8 = 71;
}

/// Thread lifecycle record identifiers.
pub mod thread {
    /// Thread created: `[thread, priority]`.
    pub const CREATE: u8 = 80;
}
