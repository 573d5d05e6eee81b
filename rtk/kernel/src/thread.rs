//! Thread descriptors.
//!
//! A descriptor holds everything the kernel knows about a thread: its
//! priority, state flags, saved context, and while blocked, the event it
//! waits on and its remaining timeout. Descriptors live in the kernel thread
//! table and are referred to by [`ThreadId`].

use core::fmt;

use crate::port::ThreadEntry;
use rtk_core::{EventId, Priority, ThreadId, ThreadState, TimeoutCounter, WakeReason};

/// Configuration for creating a thread.
pub struct ThreadConfig {
    /// Thread priority; [`Priority::IDLE`] is rejected.
    pub priority: Priority,
    /// Entry function, entered with `arg` on first switch.
    pub entry: ThreadEntry,
    /// Argument passed to `entry`.
    pub arg: usize,
    /// Stack memory, owned by the thread for the rest of the program.
    pub stack: &'static mut [u32],
    pub name: &'static str,
}

impl ThreadConfig {
    /// Creates a new thread configuration.
    pub fn new(priority: Priority, entry: ThreadEntry, stack: &'static mut [u32]) -> Self {
        Self {
            priority,
            entry,
            arg: 0,
            stack,
            name: "thread",
        }
    }

    /// Sets the argument passed to the entry function.
    pub fn with_arg(mut self, arg: usize) -> Self {
        self.arg = arg;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl fmt::Debug for ThreadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadConfig")
            .field("priority", &self.priority)
            .field("arg", &self.arg)
            .field("stack_words", &self.stack.len())
            .field("name", &self.name)
            .finish()
    }
}

/// A thread known to the kernel.
#[derive(Clone)]
pub struct Thread<C> {
    id: ThreadId,
    priority: Priority,
    name: &'static str,
    pub(crate) state: ThreadState,
    pub(crate) context: C,
    pub(crate) event: Option<EventId>,
    pub(crate) timeout: TimeoutCounter,
    pub(crate) wake: Option<WakeReason>,
}

impl<C: Copy + Default> Thread<C> {
    /// Descriptor for the context that built the kernel.
    ///
    /// Its saved context is filled in by the first switch away from it.
    pub(crate) fn idle() -> Self {
        Self {
            id: ThreadId::IDLE,
            priority: Priority::IDLE,
            name: "idle",
            state: ThreadState::READY | ThreadState::RUNNING,
            context: C::default(),
            event: None,
            timeout: TimeoutCounter::DISARMED,
            wake: None,
        }
    }

    pub(crate) fn new(id: ThreadId, priority: Priority, name: &'static str, context: C) -> Self {
        Self {
            id,
            priority,
            name,
            state: ThreadState::READY,
            context,
            event: None,
            timeout: TimeoutCounter::DISARMED,
            wake: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Event the thread is queued on, if any.
    pub fn event(&self) -> Option<EventId> {
        self.event
    }

    /// Ticks left before the thread times out; 0 when waiting forever.
    pub fn timeout(&self) -> u32 {
        self.timeout.ticks()
    }

    /// Outcome of the most recent wait.
    pub fn wake_reason(&self) -> Option<WakeReason> {
        self.wake
    }

    /// Saved context. Only meaningful while the thread is switched out.
    pub fn context(&self) -> C {
        self.context
    }

    /// Leave the ready set for `flags`.
    pub(crate) fn block(&mut self, flags: ThreadState, event: Option<EventId>, timeout: u32) {
        self.state.remove(ThreadState::READY);
        self.state.insert(flags);
        self.event = event;
        self.timeout = TimeoutCounter::new(timeout);
        self.wake = None;
    }

    /// Drop every blocking flag and record why.
    pub(crate) fn wake(&mut self, reason: WakeReason) {
        self.state.remove(ThreadState::BLOCKED);
        self.state.insert(ThreadState::READY);
        self.event = None;
        self.timeout.disarm();
        self.wake = Some(reason);
    }
}

impl<C> fmt::Debug for Thread<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("event", &self.event)
            .field("timeout", &self.timeout)
            .finish()
    }
}
