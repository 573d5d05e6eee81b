//! Architecture Port Contract
//!
//! A port supplies three things: interrupt masking for critical sections,
//! the initial saved context of a new thread, and the context-switch
//! trampoline. The trampoline runs at the lowest interrupt priority so that
//! it only executes once every other handler has returned.
//!
//! Trampoline contract, in order:
//!
//! 1. mask interrupts up to the kernel ceiling
//! 2. save the outgoing thread's volatile state and hand the resulting
//!    context to [`Switch::switch_context`]
//! 3. restore the state described by the returned context
//! 4. unmask and resume the incoming thread
//!
//! A thread entered for the first time must look exactly as if it had been
//! switched out at the first instruction of its entry function.

use crate::critical::InterruptMask;
use rtk_core::{KResult, ThreadId};

/// Entry point of a kernel thread. Threads never return.
pub type ThreadEntry = extern "C" fn(arg: usize) -> !;

/// Kernel side of the trampoline.
pub trait Switch<C> {
    /// Thread currently owning the processor.
    fn running(&self) -> ThreadId;

    /// `thread` is waiting, sleeping or both.
    fn is_blocked(&self, thread: ThreadId) -> bool;

    /// Store `outgoing` as the running thread's saved context, promote the
    /// pending candidate to running and return its saved context.
    ///
    /// When no switch is pending the running thread is kept and `outgoing`
    /// is handed straight back.
    fn switch_context(&self, outgoing: C) -> C;
}

/// Per-architecture services required by the kernel.
///
/// # Safety
///
/// Inherits the contract of [`InterruptMask`]. Additionally `switch_now` and
/// the pended trampoline must only call [`Switch::switch_context`] from a
/// context that is not interrupted by another kernel user.
pub unsafe trait Port: InterruptMask {
    /// Opaque saved context; on hardware the saved stack pointer.
    type Context: Copy + Default + Send;

    /// Lay out the initial context of a new thread on `stack`.
    fn init_context(
        &self,
        stack: &'static mut [u32],
        entry: ThreadEntry,
        arg: usize,
    ) -> KResult<Self::Context>;

    /// Request the trampoline to run once all handlers have returned.
    ///
    /// Called from interrupt context on the outermost exit.
    fn pend_switch(&self);

    /// Switch from thread level.
    ///
    /// On return the calling thread has been resumed again. Ports that
    /// trampoline through an exception pend it here and use the kernel
    /// registered at start; `kernel` is the same instance. Called with the
    /// kernel critical section held, the switch must wait until it is left.
    fn switch_now(&self, kernel: &dyn Switch<Self::Context>);
}
