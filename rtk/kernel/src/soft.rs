//! Software Port
//!
//! A port without hardware: the interrupt mask is a plain level, a saved
//! context is a small descriptor instead of a stack pointer, and the
//! trampoline swaps descriptors instead of registers. Control never actually
//! transfers, so a single host thread can drive a whole scheduling scenario
//! and observe every decision.
//!
//! The host caller plays the running thread. After a switch it continues as
//! whichever thread is now running. A thread that blocked can still be
//! resumed in place: a resume hook stands in for the interrupts that wake it
//! and is driven from `switch_now` until the blocked caller runs again.
//!
//! A switch requested while the kernel critical section is held only pends,
//! like PendSV under BASEPRI. It fires on the next
//! [`Kernel::run_pending_switch`] once the section is left.
//!
//! `SoftPort` is `!Sync`; one execution context owns the kernel it serves.

use core::cell::{Cell, RefCell};
use core::fmt;

use heapless::Deque;

use crate::critical::InterruptMask;
use crate::kernel::Kernel;
use crate::port::{Port, Switch, ThreadEntry};
use crate::ready::ReadyQueue;
use rtk_core::{KResult, KernelError, ThreadId};

/// Mask level used as the kernel ceiling.
pub const SOFT_CEILING: u32 = 1;

/// Number of switches remembered by [`SoftPort::switches`].
pub const SWITCH_HISTORY: usize = 64;

/// Saved context of a thread on the software port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftContext {
    /// Entry function address, 0 for the idle thread
    pub entry: usize,
    pub arg: usize,
    /// One past the last stack word
    pub stack_top: usize,
    /// Times this context was switched out
    pub saves: u32,
}

/// Stand-in for the interrupts that run while the caller is blocked.
///
/// Returns false once it has nothing left to inject.
pub type ResumeHook = &'static dyn Fn() -> bool;

/// Port that records instead of switching.
#[derive(Default)]
pub struct SoftPort {
    level: Cell<u32>,
    pending: Cell<bool>,
    live: Cell<SoftContext>,
    switch_count: Cell<u32>,
    switches: RefCell<Deque<(ThreadId, ThreadId), SWITCH_HISTORY>>,
    resume: Cell<Option<ResumeHook>>,
}

impl fmt::Debug for SoftPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftPort")
            .field("level", &self.level.get())
            .field("pending", &self.pending.get())
            .field("live", &self.live.get())
            .field("switch_count", &self.switch_count.get())
            .field("resume_hook", &self.resume.get().is_some())
            .finish()
    }
}

impl SoftPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask is at or above the kernel ceiling.
    pub fn is_masked(&self) -> bool {
        self.level.get() >= SOFT_CEILING
    }

    pub fn mask_level(&self) -> u32 {
        self.level.get()
    }

    /// A switch was pended from interrupt context and has not run yet.
    pub fn switch_pending(&self) -> bool {
        self.pending.get()
    }

    /// Context of the thread that would be executing right now.
    pub fn live_context(&self) -> SoftContext {
        self.live.get()
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count.get()
    }

    /// Install the hook driven while a blocked caller is switched out.
    ///
    /// The hook usually wraps [`Kernel::isr`] around a signal, delete or
    /// tick on a `'static` kernel.
    pub fn set_resume_hook(&self, hook: ResumeHook) {
        self.resume.set(Some(hook));
    }

    pub fn clear_resume_hook(&self) {
        self.resume.set(None);
    }

    /// Recent `(from, to)` switches, oldest first.
    pub fn switches(&self) -> heapless::Vec<(ThreadId, ThreadId), SWITCH_HISTORY> {
        self.switches.borrow().iter().copied().collect()
    }

    /// Trampoline body: save the live context, ask the kernel for the
    /// incoming one and make it live.
    fn trampoline(&self, kernel: &dyn Switch<SoftContext>) {
        let from = kernel.running();
        let mut outgoing = self.live.get();
        outgoing.saves = outgoing.saves.wrapping_add(1);

        let incoming = kernel.switch_context(outgoing);
        let to = kernel.running();
        self.live.set(incoming);

        if from != to {
            self.switch_count.set(self.switch_count.get().wrapping_add(1));
            let mut switches = self.switches.borrow_mut();
            if switches.is_full() {
                switches.pop_front();
            }
            let _ = switches.push_back((from, to));
        }
    }

    /// Fire a pended switch if the mask allows it.
    fn fire_pending(&self, kernel: &dyn Switch<SoftContext>) -> bool {
        if !self.pending.get() || self.is_masked() {
            return false;
        }
        self.pending.set(false);
        self.trampoline(kernel);
        true
    }

    /// Drive the resume hook until `caller` owns the processor again.
    ///
    /// A caller that was only preempted, not blocked, is left switched out.
    fn resume(&self, kernel: &dyn Switch<SoftContext>, caller: ThreadId) {
        let Some(hook) = self.resume.get() else {
            return;
        };
        while kernel.running() != caller && kernel.is_blocked(caller) {
            let more = hook();
            self.fire_pending(kernel);
            if !more {
                break;
            }
        }
    }
}

unsafe impl InterruptMask for SoftPort {
    fn raise(&self) -> u32 {
        let previous = self.level.get();
        self.level.set(previous.max(SOFT_CEILING));
        previous
    }

    fn restore(&self, previous: u32) {
        self.level.set(previous);
    }
}

// SAFETY: `SoftPort` is `!Sync`, so the kernel using it is confined to one
// execution context and masking needs no hardware support.
unsafe impl Port for SoftPort {
    type Context = SoftContext;

    fn init_context(
        &self,
        stack: &'static mut [u32],
        entry: ThreadEntry,
        arg: usize,
    ) -> KResult<SoftContext> {
        if stack.is_empty() {
            return Err(KernelError::StackTooSmall);
        }
        let stack_top = stack.as_ptr() as usize + core::mem::size_of_val(stack);
        Ok(SoftContext {
            entry: entry as usize,
            arg,
            stack_top,
            saves: 0,
        })
    }

    fn pend_switch(&self) {
        self.pending.set(true);
    }

    fn switch_now(&self, kernel: &dyn Switch<SoftContext>) {
        self.pending.set(true);
        if self.is_masked() {
            return;
        }
        let caller = kernel.running();
        self.fire_pending(kernel);
        self.resume(kernel, caller);
    }
}

impl<R: ReadyQueue> Kernel<SoftPort, R> {
    /// Run the trampoline if a switch is pended and could fire now, i.e.
    /// no handler is active and the kernel critical section is free.
    ///
    /// When the caller blocked under the critical section, the resume hook
    /// then runs until it is resumed. Returns whether the trampoline ran.
    pub fn run_pending_switch(&self) -> bool {
        if self.critical.is_held() || self.in_isr() {
            return false;
        }
        let caller = self.running();
        if !self.port.fire_pending(self) {
            return false;
        }
        self.port.resume(self, caller);
        true
    }
}

/// Stack memory for tests that create threads.
#[cfg(test)]
pub(crate) fn leak_stack(words: usize) -> &'static mut [u32] {
    std::boxed::Box::leak(std::vec![0u32; words].into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadConfig;
    use core::sync::atomic::{AtomicU32, Ordering};
    use rtk_core::Priority;

    extern "C" fn worker(_arg: usize) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn mask_raise_never_lowers() {
        let port = SoftPort::new();
        assert_eq!(port.raise(), 0);
        assert!(port.is_masked());
        port.level.set(4);
        assert_eq!(port.raise(), 4);
        assert_eq!(port.mask_level(), 4);
        port.restore(0);
        assert!(!port.is_masked());
    }

    #[test]
    fn init_context_records_entry_and_stack() {
        let port = SoftPort::new();
        let stack = leak_stack(32);
        let base = stack.as_ptr() as usize;

        let context = port.init_context(stack, worker, 7).unwrap();
        assert_eq!(context.entry, worker as ThreadEntry as usize);
        assert_eq!(context.arg, 7);
        assert_eq!(context.stack_top, base + 32 * 4);

        assert_eq!(
            port.init_context(leak_stack(0), worker, 0),
            Err(KernelError::StackTooSmall)
        );
    }

    #[test]
    fn pended_switch_fires_after_handlers_return() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        kernel.start();

        kernel.isr_enter();
        let worker = kernel
            .thread_create(
                ThreadConfig::new(Priority::new_unchecked(2), worker, leak_stack(64)).with_arg(11),
            )
            .unwrap();
        assert!(!kernel.run_pending_switch());
        assert!(kernel.isr_leave());

        {
            let _guard = kernel.critical();
            assert!(!kernel.run_pending_switch());
        }
        assert!(kernel.run_pending_switch());
        assert_eq!(kernel.running(), worker);
        assert_eq!(kernel.port().live_context().arg, 11);
        assert_eq!(kernel.port().switches(), [(ThreadId::IDLE, worker)]);

        // Idle's context was saved into its descriptor.
        let idle = kernel.thread(ThreadId::IDLE).unwrap();
        assert_eq!(idle.context().saves, 1);
    }

    static HOOK_CALLS: AtomicU32 = AtomicU32::new(0);

    fn count_call() -> bool {
        HOOK_CALLS.fetch_add(1, Ordering::Relaxed);
        false
    }

    #[test]
    fn preempted_caller_does_not_drive_resume_hook() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        kernel.start();
        kernel.port().set_resume_hook(&count_call);

        let worker = kernel
            .thread_create(ThreadConfig::new(Priority::new_unchecked(2), worker, leak_stack(64)))
            .unwrap();
        assert_eq!(kernel.running(), worker);
        assert_eq!(HOOK_CALLS.load(Ordering::Relaxed), 0);

        // A blocked caller gives the hook one go; it wakes nobody here.
        kernel
            .suspend_running(None, rtk_core::ThreadState::SLEEPING, 5.into())
            .unwrap();
        assert_eq!(HOOK_CALLS.load(Ordering::Relaxed), 1);
        assert_eq!(kernel.running(), ThreadId::IDLE);
    }
}
