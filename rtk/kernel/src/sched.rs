//! Scheduling decisions, interrupt nesting and context switching.
//!
//! A switch is only ever decided at two points: at thread level after the
//! running thread changed the ready set (`reschedule`), and on the outermost
//! interrupt exit (`isr_leave`). Both defer to the port; the port's
//! trampoline then calls back into [`Switch::switch_context`].

use crate::kernel::{Kernel, State};
use crate::port::{Port, Switch};
use crate::ready::ReadyQueue;
use rtk_core::records::{isr, sched};
use rtk_core::{KResult, KernelError, Priority, ThreadId, ThreadState};

/// Preemption bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    /// Thread owning the processor
    pub(crate) running: ThreadId,
    /// Candidate chosen by the last scheduling decision
    pub(crate) high_prio: ThreadId,
    pub(crate) isr_nesting: u8,
    pub(crate) lock_nesting: u8,
    pub(crate) started: bool,
}

impl Scheduler {
    pub(crate) const fn new() -> Self {
        Self {
            running: ThreadId::IDLE,
            high_prio: ThreadId::IDLE,
            isr_nesting: 0,
            lock_nesting: 0,
            started: false,
        }
    }

    /// Preemption may happen right now.
    fn can_preempt(&self) -> bool {
        self.started && self.isr_nesting == 0 && self.lock_nesting == 0
    }
}

impl<C: Copy + Default, R: ReadyQueue> State<C, R> {
    /// Recompute the switch candidate. Returns true when it differs from the
    /// running thread.
    fn plan_next(&mut self) -> bool {
        let next = self.ready.highest().unwrap_or(ThreadId::IDLE);
        self.sched.high_prio = next;
        next != self.sched.running
    }

    /// Switch candidate with its priority.
    fn candidate(&self) -> (ThreadId, Priority) {
        let next = self.sched.high_prio;
        let priority = self
            .thread(next)
            .map(|thread| thread.priority())
            .unwrap_or(Priority::IDLE);
        (next, priority)
    }
}

/// Decision made on interrupt exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitPlan {
    /// Still nested, or nothing to do
    Stay,
    /// Pend the trampoline for this candidate
    Switch(ThreadId, Priority),
}

impl<P: Port, R: ReadyQueue> Kernel<P, R> {
    /// Give the processor to the most urgent ready thread.
    ///
    /// Thread-level only. Does nothing from interrupt context, with the
    /// scheduler locked, or before [`Kernel::start`]. When it switches away,
    /// it returns once the calling thread runs again.
    pub fn reschedule(&self) {
        let next = self.with_state(|state| {
            if state.sched.can_preempt() && state.plan_next() {
                Some(state.candidate())
            } else {
                None
            }
        });

        if let Some((next, priority)) = next {
            self.emit_trace(sched::NEXT, &[next.0, priority.raw()]);
            self.port.switch_now(self);
        }
    }

    /// Record entry into an interrupt handler.
    ///
    /// Every handler that calls the kernel brackets its body with
    /// `isr_enter` / [`Kernel::isr_leave`].
    pub fn isr_enter(&self) {
        let nesting = self.with_state(|state| {
            debug_assert!(state.sched.isr_nesting < u8::MAX, "interrupt nesting overflow");
            state.sched.isr_nesting = state.sched.isr_nesting.saturating_add(1);
            state.sched.isr_nesting
        });
        self.emit_trace(isr::ENTER, &[nesting]);
    }

    /// Record exit from an interrupt handler.
    ///
    /// On the outermost exit, if a more urgent thread became ready and the
    /// scheduler is not locked, the trampoline is pended. Returns whether a
    /// switch was pended.
    pub fn isr_leave(&self) -> bool {
        let (nesting, plan) = self.with_state(|state| {
            debug_assert!(state.sched.isr_nesting > 0, "isr_leave without isr_enter");
            if state.sched.isr_nesting == 0 {
                return (0, ExitPlan::Stay);
            }
            state.sched.isr_nesting -= 1;

            let plan = if state.sched.can_preempt() && state.plan_next() {
                let (next, priority) = state.candidate();
                ExitPlan::Switch(next, priority)
            } else {
                ExitPlan::Stay
            };
            (state.sched.isr_nesting, plan)
        });
        self.emit_trace(isr::EXIT, &[nesting]);

        match plan {
            ExitPlan::Switch(next, priority) => {
                log::trace!("isr exit pends switch to {}", next);
                self.emit_trace(sched::NEXT, &[next.0, priority.raw()]);
                self.port.pend_switch();
                true
            }
            ExitPlan::Stay => false,
        }
    }

    /// Run `handler` as an interrupt handler body.
    ///
    /// Returns whether the exit pended a switch.
    pub fn isr<T>(&self, handler: impl FnOnce(&Self) -> T) -> (T, bool) {
        self.isr_enter();
        let value = handler(self);
        let pended = self.isr_leave();
        (value, pended)
    }

    pub fn isr_nesting(&self) -> u8 {
        self.with_state(|state| state.sched.isr_nesting)
    }

    pub fn in_isr(&self) -> bool {
        self.isr_nesting() > 0
    }

    /// Prevent preemption until the matching [`Kernel::sched_unlock`].
    ///
    /// Interrupts stay enabled. Locks nest.
    pub fn sched_lock(&self) -> KResult<()> {
        if !self.config.sched_lock {
            return Err(KernelError::LockDisabled);
        }
        let depth = self.with_state(|state| {
            debug_assert!(state.sched.lock_nesting < u8::MAX, "scheduler lock overflow");
            state.sched.lock_nesting = state.sched.lock_nesting.saturating_add(1);
            state.sched.lock_nesting
        });
        self.emit_trace(sched::LOCK, &[depth]);
        Ok(())
    }

    /// Release one level of scheduler lock. Releasing the last level
    /// reschedules.
    pub fn sched_unlock(&self) -> KResult<()> {
        if !self.config.sched_lock {
            return Err(KernelError::LockDisabled);
        }
        let depth = self.with_state(|state| {
            if state.sched.lock_nesting == 0 {
                return Err(KernelError::NotLocked);
            }
            state.sched.lock_nesting -= 1;
            Ok(state.sched.lock_nesting)
        })?;
        self.emit_trace(sched::UNLOCK, &[depth]);

        if depth == 0 {
            self.reschedule();
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.with_state(|state| state.sched.lock_nesting > 0)
    }
}

impl<P: Port, R: ReadyQueue> Switch<P::Context> for Kernel<P, R> {
    fn running(&self) -> ThreadId {
        Kernel::running(self)
    }

    fn is_blocked(&self, thread: ThreadId) -> bool {
        self.thread_state(thread)
            .map(|state| state.is_blocked())
            .unwrap_or(false)
    }

    fn switch_context(&self, outgoing: P::Context) -> P::Context {
        let (from, to, incoming) = self.with_state(|state| {
            let from = state.sched.running;
            let to = state.sched.high_prio;

            let Ok(current) = state.thread_mut(from) else {
                return (from, from, outgoing);
            };
            current.context = outgoing;
            if to == from {
                return (from, from, outgoing);
            }

            debug_assert!(
                state.thread(to).map(|t| t.state().is_ready()).unwrap_or(false),
                "switch candidate is not ready"
            );
            let Ok(next) = state.thread_mut(to) else {
                return (from, from, outgoing);
            };
            next.state.insert(ThreadState::RUNNING);
            let incoming = next.context;

            if let Ok(current) = state.thread_mut(from) {
                current.state.remove(ThreadState::RUNNING);
            }
            state.sched.running = to;
            (from, to, incoming)
        });

        if from != to {
            log::trace!("switch {} -> {}", from, to);
            self.emit_trace(sched::SWITCH, &[from.0, to.0]);
        }
        incoming
    }
}
