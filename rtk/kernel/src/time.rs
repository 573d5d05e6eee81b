//! Tick processing and sleeping.

use crate::kernel::Kernel;
use crate::port::Port;
use crate::ready::ReadyQueue;
use heapless::Vec;
use rtk_core::records::event as event_records;
use rtk_core::{KResult, ThreadId, ThreadState, Timeout, WakeReason, MAX_THREADS};

impl<P: Port, R: ReadyQueue> Kernel<P, R> {
    /// Advance the tick count and expire timeouts.
    ///
    /// Expired waiters leave their event's wait list and become ready with
    /// [`WakeReason::Timeout`]. Call from the tick interrupt, inside
    /// `isr_enter` / `isr_leave`. Returns true when an expired thread is
    /// more urgent than the running one.
    pub fn tick(&self) -> bool {
        let (expired, preempt) = self.with_state(|state| {
            state.tick.increment();
            let current = state.running_priority();
            let mut expired: Vec<ThreadId, MAX_THREADS> = Vec::new();
            let mut preempt = false;

            for index in 1..state.threads.len() {
                let (id, event) = {
                    let thread = &mut state.threads[index];
                    if !thread.state.is_blocked() || !thread.timeout.decrement() {
                        continue;
                    }
                    (thread.id(), thread.event)
                };

                if let Some(event) = event {
                    state.events.remove_waiter(event, id);
                }
                if let Some(priority) = state.wake_thread(id, WakeReason::Timeout) {
                    preempt |= priority.preempts(current);
                }
                let _ = expired.push(id);
            }
            (expired, preempt)
        });

        for id in &expired {
            self.emit_trace(event_records::TIMEOUT, &[id.0]);
            log::trace!("{} timed out", id);
        }
        preempt
    }

    /// Block the running thread for `ticks` ticks.
    pub fn sleep(&self, ticks: u32) -> KResult<()> {
        self.event_wait(None, ThreadState::SLEEPING, Timeout::Ticks(ticks))
            .map(|_| ())
    }

    /// Block the running thread for at least `millis` milliseconds.
    pub fn sleep_ms(&self, millis: u32) -> KResult<()> {
        let ticks = self.config.ticks_from_millis(millis).max(1);
        self.sleep(ticks)
    }
}

#[cfg(test)]
mod tests {
    use crate::soft::{leak_stack, SoftPort};
    use crate::thread::ThreadConfig;
    use crate::Kernel;
    use rtk_core::{KernelError, Priority, ThreadId, Tick};

    extern "C" fn worker(_arg: usize) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn sleep_wakes_after_exact_ticks() {
        let kernel = Kernel::builder(SoftPort::new())
            .register_thread(ThreadConfig::new(Priority::new_unchecked(3), worker, leak_stack(64)))
            .unwrap()
            .build()
            .unwrap();
        kernel.start();
        let me = kernel.running();

        let sleeper = kernel
            .suspend_running(None, rtk_core::ThreadState::SLEEPING, 3.into())
            .unwrap();
        assert_eq!(sleeper, me);

        assert!(!kernel.tick());
        assert!(!kernel.tick());
        assert!(kernel.thread_state(me).unwrap().is_sleeping());
        assert!(kernel.tick());
        assert!(kernel.is_ready(me));
        assert_eq!(kernel.tick_count(), Tick::new(3));

        kernel.reschedule();
        assert_eq!(kernel.running(), me);
    }

    #[test]
    fn zero_tick_sleep_is_rejected() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        assert_eq!(kernel.sleep(0), Err(KernelError::ZeroTimeout));
    }

    #[test]
    fn tick_ignores_unarmed_threads() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        for _ in 0..5 {
            assert!(!kernel.tick());
        }
        assert_eq!(kernel.running(), ThreadId::IDLE);
    }
}
