//! A counting semaphore built on top of the event primitive, the way
//! synchronization objects are expected to use it.

use core::cell::Cell;

use critical_section::Mutex;
use rtk_kernel::{
    EventId, EventKind, KResult, Kernel, Priority, SoftPort, ThreadConfig, ThreadId, ThreadState,
    Timeout, WakeReason,
};

struct Semaphore<'k> {
    kernel: &'k Kernel<SoftPort>,
    event: EventId,
    count: Mutex<Cell<u32>>,
}

/// Outcome of `take`: either the count was available, or the caller is now
/// blocked and must collect its wake reason once it runs again.
#[derive(Debug, PartialEq, Eq)]
enum Take {
    Acquired,
    Blocked(ThreadId),
}

impl<'k> Semaphore<'k> {
    fn new(kernel: &'k Kernel<SoftPort>, count: u32) -> KResult<Self> {
        Ok(Self {
            kernel,
            event: kernel.event_create(EventKind::Semaphore)?,
            count: Mutex::new(Cell::new(count)),
        })
    }

    fn take(&self, timeout: Timeout) -> KResult<Take> {
        let me = {
            let guard = self.kernel.critical();
            let count = self.count.borrow(guard.token());
            if count.get() > 0 {
                count.set(count.get() - 1);
                return Ok(Take::Acquired);
            }
            self.kernel
                .suspend_running(Some(self.event), ThreadState::WAITING, timeout)?
        };
        // The switch away was held back by the section; it fires now.
        self.kernel.run_pending_switch();
        Ok(Take::Blocked(me))
    }

    /// Hand the count straight to the oldest waiter, or bank it.
    fn give(&self) -> Option<ThreadId> {
        let woken = self.kernel.with_critical(|cs| {
            let woken = self.kernel.event_signal(self.event, WakeReason::Signaled);
            if woken.is_none() {
                let count = self.count.borrow(cs);
                count.set(count.get() + 1);
            }
            woken
        });
        if woken.is_some() && !self.kernel.in_isr() {
            self.kernel.reschedule();
        }
        woken
    }

    fn count(&self) -> u32 {
        self.kernel.with_critical(|cs| self.count.borrow(cs).get())
    }

    fn delete(self) -> bool {
        self.kernel.event_delete(self.event)
    }
}

extern "C" fn worker(_arg: usize) -> ! {
    loop {
        std::hint::spin_loop();
    }
}

fn spawn(kernel: &Kernel<SoftPort>, priority: u8) -> ThreadId {
    let stack = Box::leak(vec![0u32; 128].into_boxed_slice());
    kernel
        .thread_create(ThreadConfig::new(Priority::new(priority).unwrap(), worker, stack))
        .unwrap()
}

fn started() -> Kernel<SoftPort> {
    let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
    kernel.start();
    kernel
}

#[test]
fn available_count_does_not_block() {
    let kernel = started();
    let sem = Semaphore::new(&kernel, 2).unwrap();
    let thread = spawn(&kernel, 5);

    assert_eq!(sem.take(Timeout::Infinite), Ok(Take::Acquired));
    assert_eq!(sem.take(Timeout::Infinite), Ok(Take::Acquired));
    assert_eq!(sem.count(), 0);
    assert_eq!(kernel.running(), thread);
}

#[test]
fn give_hands_count_to_waiter() {
    let kernel = started();
    let sem = Semaphore::new(&kernel, 0).unwrap();
    let consumer = spawn(&kernel, 2);

    assert_eq!(sem.take(Timeout::Infinite), Ok(Take::Blocked(consumer)));
    assert_eq!(kernel.running(), ThreadId::IDLE);
    assert_eq!(kernel.critical_depth(), 0);

    // Idle gives; the more urgent consumer takes over immediately.
    assert_eq!(sem.give(), Some(consumer));
    assert_eq!(kernel.running(), consumer);
    assert_eq!(kernel.resume_outcome(consumer), Ok(WakeReason::Signaled));
    assert_eq!(sem.count(), 0);

    assert_eq!(sem.give(), None);
    assert_eq!(sem.count(), 1);
}

#[test]
fn take_times_out() {
    let kernel = started();
    let sem = Semaphore::new(&kernel, 0).unwrap();
    let consumer = spawn(&kernel, 2);

    assert_eq!(sem.take(Timeout::Ticks(3)), Ok(Take::Blocked(consumer)));
    for _ in 0..3 {
        kernel.isr(|k| k.tick());
        kernel.run_pending_switch();
    }
    assert_eq!(kernel.running(), consumer);
    assert_eq!(kernel.resume_outcome(consumer), Ok(WakeReason::Timeout));
    assert_eq!(kernel.waiters(sem.event), 0);
}

#[test]
fn blocked_take_switches_only_after_section_is_left() {
    let kernel = started();
    let sem = Semaphore::new(&kernel, 0).unwrap();
    let consumer = spawn(&kernel, 2);

    let guard = kernel.critical();
    let me = kernel
        .suspend_running(Some(sem.event), ThreadState::WAITING, Timeout::Infinite)
        .unwrap();
    assert_eq!(me, consumer);
    assert_eq!(kernel.running(), consumer);
    assert!(kernel.port().switch_pending());
    assert_eq!(kernel.port().switch_count(), 1);
    assert!(!kernel.run_pending_switch());

    drop(guard);
    assert!(kernel.run_pending_switch());
    assert_eq!(kernel.running(), ThreadId::IDLE);
    assert_eq!(kernel.port().switches().last(), Some(&(consumer, ThreadId::IDLE)));
}

#[test]
fn give_from_interrupt_switches_on_exit() {
    let kernel = started();
    let sem = Semaphore::new(&kernel, 0).unwrap();
    let consumer = spawn(&kernel, 2);
    sem.take(Timeout::Infinite).unwrap();

    let (woken, pended) = kernel.isr(|_| sem.give());
    assert_eq!(woken, Some(consumer));
    assert!(pended);
    assert!(kernel.run_pending_switch());
    assert_eq!(kernel.running(), consumer);
}

#[test]
fn delete_releases_every_waiter() {
    let kernel = started();
    let sem = Semaphore::new(&kernel, 0).unwrap();
    let first = spawn(&kernel, 3);
    sem.take(Timeout::Infinite).unwrap();
    let second = spawn(&kernel, 3);
    sem.take(Timeout::Infinite).unwrap();

    assert!(sem.delete());
    kernel.reschedule();
    assert_eq!(kernel.running(), first);
    assert_eq!(kernel.resume_outcome(first), Ok(WakeReason::Deleted));
    assert_eq!(kernel.last_wake(second), Ok(Some(WakeReason::Deleted)));
}
