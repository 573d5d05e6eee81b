//! Events: the blocking primitive every synchronization object builds on.
//!
//! An event is a FIFO list of waiting threads plus a type tag. Waking is
//! strictly in arrival order; priority only decides who runs afterwards.
//!
//! Waiting is split in two halves so a port can return to the caller between
//! them: [`Kernel::suspend_running`] blocks the running thread and lets the
//! scheduler switch away, [`Kernel::resume_outcome`] reads the wake reason
//! once the thread runs again. [`Kernel::event_wait`] does both.

use heapless::{Deque, Vec};

use crate::kernel::{Kernel, State};
use crate::port::Port;
use crate::ready::ReadyQueue;
use rtk_core::records::event as event_records;
use rtk_core::{
    EventId, EventKind, KResult, KernelError, ThreadId, ThreadState, Timeout, WakeReason,
    MAX_EVENTS, MAX_THREADS,
};

/// Trace payload index used for a sleep with no event.
const NO_EVENT: u8 = 0xFF;

pub(crate) type WaitList = Deque<ThreadId, MAX_THREADS>;

/// One slot of the event table.
#[derive(Debug)]
pub(crate) struct EventSlot {
    kind: EventKind,
    generation: u16,
    waiters: WaitList,
}

impl EventSlot {
    fn handle(&self, index: usize) -> EventId {
        EventId::new(index as u8, self.generation)
    }
}

/// Fixed table of event slots. Deleted slots are reused under a new
/// generation once their wait list is empty.
#[derive(Debug)]
pub(crate) struct EventTable {
    slots: Vec<EventSlot, MAX_EVENTS>,
}

impl EventTable {
    pub(crate) const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn create(&mut self, kind: EventKind) -> KResult<EventId> {
        if !kind.is_valid() {
            return Err(KernelError::InvalidEvent);
        }

        // A deleted slot can only hold waiters after an unchecked wait on a
        // stale handle. Those threads stay queued where they are.
        let reusable = self
            .slots
            .iter()
            .position(|slot| !slot.kind.is_valid() && slot.waiters.is_empty());
        if let Some(index) = reusable {
            let slot = &mut self.slots[index];
            slot.kind = kind;
            slot.generation = slot.generation.wrapping_add(1);
            return Ok(slot.handle(index));
        }

        let index = self.slots.len();
        self.slots
            .push(EventSlot {
                kind,
                generation: 0,
                waiters: Deque::new(),
            })
            .map_err(|_| KernelError::TooManyEvents)?;
        Ok(EventId::new(index as u8, 0))
    }

    /// Live slot for `id`: same generation and not deleted.
    pub(crate) fn live_mut(&mut self, id: EventId) -> Option<&mut EventSlot> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation() && slot.kind.is_valid())
    }

    fn live(&self, id: EventId) -> Option<&EventSlot> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation() && slot.kind.is_valid())
    }

    /// Slot for `id` without tag or generation checks.
    fn slot_mut(&mut self, id: EventId) -> Option<&mut EventSlot> {
        self.slots.get_mut(id.index())
    }

    fn kind(&self, id: EventId) -> EventKind {
        match self.slots.get(id.index()) {
            Some(slot) if slot.generation == id.generation() => slot.kind,
            _ => EventKind::Invalid,
        }
    }

    /// Unlink `thread` from the wait list of `id`. Returns true if it was
    /// queued there.
    pub(crate) fn remove_waiter(&mut self, id: EventId, thread: ThreadId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return false;
        };

        let before = slot.waiters.len();
        let mut kept = WaitList::new();
        while let Some(waiter) = slot.waiters.pop_front() {
            if waiter != thread {
                // Same capacity as the source list.
                let _ = kept.push_back(waiter);
            }
        }
        slot.waiters = kept;
        slot.waiters.len() != before
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.kind.is_valid()).count()
    }
}

impl<C: Copy + Default, R: ReadyQueue> State<C, R> {
    /// Release the head of the wait list of `id` with `reason`.
    fn release_head(&mut self, id: EventId, reason: WakeReason) -> Option<ThreadId> {
        let thread = self.events.live_mut(id)?.waiters.pop_front()?;
        self.wake_thread(thread, reason);
        Some(thread)
    }
}

impl<P: Port, R: ReadyQueue> Kernel<P, R> {
    /// Create an event of the given kind with an empty wait list.
    pub fn event_create(&self, kind: EventKind) -> KResult<EventId> {
        let id = self.with_state(|state| state.events.create(kind))?;
        log::debug!("created {:?} event {}", kind, id);
        Ok(id)
    }

    /// Block the running thread, optionally on `event`, for at most
    /// `timeout` ticks, and switch to the next ready thread.
    ///
    /// `flags` selects [`ThreadState::WAITING`], [`ThreadState::SLEEPING`]
    /// or both. Returns the blocked thread; its wake reason is available
    /// from [`Kernel::resume_outcome`] once it runs again.
    ///
    /// May be called with the kernel critical section held, so a primitive
    /// can test its condition and block atomically. The switch is pended
    /// and happens when the section is left.
    pub fn suspend_running(
        &self,
        event: Option<EventId>,
        flags: ThreadState,
        timeout: Timeout,
    ) -> KResult<ThreadId> {
        let flags = flags & ThreadState::BLOCKED;
        if flags.is_empty() {
            return Err(KernelError::InvalidWaitFlags);
        }
        let ticks = timeout.to_counter()?;

        let safe_checks = self.config.safe_checks;
        let me = self.with_state(|state| {
            if state.sched.isr_nesting > 0 {
                return Err(KernelError::InIsr);
            }
            if state.sched.lock_nesting > 0 {
                return Err(KernelError::SchedulerLocked);
            }
            let me = state.sched.running;
            if me == ThreadId::IDLE {
                return Err(KernelError::IdleCannotBlock);
            }

            if let Some(id) = event {
                let slot = if safe_checks {
                    state.events.live_mut(id)
                } else {
                    state.events.slot_mut(id)
                };
                let slot = slot.ok_or(KernelError::InvalidEvent)?;
                if !slot.kind.is_valid() {
                    log::warn!("{} waits on deleted event {}", me, id);
                }
                // A thread sits in at most one list, so this cannot overflow.
                slot.waiters
                    .push_back(me)
                    .map_err(|_| KernelError::TooManyThreads)?;
            }

            state.ready.remove(me);
            state.thread_mut(me)?.block(flags, event, ticks);
            Ok(me)
        })?;

        let index = event.map(|id| id.index() as u8).unwrap_or(NO_EVENT);
        self.emit_trace(event_records::WAIT, &[me.0, index, flags.bits()]);
        log::trace!("{} blocked on {:?} for {:?}", me, event, timeout);

        self.reschedule();
        Ok(me)
    }

    /// Wake reason recorded for `thread`, which must be running again.
    pub fn resume_outcome(&self, thread: ThreadId) -> KResult<WakeReason> {
        self.with_state(|state| {
            if state.sched.running != thread {
                return Err(KernelError::NotRunning);
            }
            state.thread(thread)?.wake_reason().ok_or(KernelError::NotWoken)
        })
    }

    /// Block the running thread on `event` and report why it woke.
    ///
    /// Returns `Ok(WakeReason::Signaled)` on a signal,
    /// `Ok(WakeReason::Timeout)` when the timeout expired first and
    /// `Ok(WakeReason::Deleted)` when the event was deleted meanwhile.
    ///
    /// `Err(KernelError::NotRunning)` after the block means the port
    /// returned from `switch_now` before the caller was resumed, as
    /// [`SoftPort`](crate::SoftPort) does without a resume hook. The thread
    /// stays blocked.
    pub fn event_wait(
        &self,
        event: Option<EventId>,
        flags: ThreadState,
        timeout: Timeout,
    ) -> KResult<WakeReason> {
        if self.critical.is_held() {
            return Err(KernelError::InCriticalSection);
        }
        let me = self.suspend_running(event, flags, timeout)?;
        self.resume_outcome(me)
    }

    /// Wake the longest-waiting thread on `event` with `reason`.
    ///
    /// Returns the woken thread, or `None` when nobody waits. Never
    /// switches by itself; thread-level callers follow with
    /// [`Kernel::reschedule`], interrupt handlers rely on
    /// [`Kernel::isr_leave`]. Signaling a deleted event does nothing.
    pub fn event_signal(&self, event: EventId, reason: WakeReason) -> Option<ThreadId> {
        let outcome = self.with_state(|state| {
            if state.events.live(event).is_none() {
                return Err(());
            }
            Ok(state.release_head(event, reason))
        });

        match outcome {
            Ok(Some(thread)) => {
                self.emit_trace(
                    event_records::SIGNAL,
                    &[thread.0, event.index() as u8, reason as u8],
                );
                log::trace!("{} released {} ({})", event, thread, reason);
                Some(thread)
            }
            Ok(None) => None,
            Err(()) => {
                log::warn!("signal on deleted event {}", event);
                None
            }
        }
    }

    /// Delete `event`, waking every waiter with [`WakeReason::Deleted`] in
    /// FIFO order.
    ///
    /// Returns true when a woken thread is more urgent than the caller, so
    /// the caller should reschedule. Deleting an already deleted event
    /// returns false.
    pub fn event_delete(&self, event: EventId) -> bool {
        let outcome = self.with_state(|state| {
            if state.events.live(event).is_none() {
                return None;
            }
            let current = state.running_priority();
            let mut woken: u8 = 0;
            let mut preempt = false;
            while let Some(thread) = state.release_head(event, WakeReason::Deleted) {
                woken += 1;
                if let Ok(waiter) = state.thread(thread) {
                    preempt |= waiter.priority().preempts(current);
                }
            }
            if let Some(slot) = state.events.live_mut(event) {
                slot.kind = EventKind::Invalid;
            }
            Some((woken, preempt))
        });

        match outcome {
            Some((woken, preempt)) => {
                self.emit_trace(event_records::DELETE, &[event.index() as u8, woken]);
                log::debug!("deleted event {}, woke {}", event, woken);
                preempt
            }
            None => {
                log::warn!("delete of deleted event {}", event);
                false
            }
        }
    }

    /// Type tag of `event`; [`EventKind::Invalid`] once deleted.
    pub fn event_kind(&self, event: EventId) -> EventKind {
        self.with_state(|state| state.events.kind(event))
    }

    /// Number of threads queued on `event`.
    pub fn waiters(&self, event: EventId) -> usize {
        self.with_state(|state| {
            state
                .events
                .live(event)
                .map(|slot| slot.waiters.len())
                .unwrap_or(0)
        })
    }

    /// Threads queued on `event`, longest waiting first.
    pub fn wait_list(&self, event: EventId) -> Vec<ThreadId, MAX_THREADS> {
        self.with_state(|state| {
            let mut list = Vec::new();
            if let Some(slot) = state.events.live(event) {
                for waiter in slot.waiters.iter() {
                    let _ = list.push(*waiter);
                }
            }
            list
        })
    }

    pub fn event_count(&self) -> usize {
        self.with_state(|state| state.events.live_count())
    }
}
