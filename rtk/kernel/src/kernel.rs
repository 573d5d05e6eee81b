//! Kernel state and construction.
//!
//! All mutable kernel state lives in one [`State`] behind a
//! `critical_section::Mutex`. Public operations enter the critical section
//! once, work on the state, and only call into the port after leaving it.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use heapless::Vec;

use crate::critical::{CriticalGuard, CriticalSection};
use crate::event::EventTable;
use crate::port::Port;
use crate::ready::{PriorityQueue, ReadyQueue};
use crate::sched::Scheduler;
use crate::thread::{Thread, ThreadConfig};
use rtk_core::records::thread as thread_records;
use rtk_core::{
    KResult, KernelConfig, KernelError, Priority, ThreadId, ThreadState, Tick, TraceHook,
    WakeReason, MAX_THREADS,
};

/// Everything guarded by the kernel critical section.
pub(crate) struct State<C, R> {
    pub(crate) threads: Vec<Thread<C>, MAX_THREADS>,
    pub(crate) ready: R,
    pub(crate) events: EventTable,
    pub(crate) sched: Scheduler,
    pub(crate) tick: Tick,
}

impl<C: Copy + Default, R: ReadyQueue> State<C, R> {
    fn new() -> Self {
        let mut state = Self {
            threads: Vec::new(),
            ready: R::default(),
            events: EventTable::new(),
            sched: Scheduler::new(),
            tick: Tick::ZERO,
        };
        // An empty table always has room.
        let _ = state.threads.push(Thread::idle());
        state.ready.insert(ThreadId::IDLE, Priority::IDLE);
        state
    }

    pub(crate) fn thread(&self, id: ThreadId) -> KResult<&Thread<C>> {
        self.threads.get(id.index()).ok_or(KernelError::InvalidThread)
    }

    pub(crate) fn thread_mut(&mut self, id: ThreadId) -> KResult<&mut Thread<C>> {
        self.threads
            .get_mut(id.index())
            .ok_or(KernelError::InvalidThread)
    }

    fn add_thread(&mut self, priority: Priority, name: &'static str, context: C) -> KResult<ThreadId> {
        if self.threads.is_full() {
            return Err(KernelError::TooManyThreads);
        }
        let id = ThreadId::new(self.threads.len() as u8);
        self.threads
            .push(Thread::new(id, priority, name, context))
            .map_err(|_| KernelError::TooManyThreads)?;
        self.ready.insert(id, priority);
        Ok(id)
    }

    /// Make a blocked thread ready, recording why.
    ///
    /// The caller has already unlinked it from any wait list.
    pub(crate) fn wake_thread(&mut self, id: ThreadId, reason: WakeReason) -> Option<Priority> {
        let thread = self.threads.get_mut(id.index())?;
        thread.wake(reason);
        let priority = thread.priority();
        self.ready.insert(id, priority);
        Some(priority)
    }

    pub(crate) fn running_priority(&self) -> Priority {
        self.threads
            .get(self.sched.running.index())
            .map(|thread| thread.priority())
            .unwrap_or(Priority::IDLE)
    }
}

/// The kernel.
///
/// Generic over the architecture [`Port`] and the [`ReadyQueue`] policy.
/// Build one with [`Kernel::builder`].
pub struct Kernel<P: Port, R: ReadyQueue = PriorityQueue> {
    pub(crate) port: P,
    pub(crate) config: KernelConfig,
    pub(crate) critical: CriticalSection,
    pub(crate) state: Mutex<RefCell<State<P::Context, R>>>,
    pub(crate) trace: Option<TraceHook>,
}

impl<P: Port> Kernel<P> {
    /// Creates a new kernel builder using the default ready queue.
    pub fn builder(port: P) -> KernelBuilder<P> {
        KernelBuilder::new(port)
    }
}

impl<P: Port, R: ReadyQueue> Kernel<P, R> {
    fn new(port: P, config: KernelConfig, trace: Option<TraceHook>) -> Self {
        Self {
            port,
            config,
            critical: CriticalSection::new(),
            state: Mutex::new(RefCell::new(State::new())),
            trace,
        }
    }

    /// Run `f` on the kernel state inside the critical section.
    ///
    /// Must not be nested: the state is borrowed mutably for the duration.
    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut State<P::Context, R>) -> T) -> T {
        let guard = self.critical.enter(&self.port);
        let mut state = self.state.borrow_ref_mut(guard.token());
        f(&mut state)
    }

    pub(crate) fn emit_trace(&self, record: u8, payload: &[u8]) {
        if let Some(hook) = self.trace {
            hook(record, payload);
        }
    }

    /// Enter the kernel critical section.
    ///
    /// Nests; the mask is restored when the outermost guard drops. Blocking
    /// calls fail while a guard is held.
    pub fn critical(&self) -> CriticalGuard<'_, P> {
        self.critical.enter(&self.port)
    }

    /// Run `f` inside the kernel critical section.
    pub fn with_critical<T>(&self, f: impl FnOnce(critical_section::CriticalSection<'_>) -> T) -> T {
        let guard = self.critical.enter(&self.port);
        f(guard.token())
    }

    /// Create a thread. It becomes ready immediately and preempts the caller
    /// if more urgent and the kernel is started.
    pub fn thread_create(&self, config: ThreadConfig) -> KResult<ThreadId> {
        if config.priority.is_idle() {
            return Err(KernelError::InvalidPriority);
        }
        let ThreadConfig {
            priority,
            entry,
            arg,
            stack,
            name,
        } = config;

        let context = self.port.init_context(stack, entry, arg)?;
        let (id, started) = self.with_state(|state| {
            let id = state.add_thread(priority, name, context)?;
            Ok::<_, KernelError>((id, state.sched.started))
        })?;

        self.emit_trace(thread_records::CREATE, &[id.0, priority.raw()]);
        log::debug!("{}: created {} '{}' at {}", self.config.name, id, name, priority);

        if started {
            self.reschedule();
        }
        Ok(id)
    }

    /// Enable preemption. The most urgent ready thread gets the processor
    /// before this returns to the idle thread.
    pub fn start(&self) {
        let threads = self.with_state(|state| {
            state.sched.started = true;
            state.threads.len()
        });
        log::info!("{}: started with {} threads", self.config.name, threads);
        self.reschedule();
    }

    pub fn is_started(&self) -> bool {
        self.with_state(|state| state.sched.started)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    // Introspection

    /// Thread currently owning the processor.
    pub fn running(&self) -> ThreadId {
        self.with_state(|state| state.sched.running)
    }

    /// Most urgent ready thread.
    pub fn highest_ready(&self) -> ThreadId {
        self.with_state(|state| state.ready.highest().unwrap_or(ThreadId::IDLE))
    }

    /// Candidate chosen by the last scheduling decision.
    pub fn high_prio(&self) -> ThreadId {
        self.with_state(|state| state.sched.high_prio)
    }

    pub fn thread_state(&self, id: ThreadId) -> KResult<ThreadState> {
        self.with_state(|state| state.thread(id).map(|thread| thread.state()))
    }

    pub fn thread_priority(&self, id: ThreadId) -> KResult<Priority> {
        self.with_state(|state| state.thread(id).map(|thread| thread.priority()))
    }

    /// Outcome of the thread's most recent wait.
    pub fn last_wake(&self, id: ThreadId) -> KResult<Option<WakeReason>> {
        self.with_state(|state| state.thread(id).map(|thread| thread.wake_reason()))
    }

    /// Ticks left before the thread's wait expires; 0 for no timeout.
    pub fn thread_timeout(&self, id: ThreadId) -> KResult<u32> {
        self.with_state(|state| state.thread(id).map(|thread| thread.timeout()))
    }

    /// Copy of a thread descriptor.
    pub fn thread(&self, id: ThreadId) -> KResult<Thread<P::Context>> {
        self.with_state(|state| state.thread(id).cloned())
    }

    pub fn thread_count(&self) -> usize {
        self.with_state(|state| state.threads.len())
    }

    pub fn is_ready(&self, id: ThreadId) -> bool {
        self.with_state(|state| state.ready.contains(id))
    }

    pub fn ready_count(&self) -> usize {
        self.with_state(|state| state.ready.len())
    }

    pub fn tick_count(&self) -> Tick {
        self.with_state(|state| state.tick)
    }

    /// Nesting depth of the kernel critical section.
    pub fn critical_depth(&self) -> u32 {
        self.critical.depth()
    }
}

impl<P: Port, R: ReadyQueue> fmt::Debug for Kernel<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.config.name)
            .field("critical_depth", &self.critical.depth())
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a kernel.
pub struct KernelBuilder<P: Port, R: ReadyQueue = PriorityQueue> {
    port: P,
    config: KernelConfig,
    threads: Vec<ThreadConfig, MAX_THREADS>,
    trace: Option<TraceHook>,
    _ready: core::marker::PhantomData<R>,
}

impl<P: Port> KernelBuilder<P> {
    /// Creates a new kernel builder.
    pub fn new(port: P) -> Self {
        Self {
            port,
            config: KernelConfig::default(),
            threads: Vec::new(),
            trace: None,
            _ready: core::marker::PhantomData,
        }
    }
}

impl<P: Port, R: ReadyQueue> KernelBuilder<P, R> {
    /// Replaces the ready queue policy.
    pub fn with_ready_queue<Q: ReadyQueue>(self) -> KernelBuilder<P, Q> {
        KernelBuilder {
            port: self.port,
            config: self.config,
            threads: self.threads,
            trace: self.trace,
            _ready: core::marker::PhantomData,
        }
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the trace hook for kernel records.
    pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Registers a thread to be created by [`KernelBuilder::build`].
    pub fn register_thread(mut self, config: ThreadConfig) -> KResult<Self> {
        if config.priority.is_idle() {
            return Err(KernelError::InvalidPriority);
        }
        // One slot stays reserved for the idle thread.
        if self.threads.len() + 1 >= MAX_THREADS {
            return Err(KernelError::TooManyThreads);
        }
        self.threads
            .push(config)
            .map_err(|_| KernelError::TooManyThreads)?;
        Ok(self)
    }

    /// Builds the kernel. The calling context becomes the idle thread.
    pub fn build(self) -> KResult<Kernel<P, R>> {
        let kernel = Kernel::new(self.port, self.config, self.trace);
        for config in self.threads {
            kernel.thread_create(config)?;
        }
        log::debug!("{}: kernel built", kernel.config.name);
        Ok(kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft::{leak_stack, SoftPort};

    extern "C" fn worker(_arg: usize) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn config(priority: u8) -> ThreadConfig {
        ThreadConfig::new(Priority::new_unchecked(priority), worker, leak_stack(64))
    }

    #[test]
    fn builder_registers_idle_as_running() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        assert_eq!(kernel.running(), ThreadId::IDLE);
        assert_eq!(kernel.thread_count(), 1);
        assert_eq!(kernel.thread_priority(ThreadId::IDLE), Ok(Priority::IDLE));
        let state = kernel.thread_state(ThreadId::IDLE).unwrap();
        assert!(state.is_running());
        assert!(state.is_ready());
        assert!(!kernel.is_started());
    }

    #[test]
    fn registered_threads_wait_for_start() {
        let kernel = Kernel::builder(SoftPort::new())
            .register_thread(config(3))
            .unwrap()
            .register_thread(config(1).with_name("urgent"))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(kernel.thread_count(), 3);
        assert_eq!(kernel.highest_ready(), ThreadId(2));
        assert_eq!(kernel.running(), ThreadId::IDLE);

        kernel.start();
        assert_eq!(kernel.running(), ThreadId(2));
        assert_eq!(kernel.thread(ThreadId(2)).unwrap().name(), "urgent");
        assert!(!kernel.thread_state(ThreadId::IDLE).unwrap().is_running());
    }

    #[test]
    fn idle_priority_is_rejected() {
        let result = Kernel::builder(SoftPort::new()).register_thread(ThreadConfig::new(
            Priority::IDLE,
            worker,
            leak_stack(64),
        ));
        assert!(matches!(result, Err(KernelError::InvalidPriority)));
    }

    #[test]
    fn thread_table_fills_up() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        for _ in 1..MAX_THREADS {
            kernel.thread_create(config(10)).unwrap();
        }
        assert_eq!(
            kernel.thread_create(config(10)),
            Err(KernelError::TooManyThreads)
        );
    }

    #[test]
    fn unknown_thread_is_reported() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        assert_eq!(
            kernel.thread_state(ThreadId(9)),
            Err(KernelError::InvalidThread)
        );
    }

    #[test]
    fn critical_guard_nests() {
        let kernel = Kernel::builder(SoftPort::new()).build().unwrap();
        let outer = kernel.critical();
        {
            let _inner = kernel.critical();
            assert_eq!(kernel.critical_depth(), 2);
        }
        assert_eq!(kernel.critical_depth(), 1);
        drop(outer);
        assert_eq!(kernel.critical_depth(), 0);
        assert!(!kernel.port().is_masked());
    }
}
