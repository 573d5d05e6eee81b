#![cfg_attr(not(test), no_std)]

//! # rtk-kernel - Event and Preemption Core
//!
//! Priority-based preemptive scheduling for single-core microcontrollers.
//! Threads block on *events* (the primitive under every semaphore, mutex and
//! queue) and are switched by a deferred trampoline supplied by the
//! architecture port.
//!
//! ## Architecture
//!
//! **Critical section**: nestable masking up to the kernel priority ceiling.
//! Interrupts above the ceiling stay live but must not call the kernel.
//!
//! **Events**: FIFO wait lists. Wake order follows arrival, not priority.
//!
//! **Preemption**: handlers are bracketed by `isr_enter`/`isr_leave`; the
//! outermost exit pends the trampoline when a more urgent thread is ready.
//!
//! ## Module Overview
//!
//! - [`critical`] - Nested interrupt masking
//! - [`port`] - Trampoline contract implemented once per architecture
//! - [`ready`] - Ready queue interface and default priority list
//! - [`thread`] - Thread descriptors
//! - [`event`] - Event table and wait/signal/delete
//! - [`sched`] - Interrupt nesting, scheduler lock and context switching
//! - [`time`] - Tick processing and sleep
//! - [`kernel`] - Kernel state and builder
//! - [`soft`] - Software port for host execution and tests

pub mod critical;
pub mod event;
pub mod kernel;
pub mod port;
pub mod ready;
pub mod sched;
pub mod soft;
pub mod thread;
pub mod time;

pub use critical::{CriticalGuard, CriticalSection, InterruptMask};
pub use kernel::{Kernel, KernelBuilder};
pub use port::{Port, Switch, ThreadEntry};
pub use ready::{PriorityQueue, ReadyQueue};
pub use soft::{ResumeHook, SoftContext, SoftPort};
pub use thread::{Thread, ThreadConfig};

pub use rtk_core::records;
pub use rtk_core::{
    EventId, EventKind, KResult, KernelConfig, KernelError, Priority, ThreadId, ThreadState, Tick,
    Timeout, TraceHook, WakeReason,
};
