#![cfg_attr(not(test), no_std)]

//! # rtk Cortex-M4 Port
//!
//! Implements the kernel port contract for ARMv7E-M:
//!
//! - critical sections raise BASEPRI to the configured ceiling, leaving
//!   more urgent interrupts live
//! - context switches run in PendSV at the lowest exception priority
//! - floating-point registers S16-S31 are saved lazily, only for threads
//!   whose exception frame carries FP state
//!
//! Frame construction and configuration are portable and tested on the
//! host. Everything touching registers is only built for bare-metal ARM.
//!
//! ## Usage
//!
//! ```ignore
//! static KERNEL: spin::Once<Kernel<CortexM4Port>> = spin::Once::new();
//!
//! let mut cp = cortex_m::Peripherals::take().unwrap();
//! rtk_port_cortex_m4::init(&mut cp.SCB, ISR_STACK.take());
//! let kernel = KERNEL.call_once(|| {
//!     Kernel::builder(CortexM4Port::new(PortConfig::new(5)).unwrap())
//!         .register_thread(producer)
//!         .and_then(|builder| builder.build())
//!         .unwrap()
//! });
//! rtk_port_cortex_m4::start(kernel);
//! loop { cortex_m::asm::wfi(); }
//! ```
//!
//! Every kernel-aware handler, the tick included, runs at or below the
//! ceiling and brackets its body with `Kernel::isr`.

pub mod config;
pub mod frame;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod arch;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use arch::{init, start, CortexM4Port};

pub use config::{PortConfig, PortError};
pub use frame::{build_initial_frame, FrameLayout, FrameOptions};

/// Saved stack pointer of a switched-out thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextPtr(usize);

impl ContextPtr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    /// Context that has never been saved, i.e. the idle thread before the
    /// first switch.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Lay out the initial frame of a thread and return its saved stack pointer.
pub fn initial_context(
    stack: &mut [u32],
    entry: usize,
    arg: usize,
    options: FrameOptions,
) -> rtk_core::KResult<ContextPtr> {
    let base = stack.as_ptr() as usize;
    let sp = build_initial_frame(stack, entry as u32, arg as u32, options)?;
    Ok(ContextPtr::new(base + sp * core::mem::size_of::<u32>()))
}
