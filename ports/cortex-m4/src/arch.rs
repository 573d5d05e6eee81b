//! Register-level port: BASEPRI masking, PendSV trampoline and start-up.

use core::arch::{asm, global_asm};
use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::SCB;
use cortex_m::register::{basepri, basepri_max};
use rtk_core::KResult;
use rtk_kernel::{InterruptMask, Kernel, Port, ReadyQueue, Switch, ThreadEntry};

use crate::config::{PortConfig, PortError};
use crate::{initial_context, ContextPtr};

/// Kernel served by PendSV, registered by [`start`].
static KERNEL: spin::Once<&'static (dyn Switch<ContextPtr> + Sync)> = spin::Once::new();

/// BASEPRI value loaded by PendSV while it swaps stacks.
#[no_mangle]
static RTK_CEILING: AtomicU32 = AtomicU32::new(0);

/// Cortex-M4 implementation of the kernel port.
#[derive(Debug)]
pub struct CortexM4Port {
    config: PortConfig,
    basepri: u8,
}

impl CortexM4Port {
    pub fn new(config: PortConfig) -> Result<Self, PortError> {
        config.validate()?;
        Ok(Self {
            basepri: config.basepri(),
            config,
        })
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }
}

unsafe impl InterruptMask for CortexM4Port {
    fn raise(&self) -> u32 {
        let previous = basepri::read();
        // Never lowers an already stricter mask.
        basepri_max::write(self.basepri);
        u32::from(previous)
    }

    fn restore(&self, previous: u32) {
        // SAFETY: restores a value read by `raise`.
        unsafe { basepri::write(previous as u8) };
    }
}

// SAFETY: BASEPRI masks every interrupt allowed to call the kernel, and
// PendSV runs below all of them.
unsafe impl Port for CortexM4Port {
    type Context = ContextPtr;

    fn init_context(
        &self,
        stack: &'static mut [u32],
        entry: ThreadEntry,
        arg: usize,
    ) -> KResult<ContextPtr> {
        initial_context(stack, entry as usize, arg, self.config.frame_options())
    }

    fn pend_switch(&self) {
        SCB::set_pendsv();
    }

    fn switch_now(&self, _kernel: &dyn Switch<ContextPtr>) {
        // PendSV is the lowest priority exception, so it is taken here unless
        // the caller still holds a critical section, in which case it is
        // taken when the mask drops.
        SCB::set_pendsv();
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }
}

/// Called from PendSV with the outgoing thread's saved stack pointer;
/// returns the incoming one.
#[no_mangle]
extern "C" fn rtk_switch_context(sp: u32) -> u32 {
    match KERNEL.get() {
        Some(kernel) => {
            let incoming = kernel.switch_context(ContextPtr::new(sp as usize));
            debug_assert!(!incoming.is_null(), "switch to a thread with no saved context");
            incoming.addr() as u32
        }
        None => sp,
    }
}

#[cfg(target_abi = "eabihf")]
global_asm!(
    ".section .text.PendSV, \"ax\"",
    ".global PendSV",
    ".type PendSV, %function",
    ".thumb_func",
    "PendSV:",
    "    mrs     r0, psp",
    "    isb",
    "    ldr     r1, =RTK_CEILING",
    "    ldr     r1, [r1]",
    "    msr     basepri, r1",
    "    dsb",
    "    isb",
    // Bit 4 of EXC_RETURN is clear when the frame carries FP state.
    "    tst     lr, #0x10",
    "    it      eq",
    "    vstmdbeq r0!, {{s16-s31}}",
    "    stmdb   r0!, {{r4-r11, lr}}",
    "    bl      rtk_switch_context",
    "    ldmia   r0!, {{r4-r11, lr}}",
    "    tst     lr, #0x10",
    "    it      eq",
    "    vldmiaeq r0!, {{s16-s31}}",
    "    msr     psp, r0",
    "    isb",
    "    movs    r1, #0",
    "    msr     basepri, r1",
    "    bx      lr",
    ".size PendSV, . - PendSV",
);

#[cfg(not(target_abi = "eabihf"))]
global_asm!(
    ".section .text.PendSV, \"ax\"",
    ".global PendSV",
    ".type PendSV, %function",
    ".thumb_func",
    "PendSV:",
    "    mrs     r0, psp",
    "    isb",
    "    ldr     r1, =RTK_CEILING",
    "    ldr     r1, [r1]",
    "    msr     basepri, r1",
    "    dsb",
    "    isb",
    "    stmdb   r0!, {{r4-r11, lr}}",
    "    bl      rtk_switch_context",
    "    ldmia   r0!, {{r4-r11, lr}}",
    "    msr     psp, r0",
    "    isb",
    "    movs    r1, #0",
    "    msr     basepri, r1",
    "    bx      lr",
    ".size PendSV, . - PendSV",
);

/// Prepare the core for threads: the running code moves to the process
/// stack, handlers get `isr_stack`, and PendSV drops to the lowest priority.
///
/// Call once from `main`, before any thread is created.
pub fn init(scb: &mut SCB, isr_stack: &'static mut [u32]) {
    let end = isr_stack.as_ptr() as usize + core::mem::size_of_val(isr_stack);
    let top = end & !0x7;

    cortex_m::interrupt::free(|_| {
        // SAFETY: the current stack is copied to PSP before the switch, and
        // MSP is only replaced once nothing runs on it.
        unsafe {
            asm!(
                "mrs {tmp}, msp",
                "msr psp, {tmp}",
                "mrs {tmp}, control",
                "orr {tmp}, {tmp}, #2",
                "msr control, {tmp}",
                "isb",
                "msr msp, {top}",
                tmp = out(reg) _,
                top = in(reg) top,
            );
            scb.set_priority(SystemHandler::PendSV, 0xFF);
        }
    });
    log::debug!("cortex-m4: isr stack top {:#010x}", top);
}

/// Hand the processor to the kernel.
///
/// Registers `kernel` with PendSV and starts preemption. Returns in the idle
/// thread once no other thread is ready.
pub fn start<R>(kernel: &'static Kernel<CortexM4Port, R>)
where
    R: ReadyQueue + Send + 'static,
{
    RTK_CEILING.store(u32::from(kernel.port().basepri), Ordering::Relaxed);
    let registered: &'static (dyn Switch<ContextPtr> + Sync) = kernel;
    KERNEL.call_once(|| registered);
    log::info!(
        "cortex-m4: starting, ceiling {} (basepri {:#04x})",
        kernel.port().config.ceiling,
        kernel.port().basepri
    );
    kernel.start();
}
