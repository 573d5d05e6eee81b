//! Initial Context Frames
//!
//! A thread that has never run is given a stack that looks exactly like the
//! stack of a thread switched out by PendSV at the first instruction of its
//! entry function. Ascending from the saved stack pointer:
//!
//! | words | contents                         | pushed by              |
//! |-------|----------------------------------|------------------------|
//! | 8     | R4-R11                           | PendSV                 |
//! | 1     | EXC_RETURN                       | PendSV                 |
//! | 16    | S16-S31 (FPU frame only)         | PendSV                 |
//! | 8     | R0-R3, R12, LR, PC, xPSR         | exception entry        |
//! | 18    | S0-S15, FPSCR, reserved (FPU)    | exception entry        |
//!
//! The end of the frame is 8-byte aligned, so the thread starts with an
//! AAPCS-aligned stack pointer.
//!
//! This module is plain data manipulation and builds on any target.

use rtk_core::{KResult, KernelError};

/// xPSR with only the Thumb bit set.
pub const INITIAL_XPSR: u32 = 0x0100_0000;

/// Return to thread mode on PSP, basic frame.
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Return to thread mode on PSP, extended (FPU) frame.
pub const EXC_RETURN_THREAD_PSP_FPU: u32 = 0xFFFF_FFED;

/// Words in a frame without floating-point state.
pub const BASIC_FRAME_WORDS: usize = 17;

/// Words in a frame with floating-point state.
pub const FPU_FRAME_WORDS: usize = 51;

/// Options for [`build_initial_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOptions {
    /// Lay out an extended frame with S0-S31 and FPSCR.
    pub fpu: bool,
    /// Fill unused register slots with recognizable patterns instead of 0.
    pub poison: bool,
}

/// Word offsets of each register inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    fpu: bool,
}

impl FrameLayout {
    pub const fn new(fpu: bool) -> Self {
        Self { fpu }
    }

    pub const fn words(self) -> usize {
        if self.fpu {
            FPU_FRAME_WORDS
        } else {
            BASIC_FRAME_WORDS
        }
    }

    /// First word of the hardware-stacked part.
    const fn hardware(self) -> usize {
        if self.fpu {
            25
        } else {
            9
        }
    }

    /// Offset of core register `n` (R0-R12).
    pub const fn r(self, n: usize) -> usize {
        match n {
            0..=3 => self.hardware() + n,
            4..=11 => n - 4,
            _ => self.hardware() + 4,
        }
    }

    pub const fn exc_return(self) -> usize {
        8
    }

    pub const fn lr(self) -> usize {
        self.hardware() + 5
    }

    pub const fn pc(self) -> usize {
        self.hardware() + 6
    }

    pub const fn xpsr(self) -> usize {
        self.hardware() + 7
    }

    /// Offset of single-precision register `n`; `None` in a basic frame.
    pub const fn s(self, n: usize) -> Option<usize> {
        if !self.fpu || n > 31 {
            return None;
        }
        if n < 16 {
            Some(self.hardware() + 8 + n)
        } else {
            Some(9 + n - 16)
        }
    }

    pub const fn fpscr(self) -> Option<usize> {
        if self.fpu {
            Some(self.hardware() + 24)
        } else {
            None
        }
    }
}

/// Debug pattern for register number `n`: its decimal digits repeated,
/// e.g. R12 -> `0x12121212`.
pub const fn poison(n: u32) -> u32 {
    let digits = ((n / 10) << 4) | (n % 10);
    digits * 0x0101_0101
}

/// Write the initial frame of a thread at the top of `stack`.
///
/// `entry` is the Thumb function address; the Thumb bit is moved into
/// xPSR. Returns the word index in `stack` of the saved stack pointer.
pub fn build_initial_frame(
    stack: &mut [u32],
    entry: u32,
    arg: u32,
    options: FrameOptions,
) -> KResult<usize> {
    let layout = FrameLayout::new(options.fpu);

    let base = stack.as_ptr() as usize;
    let end = base + core::mem::size_of_val(stack);
    let top = (end & !0x7).saturating_sub(base) / 4;
    let sp = top
        .checked_sub(layout.words())
        .ok_or(KernelError::StackTooSmall)?;

    let frame = &mut stack[sp..top];
    let fill = |n: u32| if options.poison { poison(n) } else { 0 };

    for n in 0..=12 {
        frame[layout.r(n)] = fill(n as u32);
    }
    frame[layout.r(0)] = arg;
    frame[layout.exc_return()] = if options.fpu {
        EXC_RETURN_THREAD_PSP_FPU
    } else {
        EXC_RETURN_THREAD_PSP
    };
    frame[layout.lr()] = 0;
    frame[layout.pc()] = entry & !1;
    frame[layout.xpsr()] = INITIAL_XPSR;

    if options.fpu {
        for n in 0..32 {
            if let Some(offset) = layout.s(n) {
                frame[offset] = fill(n as u32);
            }
        }
        if let Some(offset) = layout.fpscr() {
            frame[offset] = 0;
        }
        frame[layout.words() - 1] = 0;
    }

    Ok(sp)
}
