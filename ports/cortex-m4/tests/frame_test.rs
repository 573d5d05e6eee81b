//! Initial frame layout checks, run on the host.

use rtk_port_cortex_m4::frame::{
    poison, BASIC_FRAME_WORDS, EXC_RETURN_THREAD_PSP, EXC_RETURN_THREAD_PSP_FPU, FPU_FRAME_WORDS,
    INITIAL_XPSR,
};
use rtk_port_cortex_m4::{build_initial_frame, initial_context, FrameLayout, FrameOptions};

const ENTRY: u32 = 0x0800_1235;
const ARG: u32 = 0xCAFE_F00D;

fn stack(words: usize) -> Vec<u32> {
    vec![0xDEAD_BEEF; words]
}

fn frame_end(stack: &[u32], sp: usize, layout: FrameLayout) -> usize {
    stack.as_ptr() as usize + (sp + layout.words()) * 4
}

#[test]
fn basic_frame_starts_at_entry_with_argument() {
    let mut stack = stack(64);
    let options = FrameOptions {
        fpu: false,
        poison: false,
    };
    let sp = build_initial_frame(&mut stack, ENTRY, ARG, options).unwrap();
    let layout = FrameLayout::new(false);
    let frame = &stack[sp..sp + BASIC_FRAME_WORDS];

    assert_eq!(frame[layout.pc()], ENTRY & !1);
    assert_eq!(frame[layout.r(0)], ARG);
    assert_eq!(frame[layout.xpsr()], INITIAL_XPSR);
    assert_eq!(frame[layout.exc_return()], EXC_RETURN_THREAD_PSP);
    assert_eq!(frame[layout.lr()], 0);
    for n in [1, 2, 3, 4, 7, 11, 12] {
        assert_eq!(frame[layout.r(n)], 0, "R{n}");
    }
}

#[test]
fn frame_end_is_eight_byte_aligned() {
    for words in [40, 41, 42, 43] {
        let mut stack = stack(words);
        let sp = build_initial_frame(&mut stack, ENTRY, ARG, FrameOptions::default()).unwrap();
        let layout = FrameLayout::new(false);
        assert_eq!(frame_end(&stack, sp, layout) % 8, 0);
        // Hardware-stacked part, where the thread's PSP lands, too.
        let hardware = stack.as_ptr() as usize + (sp + layout.r(0)) * 4;
        assert_eq!(hardware % 8, 0);
        // Words above the aligned end are untouched.
        assert!(stack[sp + layout.words()..].iter().all(|w| *w == 0xDEAD_BEEF));
    }
}

#[test]
fn poisoned_frame_marks_every_register() {
    let mut stack = stack(64);
    let options = FrameOptions {
        fpu: false,
        poison: true,
    };
    let sp = build_initial_frame(&mut stack, ENTRY, ARG, options).unwrap();
    let layout = FrameLayout::new(false);

    assert_eq!(stack[sp + layout.r(4)], 0x0404_0404);
    assert_eq!(stack[sp + layout.r(11)], 0x1111_1111);
    assert_eq!(stack[sp + layout.r(12)], 0x1212_1212);
    assert_eq!(stack[sp + layout.r(1)], 0x0101_0101);
    assert_eq!(stack[sp + layout.r(0)], ARG);
    assert_eq!(stack[sp + layout.pc()], ENTRY & !1);
}

#[test]
fn fpu_frame_carries_float_state() {
    let mut stack = stack(128);
    let options = FrameOptions {
        fpu: true,
        poison: true,
    };
    let sp = build_initial_frame(&mut stack, ENTRY, ARG, options).unwrap();
    let layout = FrameLayout::new(true);
    let frame = &stack[sp..sp + FPU_FRAME_WORDS];

    assert_eq!(frame[layout.exc_return()], EXC_RETURN_THREAD_PSP_FPU);
    assert_eq!(frame[layout.pc()], ENTRY & !1);
    assert_eq!(frame[layout.r(0)], ARG);
    for n in 0..32 {
        assert_eq!(frame[layout.s(n).unwrap()], poison(n as u32), "S{n}");
    }
    assert_eq!(frame[layout.fpscr().unwrap()], 0);
    assert_eq!(frame[FPU_FRAME_WORDS - 1], 0);
    assert_eq!(frame_end(&stack, sp, layout) % 8, 0);
}

#[test]
fn short_stack_is_rejected() {
    let mut short = stack(BASIC_FRAME_WORDS - 1);
    assert_eq!(
        build_initial_frame(&mut short, ENTRY, ARG, FrameOptions::default()),
        Err(rtk_core::KernelError::StackTooSmall)
    );

    let mut basic_sized = stack(40);
    let options = FrameOptions {
        fpu: true,
        poison: false,
    };
    assert!(build_initial_frame(&mut basic_sized, ENTRY, ARG, options).is_err());
}

#[test]
fn initial_context_points_at_saved_registers() {
    let mut stack = stack(64);
    let base = stack.as_ptr() as usize;
    let context = initial_context(&mut stack, ENTRY as usize, ARG as usize, FrameOptions::default())
        .unwrap();

    assert!(!context.is_null());
    let sp = (context.addr() - base) / 4;
    assert_eq!(stack[sp + FrameLayout::new(false).exc_return()], EXC_RETURN_THREAD_PSP);
}
