//! Nested Critical Sections
//!
//! Kernel state is only touched with the interrupt mask raised to the kernel
//! ceiling. Entering nests: the mask is raised on the outermost entry only,
//! and the value it replaced is restored on the matching outermost exit.
//! Interrupts above the ceiling are never masked and must not call the
//! kernel.
//!
//! The depth counter uses plain loads and stores. Nothing can interleave
//! between the first raise and the counter update except handlers above the
//! ceiling, which never touch it.

use core::marker::PhantomData;
use core::sync::atomic::{compiler_fence, AtomicU32, Ordering};

/// Raise and restore the kernel interrupt mask.
///
/// # Safety
///
/// After `raise` returns, no other execution context that uses the kernel may
/// run until the matching `restore`. The kernel mints
/// [`critical_section::CriticalSection`] tokens on the strength of this.
pub unsafe trait InterruptMask {
    /// Raise the mask to the kernel ceiling and return the previous mask.
    ///
    /// Must never lower an already higher mask.
    fn raise(&self) -> u32;

    /// Restore a mask previously returned by [`InterruptMask::raise`].
    fn restore(&self, previous: u32);
}

/// Nesting bookkeeping for one kernel instance.
#[derive(Debug)]
pub struct CriticalSection {
    depth: AtomicU32,
    saved: AtomicU32,
}

impl CriticalSection {
    pub const fn new() -> Self {
        Self {
            depth: AtomicU32::new(0),
            saved: AtomicU32::new(0),
        }
    }

    /// Enter the critical section, raising `mask` on the outermost entry.
    ///
    /// The section is left when the returned guard is dropped.
    pub fn enter<'a, M: InterruptMask + ?Sized>(&'a self, mask: &'a M) -> CriticalGuard<'a, M> {
        let depth = self.depth.load(Ordering::Relaxed);
        if depth == 0 {
            let previous = mask.raise();
            self.saved.store(previous, Ordering::Relaxed);
        }
        self.depth.store(depth + 1, Ordering::Relaxed);
        compiler_fence(Ordering::SeqCst);

        CriticalGuard {
            section: self,
            mask,
            _not_send: PhantomData,
        }
    }

    fn leave<M: InterruptMask + ?Sized>(&self, mask: &M) {
        compiler_fence(Ordering::SeqCst);
        let depth = self.depth.load(Ordering::Relaxed);
        debug_assert!(depth > 0, "critical section underflow");
        if depth == 0 {
            return;
        }

        self.depth.store(depth - 1, Ordering::Relaxed);
        if depth == 1 {
            mask.restore(self.saved.load(Ordering::Relaxed));
        }
    }

    /// Current nesting depth; 0 outside any critical section.
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_held(&self) -> bool {
        self.depth() > 0
    }
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a held critical section
///
/// Automatically leaves the critical section when dropped. Guards are tied to
/// the execution context that created them and cannot be sent elsewhere.
pub struct CriticalGuard<'a, M: InterruptMask + ?Sized> {
    section: &'a CriticalSection,
    mask: &'a M,
    _not_send: PhantomData<*const ()>,
}

impl<'a, M: InterruptMask + ?Sized> CriticalGuard<'a, M> {
    /// Token proving the section is held, for `critical_section::Mutex`.
    pub fn token(&self) -> critical_section::CriticalSection<'_> {
        // SAFETY: the mask is raised for as long as `self` lives, which
        // bounds the token lifetime.
        unsafe { critical_section::CriticalSection::new() }
    }

    /// Nesting depth including this guard.
    pub fn depth(&self) -> u32 {
        self.section.depth()
    }
}

impl<'a, M: InterruptMask + ?Sized> Drop for CriticalGuard<'a, M> {
    fn drop(&mut self) {
        self.section.leave(self.mask);
    }
}
