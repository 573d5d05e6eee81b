//! Port configuration.

use core::fmt;

/// Port configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// A ceiling of 0 would leave every interrupt unmasked
    ZeroCeiling,
    /// Ceiling does not fit in the implemented priority bits
    CeilingOutOfRange { ceiling: u8, priority_bits: u8 },
    /// Priority bit count outside 1..=8
    InvalidPriorityBits(u8),
    /// FPU frames requested on a target built without hardware float
    FpuUnavailable,
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCeiling => write!(f, "kernel interrupt ceiling must be non-zero"),
            Self::CeilingOutOfRange {
                ceiling,
                priority_bits,
            } => write!(
                f,
                "ceiling {ceiling} does not fit in {priority_bits} priority bits"
            ),
            Self::InvalidPriorityBits(bits) => write!(f, "invalid priority bit count {bits}"),
            Self::FpuUnavailable => write!(f, "target has no hardware floating point"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PortError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::ZeroCeiling => defmt::write!(fmt, "ZeroCeiling"),
            Self::CeilingOutOfRange { ceiling, priority_bits } => {
                defmt::write!(fmt, "CeilingOutOfRange({}, {})", ceiling, priority_bits)
            }
            Self::InvalidPriorityBits(bits) => defmt::write!(fmt, "InvalidPriorityBits({})", bits),
            Self::FpuUnavailable => defmt::write!(fmt, "FpuUnavailable"),
        }
    }
}

/// Hardware float is available to the compiled code.
pub const HAS_FPU: bool = cfg!(target_abi = "eabihf");

/// Configuration for the Cortex-M4 port.
///
/// Interrupts at logical priority `ceiling` or lower urgency are masked by
/// kernel critical sections and may call the kernel. More urgent interrupts
/// are never masked and must not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    /// Most urgent logical priority allowed to call the kernel
    pub ceiling: u8,
    /// NVIC priority bits implemented by the device
    pub priority_bits: u8,
    /// Build extended frames carrying floating-point state
    pub fpu: bool,
    /// Fill fresh frames with register-number patterns
    pub poison: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            ceiling: 5,
            priority_bits: 4,
            fpu: HAS_FPU,
            poison: cfg!(debug_assertions),
        }
    }
}

impl PortConfig {
    pub fn new(ceiling: u8) -> Self {
        Self {
            ceiling,
            ..Self::default()
        }
    }

    pub fn with_priority_bits(mut self, bits: u8) -> Self {
        self.priority_bits = bits;
        self
    }

    pub fn with_fpu(mut self, fpu: bool) -> Self {
        self.fpu = fpu;
        self
    }

    pub fn with_poison(mut self, poison: bool) -> Self {
        self.poison = poison;
        self
    }

    pub fn validate(&self) -> Result<(), PortError> {
        if self.priority_bits == 0 || self.priority_bits > 8 {
            return Err(PortError::InvalidPriorityBits(self.priority_bits));
        }
        if self.ceiling == 0 {
            return Err(PortError::ZeroCeiling);
        }
        if u16::from(self.ceiling) >= 1 << self.priority_bits {
            return Err(PortError::CeilingOutOfRange {
                ceiling: self.ceiling,
                priority_bits: self.priority_bits,
            });
        }
        if self.fpu && !HAS_FPU {
            return Err(PortError::FpuUnavailable);
        }
        Ok(())
    }

    /// BASEPRI value masking the ceiling and everything less urgent.
    pub fn basepri(&self) -> u8 {
        self.ceiling << (8 - self.priority_bits)
    }

    pub fn frame_options(&self) -> crate::frame::FrameOptions {
        crate::frame::FrameOptions {
            fpu: self.fpu,
            poison: self.poison,
        }
    }
}
