//! Runtime kernel configuration.

/// Configuration for the kernel.
///
/// Capacities are compile-time constants ([`crate::MAX_THREADS`],
/// [`crate::MAX_EVENTS`]); everything here is a runtime switch.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub name: &'static str,
    /// Frequency of the tick interrupt, used for millisecond conversions.
    pub tick_rate_hz: u32,
    /// Enables `sched_lock` / `sched_unlock`.
    pub sched_lock: bool,
    /// Validates event type tags on every wait.
    pub safe_checks: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "RTK",
            tick_rate_hz: 1000,
            sched_lock: true,
            safe_checks: true,
        }
    }
}

impl KernelConfig {
    /// Creates a new kernel configuration builder.
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::default()
    }

    /// Converts milliseconds to ticks, rounding up so a non-zero delay
    /// never becomes a zero-tick timeout.
    pub fn ticks_from_millis(&self, millis: u32) -> u32 {
        let ticks = (millis as u64 * self.tick_rate_hz as u64).div_ceil(1000);
        ticks.min(u32::MAX as u64) as u32
    }
}

/// Builder for ergonomic kernel configuration construction.
#[derive(Debug, Clone, Default)]
pub struct KernelConfigBuilder {
    config: KernelConfig,
}

impl KernelConfigBuilder {
    /// Sets the kernel name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the tick interrupt frequency.
    pub fn tick_rate_hz(mut self, hz: u32) -> Self {
        self.config.tick_rate_hz = hz;
        self
    }

    /// Enables or disables the scheduler lock.
    pub fn sched_lock(mut self, enabled: bool) -> Self {
        self.config.sched_lock = enabled;
        self
    }

    /// Enables or disables event type-tag validation.
    pub fn safe_checks(mut self, enabled: bool) -> Self {
        self.config.safe_checks = enabled;
        self
    }

    /// Builds the kernel configuration.
    pub fn build(self) -> KernelConfig {
        self.config
    }
}
