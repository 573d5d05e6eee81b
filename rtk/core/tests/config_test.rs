//! Tests for KernelConfig builder and conversions.

use rtk_core::KernelConfig;

#[test]
fn kernel_config_builder() {
    let config = KernelConfig::builder()
        .name("TestKernel")
        .tick_rate_hz(100)
        .sched_lock(false)
        .safe_checks(false)
        .build();

    assert_eq!(config.name, "TestKernel");
    assert_eq!(config.tick_rate_hz, 100);
    assert!(!config.sched_lock);
    assert!(!config.safe_checks);
}

#[test]
fn kernel_config_default() {
    let config = KernelConfig::default();

    assert_eq!(config.name, "RTK");
    assert_eq!(config.tick_rate_hz, 1000);
    assert!(config.sched_lock);
    assert!(config.safe_checks);
}

#[test]
fn millis_round_up_to_whole_ticks() {
    let config = KernelConfig::builder().tick_rate_hz(100).build();

    assert_eq!(config.ticks_from_millis(0), 0);
    assert_eq!(config.ticks_from_millis(1), 1);
    assert_eq!(config.ticks_from_millis(10), 1);
    assert_eq!(config.ticks_from_millis(11), 2);
    assert_eq!(config.ticks_from_millis(1000), 100);
}

#[test]
fn millis_at_one_khz_are_ticks() {
    let config = KernelConfig::default();
    assert_eq!(config.ticks_from_millis(250), 250);
}
