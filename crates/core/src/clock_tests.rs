// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let ms0 = clock.epoch_ms();

    clock.advance(Duration::from_secs(30));

    assert_eq!(clock.now() - t0, Duration::from_secs(30));
    assert_eq!(clock.epoch_ms() - ms0, 30_000);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_millis(250));
    assert_eq!(other.epoch_ms(), clock.epoch_ms());
}

#[test]
fn utc_now_tracks_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.utc_now().timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
