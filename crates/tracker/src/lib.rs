// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aegis-tracker: the real-time player/team/squad view per server.
//!
//! Reconciled from periodic RCON snapshots, nudged by incremental log
//! events, stored in the shared KV cache so the data survives process
//! restarts and stays inspectable from outside. The tracker also
//! implements [`aegis_core::Enricher`] so consumers see events with
//! attacker/victim/teamkill context already resolved.

pub mod tracker;

pub use tracker::{PlayerTracker, TrackerConfig, TrackerError};
