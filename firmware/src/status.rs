#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The detect task owns the detector. Other tasks (the console) read the
//! last published state through these atomics instead of touching the
//! detector directly.

use detect_core::state::DetectState;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

/// Raw code of the last published [`DetectState`].
static PEER_STATE: AtomicU8 = AtomicU8::new(DetectState::Init.to_raw());
/// Raised by the bit-bang transport while it owns the peer UART pins.
static BITBANG_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Publishes the detector state for other tasks.
pub fn publish_state(state: DetectState) {
    PEER_STATE.store(state.to_raw(), Ordering::Relaxed);
}

/// Returns the last published state.
pub fn peer_state() -> DetectState {
    DetectState::from_raw(PEER_STATE.load(Ordering::Relaxed)).unwrap_or_default()
}

/// Called by the bit-bang transport when it takes or releases the peer pins.
pub fn set_bitbang_active(active: bool) {
    BITBANG_ACTIVE.store(active, Ordering::Relaxed);
}

pub fn bitbang_active() -> bool {
    BITBANG_ACTIVE.load(Ordering::Relaxed)
}
