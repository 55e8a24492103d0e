//! Detection state shared by every target.
//!
//! [`DetectState`] is the single value the detector mutates. The canonical
//! lowercase names double as the console rendering and the parse format used
//! by host tooling.

use core::fmt;

/// Presence state of the peer device as seen through the sense line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DetectState {
    /// No sample taken since start-up.
    #[default]
    Init,
    /// First sample after start-up was low; waiting for confirmation.
    InitDebouncing,
    /// Peer confirmed during start-up; receive enabled, transmit withheld.
    InitRxOnly,
    /// One low sample seen after being on; waiting for confirmation of off.
    Debouncing,
    /// Peer confirmed present.
    On,
    /// Peer confirmed absent.
    Off,
}

/// Every state in declaration order.
pub const ALL_STATES: [DetectState; 6] = [
    DetectState::Init,
    DetectState::InitDebouncing,
    DetectState::InitRxOnly,
    DetectState::Debouncing,
    DetectState::On,
    DetectState::Off,
];

impl DetectState {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DetectState::Init => "init",
            DetectState::InitDebouncing => "init_debouncing",
            DetectState::InitRxOnly => "init_rx_only",
            DetectState::Debouncing => "debouncing",
            DetectState::On => "on",
            DetectState::Off => "off",
        }
    }

    /// Looks a state up by its canonical name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_STATES
            .iter()
            .copied()
            .find(|state| state.name().eq_ignore_ascii_case(name))
    }

    /// Returns `true` when the peer was last confirmed present.
    ///
    /// Debouncing still counts as on: a single low sample is not proof the
    /// peer went away.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, DetectState::Debouncing | DetectState::On)
    }

    /// Returns `true` for the states that wait on a second low sample.
    #[must_use]
    pub const fn is_debouncing(self) -> bool {
        matches!(self, DetectState::Debouncing | DetectState::InitDebouncing)
    }

    /// Returns `true` for the start-up family of states.
    #[must_use]
    pub const fn is_initializing(self) -> bool {
        matches!(self, DetectState::Init | DetectState::InitDebouncing)
    }

    /// Compact discriminant used by firmware status atomics.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            DetectState::Init => 0,
            DetectState::InitDebouncing => 1,
            DetectState::InitRxOnly => 2,
            DetectState::Debouncing => 3,
            DetectState::On => 4,
            DetectState::Off => 5,
        }
    }

    /// Decodes a discriminant produced by [`DetectState::to_raw`].
    #[must_use]
    pub const fn from_raw(code: u8) -> Option<Self> {
        match code {
            0 => Some(DetectState::Init),
            1 => Some(DetectState::InitDebouncing),
            2 => Some(DetectState::InitRxOnly),
            3 => Some(DetectState::Debouncing),
            4 => Some(DetectState::On),
            5 => Some(DetectState::Off),
            _ => None,
        }
    }
}

impl fmt::Display for DetectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
