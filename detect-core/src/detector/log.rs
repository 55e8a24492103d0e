use core::fmt;

use crate::state::DetectState;

/// Operator-facing announcements emitted on presence changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PeerNotice {
    /// Receive enabled during start-up, transmit withheld.
    RxOnly,
    /// Peer confirmed present.
    On,
    /// Peer confirmed absent.
    Off,
}

impl PeerNotice {
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            PeerNotice::RxOnly => "RX only",
            PeerNotice::On => "on",
            PeerNotice::Off => "off",
        }
    }
}

impl fmt::Display for PeerNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Sink for detector notices and transition traces.
pub trait DetectLog {
    /// Records an announcement such as `EC on`.
    fn notice(&mut self, peer: &'static str, notice: PeerNotice);

    /// Called on every real state change, whatever the trace mode.
    fn state_changed(&mut self, _peer: &'static str, _from: DetectState, _to: DetectState) {}

    /// Human-readable trace of a state change. Only called when tracing is verbose.
    fn transition(&mut self, peer: &'static str, from: DetectState, to: DetectState);
}

impl<L> DetectLog for &mut L
where
    L: DetectLog + ?Sized,
{
    fn notice(&mut self, peer: &'static str, notice: PeerNotice) {
        (**self).notice(peer, notice);
    }

    fn state_changed(&mut self, peer: &'static str, from: DetectState, to: DetectState) {
        (**self).state_changed(peer, from, to);
    }

    fn transition(&mut self, peer: &'static str, from: DetectState, to: DetectState) {
        (**self).transition(peer, from, to);
    }
}

/// Log sink that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDetectLog;

impl DetectLog for NoopDetectLog {
    fn notice(&mut self, _: &'static str, _: PeerNotice) {}

    fn transition(&mut self, _: &'static str, _: DetectState, _: DetectState) {}
}
