//! Telemetry ring shared by firmware and host targets.
//!
//! Every notice and traced transition the detector emits can be mirrored into
//! a fixed-capacity [`TelemetryRecorder`]. Transition records carry the time
//! spent in the previous state so flapping sense lines are easy to spot when
//! the ring is dumped.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::deferred::EdgeOutcome;
use crate::detector::{DetectLog, PeerNotice};
use crate::state::DetectState;

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Telemetry events emitted by the detector and its interrupt path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    StateEntered(DetectState),
    Notice(PeerNotice),
    EdgeScheduled,
    EdgeCoalesced,
    EdgeDropped,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::StateEntered(state) => write!(f, "state-entered {state}"),
            TelemetryEventKind::Notice(notice) => write!(f, "notice {notice}"),
            TelemetryEventKind::EdgeScheduled => f.write_str("edge-scheduled"),
            TelemetryEventKind::EdgeCoalesced => f.write_str("edge-coalesced"),
            TelemetryEventKind::EdgeDropped => f.write_str("edge-dropped"),
        }
    }
}

impl From<EdgeOutcome> for TelemetryEventKind {
    fn from(outcome: EdgeOutcome) -> Self {
        match outcome {
            EdgeOutcome::Scheduled => TelemetryEventKind::EdgeScheduled,
            EdgeOutcome::AlreadyPending => TelemetryEventKind::EdgeCoalesced,
            EdgeOutcome::Dropped => TelemetryEventKind::EdgeDropped,
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    Transition(TransitionTelemetry),
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// State transition payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransitionTelemetry {
    pub from: DetectState,
    pub to: DetectState,
    /// Time since the previous recorded transition, if any.
    pub time_in_previous: Option<Duration>,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Source of timestamps for [`TelemetryLog`].
pub trait TelemetryClock {
    type Instant: TelemetryInstant;

    fn now(&self) -> Self::Instant;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_transition_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a state change and the time spent in the previous state.
    pub fn record_transition(
        &mut self,
        from: DetectState,
        to: DetectState,
        timestamp: TInstant,
    ) -> EventId {
        let time_in_previous = self
            .last_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_transition_at = Some(timestamp);

        self.record(
            TelemetryEventKind::StateEntered(to),
            TelemetryPayload::Transition(TransitionTelemetry {
                from,
                to,
                time_in_previous,
            }),
            timestamp,
        )
    }

    pub fn record_notice(&mut self, notice: PeerNotice, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::Notice(notice),
            TelemetryPayload::none(),
            timestamp,
        )
    }

    /// Records how an edge interrupt was serviced.
    pub fn record_edge(&mut self, outcome: EdgeOutcome, timestamp: TInstant) -> EventId {
        self.record(outcome.into(), TelemetryPayload::none(), timestamp)
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

/// [`DetectLog`] sink that timestamps everything into a [`TelemetryRecorder`].
pub struct TelemetryLog<C, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    C: TelemetryClock,
{
    clock: C,
    recorder: TelemetryRecorder<C::Instant, CAPACITY>,
}

impl<C, const CAPACITY: usize> TelemetryLog<C, CAPACITY>
where
    C: TelemetryClock,
{
    pub const fn new(clock: C) -> Self {
        Self {
            clock,
            recorder: TelemetryRecorder::new(),
        }
    }

    pub fn recorder(&self) -> &TelemetryRecorder<C::Instant, CAPACITY> {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut TelemetryRecorder<C::Instant, CAPACITY> {
        &mut self.recorder
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C, const CAPACITY: usize> DetectLog for TelemetryLog<C, CAPACITY>
where
    C: TelemetryClock,
{
    fn notice(&mut self, _peer: &'static str, notice: PeerNotice) {
        let now = self.clock.now();
        self.recorder.record_notice(notice, now);
    }

    fn state_changed(&mut self, _peer: &'static str, from: DetectState, to: DetectState) {
        let now = self.clock.now();
        self.recorder.record_transition(from, to, now);
    }

    fn transition(&mut self, _: &'static str, _: DetectState, _: DetectState) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MicrosInstant(u64);

    impl MicrosInstant {
        fn from_micros(value: u64) -> Self {
            Self(value)
        }
    }

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            let micros = self.0.saturating_sub(earlier.0);
            Duration::from_micros(micros)
        }
    }

    struct StepClock<'a> {
        now: &'a Cell<u64>,
    }

    impl TelemetryClock for StepClock<'_> {
        type Instant = MicrosInstant;

        fn now(&self) -> MicrosInstant {
            MicrosInstant::from_micros(self.now.get())
        }
    }

    #[test]
    fn records_time_spent_in_previous_state() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();

        let id1 = recorder.record_transition(
            DetectState::On,
            DetectState::Debouncing,
            MicrosInstant::from_micros(1_000_000),
        );
        assert_eq!(id1, 0);

        let first = recorder.latest().copied().unwrap();
        assert_eq!(
            first.event,
            TelemetryEventKind::StateEntered(DetectState::Debouncing)
        );
        match first.details {
            TelemetryPayload::Transition(details) => {
                assert_eq!(details.from, DetectState::On);
                assert_eq!(details.time_in_previous, None);
            }
            TelemetryPayload::None => panic!("expected transition payload"),
        }

        recorder.record_transition(
            DetectState::Debouncing,
            DetectState::Off,
            MicrosInstant::from_micros(2_000_000),
        );

        let second = recorder.latest().copied().unwrap();
        match second.details {
            TelemetryPayload::Transition(details) => {
                let elapsed = details.time_in_previous.expect("missing elapsed");
                assert_eq!(elapsed, Duration::from_secs(1));
            }
            TelemetryPayload::None => panic!("expected transition payload"),
        }
    }

    #[test]
    fn edge_outcomes_map_to_events() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();
        recorder.record_edge(EdgeOutcome::Scheduled, MicrosInstant::from_micros(5));
        recorder.record_edge(EdgeOutcome::AlreadyPending, MicrosInstant::from_micros(6));

        let events: heapless::Vec<TelemetryEventKind, 4> =
            recorder.oldest_first().map(|record| record.event).collect();
        assert_eq!(
            events.as_slice(),
            &[
                TelemetryEventKind::EdgeScheduled,
                TelemetryEventKind::EdgeCoalesced
            ]
        );
    }

    #[test]
    fn ring_keeps_newest_entries_when_full() {
        let mut recorder = TelemetryRecorder::<MicrosInstant, 2>::new();
        for step in 0..3 {
            recorder.record_notice(PeerNotice::On, MicrosInstant::from_micros(step));
        }

        assert_eq!(recorder.len(), 2);
        let first = recorder.oldest_first().next().copied().unwrap();
        assert_eq!(first.id, 1);
    }

    #[test]
    fn telemetry_log_stamps_with_clock() {
        let now = Cell::new(10);
        let mut log = TelemetryLog::<_, 8>::new(StepClock { now: &now });

        log.notice("EC", PeerNotice::Off);
        now.set(25);
        log.state_changed("EC", DetectState::Debouncing, DetectState::Off);
        log.transition("EC", DetectState::Debouncing, DetectState::Off);

        let record = log.recorder().latest().copied().unwrap();
        assert_eq!(record.timestamp, MicrosInstant::from_micros(25));
        assert_eq!(
            log.recorder().len(),
            2,
            "trace lines must not add a second transition record"
        );
    }

    #[test]
    fn event_kinds_render_for_dumps() {
        use core::fmt::Write;

        let mut text: heapless::String<32> = heapless::String::new();
        write!(text, "{}", TelemetryEventKind::StateEntered(DetectState::InitRxOnly)).unwrap();
        assert_eq!(text.as_str(), "state-entered init_rx_only");
    }
}
