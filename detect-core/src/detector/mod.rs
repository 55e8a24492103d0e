//! Peer presence debounce state machine.
//!
//! [`PeerDetector`] owns the detection state together with the sense line and
//! UART handles it drives. Two entry points mutate the state, both from the
//! detection task: [`PeerDetector::poll`] runs once per [`POLL_PERIOD`], and
//! [`PeerDetector::ensure_on`] runs whenever deferred work from the edge
//! interrupt is drained. Interrupt context never sees this type; it only gets
//! an [`EdgeHandler`](crate::deferred::EdgeHandler).
//!
//! A single low sample is ambiguous: the peer may have powered off, or it may
//! simply be transmitting a zero bit. The detector therefore needs two low
//! polls in a row before it commits to off, while any high sample commits to
//! on immediately.

use core::time::Duration;

use crate::deferred::{DeferredDequeueError, DeferredQueueConsumer, DeferredWork, EdgeInterrupt};
use crate::state::DetectState;

mod log;

pub use log::{DetectLog, NoopDetectLog, PeerNotice};

/// Cadence of [`PeerDetector::poll`].
pub const POLL_PERIOD: Duration = Duration::from_secs(1);

/// Peer name used when no configuration is supplied.
pub const DEFAULT_PEER_NAME: &str = "EC";

/// Level sampling on the sense line.
pub trait SenseLevel {
    /// Returns `true` when the peer is driving the sense line.
    fn is_asserted(&mut self) -> bool;
}

/// UART enablement primitives for the link to the peer.
pub trait UartControl {
    /// Enables reception while leaving the transmit pin undriven.
    fn enable_receive_only(&mut self);

    /// Enables both reception and transmission.
    fn enable_full_duplex(&mut self);

    /// Disables the UART entirely.
    fn disable(&mut self);

    /// Returns `true` while a bit-banged transport owns the link.
    fn is_bitbang_active(&self) -> bool;
}

/// Whether every state change is traced through [`DetectLog::transition`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TraceMode {
    #[default]
    Quiet,
    Verbose,
}

impl TraceMode {
    /// Returns `true` when transitions are traced.
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, TraceMode::Verbose)
    }
}

/// Start-up configuration for a [`PeerDetector`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DetectorConfig {
    peer: &'static str,
    trace: TraceMode,
}

impl DetectorConfig {
    /// Creates a quiet configuration for the named peer.
    #[must_use]
    pub const fn new(peer: &'static str) -> Self {
        Self {
            peer,
            trace: TraceMode::Quiet,
        }
    }

    /// Selects the trace mode.
    #[must_use]
    pub const fn with_trace(mut self, trace: TraceMode) -> Self {
        self.trace = trace;
        self
    }

    /// Returns the peer label used in log lines.
    #[must_use]
    pub const fn peer(&self) -> &'static str {
        self.peer
    }

    /// Returns the configured trace mode.
    #[must_use]
    pub const fn trace(&self) -> TraceMode {
        self.trace
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_NAME)
    }
}

/// What a call to [`PeerDetector::ensure_on`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActivationOutcome {
    /// Start-up detection: receive enabled, transmit withheld.
    RxOnly,
    /// A pending off-debounce was cancelled; the UART was already up.
    DebounceCancelled,
    /// Peer came back from off (or from receive-only start-up).
    TurnedOn,
    /// Nothing to do.
    AlreadyOn,
}

/// What a call to [`PeerDetector::poll`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// Sense line was high; activation ran.
    Asserted(ActivationOutcome),
    /// Low sample while already off.
    SteadyOff,
    /// Second consecutive low sample; peer is now off.
    ConfirmedOff,
    /// First low sample; waiting for confirmation with the edge armed.
    DebounceStarted,
}

/// Detection context owned by the task that polls the sense line.
pub struct PeerDetector<S, U, L = NoopDetectLog> {
    state: DetectState,
    sense: S,
    uart: U,
    log: L,
    config: DetectorConfig,
}

impl<S, U, L> PeerDetector<S, U, L>
where
    S: SenseLevel + EdgeInterrupt,
    U: UartControl,
    L: DetectLog,
{
    /// Creates a detector in [`DetectState::Init`].
    pub fn new(sense: S, uart: U, log: L, config: DetectorConfig) -> Self {
        Self {
            state: DetectState::Init,
            sense,
            uart,
            log,
            config,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> DetectState {
        self.state
    }

    /// Returns `true` when the peer was last confirmed present.
    pub fn is_on(&self) -> bool {
        self.state.is_on()
    }

    /// Human-readable state name, for diagnostics only.
    pub fn describe_state(&self) -> &'static str {
        self.state.name()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Switches transition tracing at runtime.
    pub fn set_trace(&mut self, trace: TraceMode) {
        self.config = self.config.with_trace(trace);
    }

    pub fn sense(&self) -> &S {
        &self.sense
    }

    pub fn sense_mut(&mut self) -> &mut S {
        &mut self.sense
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    /// Replaces the state. Legality is the caller's concern.
    fn set_state(&mut self, next: DetectState) {
        if self.state != next {
            self.log.state_changed(self.config.peer, self.state, next);
            if self.config.trace.is_verbose() {
                self.log.transition(self.config.peer, self.state, next);
            }
        }
        self.state = next;
    }

    fn announce(&mut self, notice: PeerNotice) {
        self.log.notice(self.config.peer, notice);
    }

    /// Moves the peer to on. Safe to call redundantly from task context.
    pub fn ensure_on(&mut self) -> ActivationOutcome {
        if self.state.is_initializing() {
            // Transmit stays off: the peer TX line doubles as another
            // detection input until start-up settles.
            self.announce(PeerNotice::RxOnly);
            if !self.uart.is_bitbang_active() {
                self.uart.enable_receive_only();
            }
            self.set_state(DetectState::InitRxOnly);
            return ActivationOutcome::RxOnly;
        }

        match self.state {
            DetectState::Debouncing => {
                self.set_state(DetectState::On);
                ActivationOutcome::DebounceCancelled
            }
            DetectState::On => ActivationOutcome::AlreadyOn,
            _ => {
                self.announce(PeerNotice::On);
                self.set_state(DetectState::On);
                if !self.uart.is_bitbang_active() {
                    self.uart.enable_full_duplex();
                }
                ActivationOutcome::TurnedOn
            }
        }
    }

    /// Runs one periodic detection cycle.
    pub fn poll(&mut self) -> PollOutcome {
        self.sense.disable_edge_interrupt();

        if self.sense.is_asserted() {
            return PollOutcome::Asserted(self.ensure_on());
        }

        match self.state {
            DetectState::Off => PollOutcome::SteadyOff,
            DetectState::Debouncing | DetectState::InitDebouncing => {
                self.announce(PeerNotice::Off);
                self.set_state(DetectState::Off);
                self.uart.disable();
                PollOutcome::ConfirmedOff
            }
            DetectState::Init => self.begin_debounce(DetectState::InitDebouncing),
            DetectState::On | DetectState::InitRxOnly => {
                self.begin_debounce(DetectState::Debouncing)
            }
        }
    }

    fn begin_debounce(&mut self, next: DetectState) -> PollOutcome {
        self.set_state(next);
        self.sense.enable_edge_interrupt();
        PollOutcome::DebounceStarted
    }

    /// Executes one unit of deferred work.
    pub fn run_deferred(&mut self, work: DeferredWork) -> ActivationOutcome {
        match work {
            DeferredWork::EnsureOn => self.ensure_on(),
        }
    }

    /// Drains every pending deferred item, returning how many ran.
    pub fn drain_deferred<C>(
        &mut self,
        queue: &mut C,
    ) -> Result<usize, DeferredDequeueError<C::Error>>
    where
        C: DeferredQueueConsumer,
    {
        let mut executed = 0;
        while let Some(work) = queue.try_dequeue()? {
            self.run_deferred(work);
            executed += 1;
        }
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct MockSense {
        level: bool,
        armed: bool,
    }

    impl SenseLevel for MockSense {
        fn is_asserted(&mut self) -> bool {
            self.level
        }
    }

    impl EdgeInterrupt for MockSense {
        fn enable_edge_interrupt(&mut self) {
            self.armed = true;
        }

        fn disable_edge_interrupt(&mut self) {
            self.armed = false;
        }
    }

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum UartCall {
        RxOnly,
        Full,
        Disable,
    }

    #[derive(Default)]
    struct MockUart {
        bitbang: bool,
        calls: Vec<UartCall, 16>,
    }

    impl UartControl for MockUart {
        fn enable_receive_only(&mut self) {
            let _ = self.calls.push(UartCall::RxOnly);
        }

        fn enable_full_duplex(&mut self) {
            let _ = self.calls.push(UartCall::Full);
        }

        fn disable(&mut self) {
            let _ = self.calls.push(UartCall::Disable);
        }

        fn is_bitbang_active(&self) -> bool {
            self.bitbang
        }
    }

    #[derive(Default)]
    struct CountingLog {
        notices: Vec<PeerNotice, 16>,
        changes: Vec<(DetectState, DetectState), 16>,
        transitions: Vec<(DetectState, DetectState), 16>,
    }

    impl DetectLog for CountingLog {
        fn notice(&mut self, _peer: &'static str, notice: PeerNotice) {
            let _ = self.notices.push(notice);
        }

        fn state_changed(&mut self, _peer: &'static str, from: DetectState, to: DetectState) {
            let _ = self.changes.push((from, to));
        }

        fn transition(&mut self, _peer: &'static str, from: DetectState, to: DetectState) {
            let _ = self.transitions.push((from, to));
        }
    }

    fn detector(trace: TraceMode) -> PeerDetector<MockSense, MockUart, CountingLog> {
        PeerDetector::new(
            MockSense::default(),
            MockUart::default(),
            CountingLog::default(),
            DetectorConfig::default().with_trace(trace),
        )
    }

    #[test]
    fn first_activation_enables_receive_only() {
        let mut detector = detector(TraceMode::Quiet);

        assert_eq!(detector.ensure_on(), ActivationOutcome::RxOnly);
        assert_eq!(detector.state(), DetectState::InitRxOnly);
        assert_eq!(detector.uart().calls.as_slice(), &[UartCall::RxOnly]);
        assert_eq!(detector.log().notices.as_slice(), &[PeerNotice::RxOnly]);
        assert!(!detector.is_on());
    }

    #[test]
    fn receive_only_start_leaves_uart_alone_under_bitbang() {
        let mut detector = detector(TraceMode::Quiet);
        detector.uart.bitbang = true;

        assert_eq!(detector.ensure_on(), ActivationOutcome::RxOnly);
        assert!(detector.uart().calls.is_empty());
    }

    #[test]
    fn debounce_cancel_has_no_side_effects() {
        let mut detector = detector(TraceMode::Quiet);
        detector.state = DetectState::Debouncing;

        assert_eq!(detector.ensure_on(), ActivationOutcome::DebounceCancelled);
        assert_eq!(detector.state(), DetectState::On);
        assert!(detector.uart().calls.is_empty());
        assert!(detector.log().notices.is_empty());
    }

    #[test]
    fn off_to_on_skips_full_duplex_under_bitbang() {
        let mut detector = detector(TraceMode::Quiet);
        detector.state = DetectState::Off;
        detector.uart.bitbang = true;

        assert_eq!(detector.ensure_on(), ActivationOutcome::TurnedOn);
        assert_eq!(detector.state(), DetectState::On);
        assert!(detector.uart().calls.is_empty());
        assert_eq!(detector.log().notices.as_slice(), &[PeerNotice::On]);
    }

    #[test]
    fn first_low_sample_from_init_arms_edge() {
        let mut detector = detector(TraceMode::Quiet);

        assert_eq!(detector.poll(), PollOutcome::DebounceStarted);
        assert_eq!(detector.state(), DetectState::InitDebouncing);
        assert!(detector.sense().armed);
    }

    #[test]
    fn high_sample_disarms_edge_before_activation() {
        let mut detector = detector(TraceMode::Quiet);
        detector.poll();
        assert!(detector.sense().armed);

        detector.sense_mut().level = true;
        assert_eq!(
            detector.poll(),
            PollOutcome::Asserted(ActivationOutcome::RxOnly)
        );
        assert!(!detector.sense().armed);
    }

    #[test]
    fn verbose_trace_records_only_real_changes() {
        let mut detector = detector(TraceMode::Verbose);
        detector.sense_mut().level = true;

        detector.poll();
        detector.poll();
        detector.poll();

        assert_eq!(
            detector.log().transitions.as_slice(),
            &[
                (DetectState::Init, DetectState::InitRxOnly),
                (DetectState::InitRxOnly, DetectState::On),
            ]
        );
    }

    #[test]
    fn quiet_trace_matches_verbose_semantics() {
        let levels = [false, true, false, false, true, true, false];
        let mut quiet = detector(TraceMode::Quiet);
        let mut verbose = detector(TraceMode::Verbose);

        for level in levels {
            quiet.sense_mut().level = level;
            verbose.sense_mut().level = level;
            assert_eq!(quiet.poll(), verbose.poll());
            assert_eq!(quiet.state(), verbose.state());
        }

        assert!(quiet.log().transitions.is_empty());
        assert!(!verbose.log().transitions.is_empty());
        assert_eq!(quiet.log().changes, verbose.log().changes);
        assert_eq!(verbose.log().changes, verbose.log().transitions);
        assert_eq!(quiet.uart().calls, verbose.uart().calls);
    }

    #[test]
    fn runtime_trace_switch_takes_effect() {
        let mut detector = detector(TraceMode::Quiet);
        detector.poll();
        detector.set_trace(TraceMode::Verbose);
        detector.poll();

        assert_eq!(
            detector.log().transitions.as_slice(),
            &[(DetectState::InitDebouncing, DetectState::Off)]
        );
    }

    #[test]
    fn quiet_mode_still_reports_state_changes() {
        let mut detector = detector(TraceMode::Quiet);
        detector.poll();
        detector.poll();
        detector.poll();

        assert_eq!(
            detector.log().changes.as_slice(),
            &[
                (DetectState::Init, DetectState::InitDebouncing),
                (DetectState::InitDebouncing, DetectState::Off),
            ]
        );
        assert!(detector.log().transitions.is_empty());
    }

    #[test]
    fn describe_state_uses_canonical_names() {
        let mut detector = detector(TraceMode::Quiet);
        assert_eq!(detector.describe_state(), "init");
        detector.poll();
        assert_eq!(detector.describe_state(), "init_debouncing");
    }
}
