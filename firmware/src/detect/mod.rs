//! Detection plumbing shared by the firmware tasks.
//!
//! Binds the `detect-core` queue, clock, and log traits to Embassy types so
//! the detect task can hand a [`PeerDetector`](detect_core::detector::PeerDetector)
//! its collaborators without knowing about channels or defmt.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::time::Duration;

use detect_core::deferred::{
    DEFERRED_QUEUE_DEPTH, DeferredDequeueError, DeferredEnqueueError, DeferredQueueConsumer,
    DeferredQueueProducer, DeferredWork,
};
use detect_core::detector::{DetectLog, DetectorConfig, PeerNotice, TraceMode};
use detect_core::state::DetectState;
use detect_core::telemetry::{TelemetryClock, TelemetryInstant, TelemetryLog, TelemetryRecorder};
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TryReceiveError, TrySendError};
use embassy_time::Instant;

#[cfg(target_os = "none")]
type DetectMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type DetectMutex = NoopRawMutex;

/// Label used for the peer in log lines and the console dump.
pub const PEER_NAME: &str = "EC";

/// Queue carrying deferred work from the edge handler to the detect task.
pub type DeferredQueue = Channel<DetectMutex, DeferredWork, DEFERRED_QUEUE_DEPTH>;

/// Start-up configuration. The `trace-transitions` feature turns on tracing.
#[must_use]
pub const fn detector_config() -> DetectorConfig {
    let trace = if cfg!(feature = "trace-transitions") {
        TraceMode::Verbose
    } else {
        TraceMode::Quiet
    };
    DetectorConfig::new(PEER_NAME).with_trace(trace)
}

/// Embassy instant wrapper so core telemetry can stamp firmware events.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

/// Reads the Embassy time driver.
#[derive(Copy, Clone, Debug, Default)]
pub struct FirmwareClock;

impl TelemetryClock for FirmwareClock {
    type Instant = FirmwareInstant;

    fn now(&self) -> FirmwareInstant {
        FirmwareInstant::now()
    }
}

/// Adapter that lets a channel sender satisfy [`DeferredQueueProducer`].
pub struct DeferredProducer<'a, M: RawMutex> {
    sender: Sender<'a, M, DeferredWork, DEFERRED_QUEUE_DEPTH>,
}

impl<'a, M: RawMutex> DeferredProducer<'a, M> {
    pub fn new(sender: Sender<'a, M, DeferredWork, DEFERRED_QUEUE_DEPTH>) -> Self {
        Self { sender }
    }
}

impl<M: RawMutex> DeferredQueueProducer for DeferredProducer<'_, M> {
    type Error = TrySendError<DeferredWork>;

    fn try_enqueue(
        &mut self,
        work: DeferredWork,
    ) -> Result<(), DeferredEnqueueError<Self::Error>> {
        match self.sender.try_send(work) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeferredEnqueueError::QueueFull),
        }
    }
}

/// Adapter that lets a channel receiver satisfy [`DeferredQueueConsumer`].
pub struct DeferredConsumer<'a, M: RawMutex> {
    receiver: Receiver<'a, M, DeferredWork, DEFERRED_QUEUE_DEPTH>,
}

impl<'a, M: RawMutex> DeferredConsumer<'a, M> {
    pub fn new(receiver: Receiver<'a, M, DeferredWork, DEFERRED_QUEUE_DEPTH>) -> Self {
        Self { receiver }
    }
}

impl<M: RawMutex> DeferredQueueConsumer for DeferredConsumer<'_, M> {
    type Error = TryReceiveError;

    fn try_dequeue(&mut self) -> Result<Option<DeferredWork>, DeferredDequeueError<Self::Error>> {
        match self.receiver.try_receive() {
            Ok(work) => Ok(Some(work)),
            Err(TryReceiveError::Empty) => Ok(None),
        }
    }
}

/// Firmware log sink: mirrors notices and traces to defmt and the telemetry ring.
pub struct FirmwareLog<C = FirmwareClock>
where
    C: TelemetryClock,
{
    telemetry: TelemetryLog<C>,
}

impl<C> FirmwareLog<C>
where
    C: TelemetryClock,
{
    pub const fn new(clock: C) -> Self {
        Self {
            telemetry: TelemetryLog::new(clock),
        }
    }

    pub fn recorder(&self) -> &TelemetryRecorder<C::Instant> {
        self.telemetry.recorder()
    }

    pub fn recorder_mut(&mut self) -> &mut TelemetryRecorder<C::Instant> {
        self.telemetry.recorder_mut()
    }

    /// Current time according to the log's clock.
    pub fn now(&self) -> C::Instant {
        self.telemetry.clock().now()
    }
}

impl<C> DetectLog for FirmwareLog<C>
where
    C: TelemetryClock,
{
    fn notice(&mut self, peer: &'static str, notice: PeerNotice) {
        emit_notice(peer, notice);
        self.telemetry.notice(peer, notice);
    }

    fn state_changed(&mut self, peer: &'static str, from: DetectState, to: DetectState) {
        self.telemetry.state_changed(peer, from, to);
    }

    fn transition(&mut self, peer: &'static str, from: DetectState, to: DetectState) {
        emit_transition(peer, from, to);
    }
}

#[cfg(target_os = "none")]
fn emit_notice(peer: &'static str, notice: PeerNotice) {
    defmt::info!("{} {}", peer, notice.text());
}

#[cfg(not(target_os = "none"))]
fn emit_notice(peer: &'static str, notice: PeerNotice) {
    println!("{peer} {notice}");
}

#[cfg(target_os = "none")]
fn emit_transition(peer: &'static str, from: DetectState, to: DetectState) {
    defmt::debug!("{} {} -> {}", peer, from.name(), to.name());
}

#[cfg(not(target_os = "none"))]
fn emit_transition(peer: &'static str, from: DetectState, to: DetectState) {
    println!("{peer} {from} -> {to}");
}
