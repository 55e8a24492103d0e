use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use detect_core::console::{ConsoleCommand, HELP_LINES, write_state_line};
use detect_core::deferred::{
    DEFERRED_QUEUE_DEPTH, DeferredDequeueError, DeferredEnqueueError, DeferredQueueConsumer,
    DeferredQueueProducer, DeferredWork, EdgeHandler, EdgeInterrupt, EdgeOutcome,
};
use detect_core::detector::{
    DetectLog, DetectorConfig, POLL_PERIOD, PeerDetector, PeerNotice, PollOutcome, SenseLevel,
    TraceMode, UartControl,
};
use detect_core::state::DetectState;
use detect_core::telemetry::{
    TelemetryClock, TelemetryInstant, TelemetryLog, TelemetryPayload, TelemetryRecord,
};

use crate::command::{self, EmulatorCommand};

const PEER_NAME: &str = "EC";

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("level", "level <high|low>     - drive the sense line"),
    ("tick", "tick [n]             - advance n poll periods (1..=3600, default 1)"),
    ("edge", "edge                 - raise the edge interrupt, task stays blocked"),
    ("run", "run                  - let the detect task drain deferred work"),
    ("trace", "trace <on|off>       - toggle transition tracing"),
    ("bitbang", "bitbang <on|off>     - hand the link to the bit-bang transport"),
    ("expect", "expect <state>       - check the detection state"),
    ("telemetry", "telemetry            - dump the telemetry ring"),
    ("status", "status               - show sense line, interrupt, and UART"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Startup,
    Interrupt,
    Debounce,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-session.log",
            TranscriptProfile::Startup => "transcripts/emulator-startup.log",
            TranscriptProfile::Interrupt => "transcripts/emulator-interrupt.log",
            TranscriptProfile::Debounce => "transcripts/emulator-debounce.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Peer Detect Emulator session transcript",
            TranscriptProfile::Startup => "Peer Detect Emulator start-up transcript",
            TranscriptProfile::Interrupt => "Peer Detect Emulator interrupt transcript",
            TranscriptProfile::Debounce => "Peer Detect Emulator debounce transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("session") {
            Ok(Self::Interactive)
        } else if tag.eq_ignore_ascii_case("startup") {
            Ok(Self::Startup)
        } else if tag.eq_ignore_ascii_case("interrupt") {
            Ok(Self::Interrupt)
        } else if tag.eq_ignore_ascii_case("debounce") {
            Ok(Self::Debounce)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Simulated time, advanced one poll period per tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(Duration);

impl SimInstant {
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

#[derive(Clone, Default)]
struct SimClock {
    now: Rc<Cell<Duration>>,
}

impl SimClock {
    fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl TelemetryClock for SimClock {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.now.get())
    }
}

struct SimSense {
    level: bool,
    armed: Rc<Cell<bool>>,
}

impl SenseLevel for SimSense {
    fn is_asserted(&mut self) -> bool {
        self.level
    }
}

impl EdgeInterrupt for SimSense {
    fn enable_edge_interrupt(&mut self) {
        self.armed.set(true);
    }

    fn disable_edge_interrupt(&mut self) {
        self.armed.set(false);
    }
}

/// Interrupt-side view of the arm flag.
struct SimEdge {
    armed: Rc<Cell<bool>>,
}

impl EdgeInterrupt for SimEdge {
    fn enable_edge_interrupt(&mut self) {
        self.armed.set(true);
    }

    fn disable_edge_interrupt(&mut self) {
        self.armed.set(false);
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UartMode {
    #[default]
    Disabled,
    ReceiveOnly,
    FullDuplex,
}

impl UartMode {
    pub fn label(self) -> &'static str {
        match self {
            UartMode::Disabled => "disabled",
            UartMode::ReceiveOnly => "receive-only",
            UartMode::FullDuplex => "full-duplex",
        }
    }
}

#[derive(Default)]
struct SimUart {
    mode: UartMode,
    bitbang: bool,
    pending: Vec<String>,
}

impl SimUart {
    fn set_mode(&mut self, mode: UartMode) {
        self.mode = mode;
        self.pending.push(format!("uart: {}", mode.label()));
    }
}

impl UartControl for SimUart {
    fn enable_receive_only(&mut self) {
        self.set_mode(UartMode::ReceiveOnly);
    }

    fn enable_full_duplex(&mut self) {
        self.set_mode(UartMode::FullDuplex);
    }

    fn disable(&mut self) {
        self.set_mode(UartMode::Disabled);
    }

    fn is_bitbang_active(&self) -> bool {
        self.bitbang
    }
}

/// Collects detector output for the console and mirrors it into telemetry.
struct SessionLog {
    pending: Vec<String>,
    telemetry: TelemetryLog<SimClock>,
}

impl SessionLog {
    fn new(clock: SimClock) -> Self {
        Self {
            pending: Vec::new(),
            telemetry: TelemetryLog::new(clock),
        }
    }
}

impl DetectLog for SessionLog {
    fn notice(&mut self, peer: &'static str, notice: PeerNotice) {
        self.pending.push(format!("{peer} {notice}"));
        self.telemetry.notice(peer, notice);
    }

    fn state_changed(&mut self, peer: &'static str, from: DetectState, to: DetectState) {
        self.telemetry.state_changed(peer, from, to);
    }

    fn transition(&mut self, peer: &'static str, from: DetectState, to: DetectState) {
        self.pending.push(format!("{peer} {from} -> {to}"));
    }
}

/// Bounded deferred queue shared by the edge handler and the detect task.
#[derive(Clone)]
struct HostQueue {
    capacity: usize,
    items: Rc<RefCell<VecDeque<DeferredWork>>>,
}

impl HostQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Rc::default(),
        }
    }

    fn len(&self) -> usize {
        self.items.borrow().len()
    }
}

impl DeferredQueueProducer for HostQueue {
    type Error = ();

    fn try_enqueue(&mut self, work: DeferredWork) -> Result<(), DeferredEnqueueError<()>> {
        let mut items = self.items.borrow_mut();
        if items.len() >= self.capacity {
            return Err(DeferredEnqueueError::QueueFull);
        }

        items.push_back(work);
        Ok(())
    }
}

impl DeferredQueueConsumer for HostQueue {
    type Error = ();

    fn try_dequeue(&mut self) -> Result<Option<DeferredWork>, DeferredDequeueError<()>> {
        Ok(self.items.borrow_mut().pop_front())
    }
}

type SimDetector = PeerDetector<SimSense, SimUart, SessionLog>;

pub struct Session {
    detector: SimDetector,
    edges: EdgeHandler<SimEdge, HostQueue>,
    deferred: HostQueue,
    armed: Rc<Cell<bool>>,
    clock: SimClock,
    transcript: TranscriptLogger,
}

impl Session {
    pub fn new(profile: TranscriptProfile, trace: TraceMode) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        Ok(Self::with_transcript(transcript, trace))
    }

    /// Session whose transcript is thrown away.
    pub fn detached(trace: TraceMode) -> Self {
        Self::with_transcript(TranscriptLogger::discard(), trace)
    }

    fn with_transcript(transcript: TranscriptLogger, trace: TraceMode) -> Self {
        let armed = Rc::new(Cell::new(false));
        let clock = SimClock::default();
        let queue = HostQueue::new(DEFERRED_QUEUE_DEPTH);

        let sense = SimSense {
            level: false,
            armed: Rc::clone(&armed),
        };
        let detector = PeerDetector::new(
            sense,
            SimUart::default(),
            SessionLog::new(clock.clone()),
            DetectorConfig::new(PEER_NAME).with_trace(trace),
        );
        let edges = EdgeHandler::new(
            SimEdge {
                armed: Rc::clone(&armed),
            },
            queue.clone(),
        );

        Self {
            detector,
            edges,
            deferred: queue,
            armed,
            clock,
            transcript,
        }
    }

    pub fn state(&self) -> DetectState {
        self.detector.state()
    }

    pub fn uart_mode(&self) -> UartMode {
        self.detector.uart().mode
    }

    pub fn telemetry(&self) -> Vec<TelemetryRecord<SimInstant>> {
        self.detector
            .log()
            .telemetry
            .recorder()
            .oldest_first()
            .copied()
            .collect()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.elapsed(), TranscriptRole::Host, trimmed)?;

        let mut lines = Vec::new();
        match command::parse(trimmed) {
            Ok(parsed) => self.execute(parsed, &mut lines),
            Err(err) => lines.push(format!("ERR syntax {err}")),
        }

        self.record_output(&lines)?;
        Ok(lines)
    }

    /// Runs a scripted session, failing on the first `expect` that does not hold.
    pub fn run_script(&mut self, script: &[&str]) -> io::Result<Vec<String>> {
        let mut output = Vec::new();
        for line in script {
            let lines = self.handle_command(line)?;
            if let Some(mismatch) = lines.iter().find(|reply| reply.starts_with("MISMATCH")) {
                return Err(io::Error::other(format!("`{line}`: {mismatch}")));
            }
            output.extend(lines);
        }
        Ok(output)
    }

    fn execute(&mut self, command: EmulatorCommand, lines: &mut Vec<String>) {
        match command {
            EmulatorCommand::Level(high) => self.set_level(high, lines),
            EmulatorCommand::Tick(count) => {
                for _ in 0..count {
                    self.tick(lines);
                }
            }
            EmulatorCommand::Edge => self.raise_edge(lines),
            EmulatorCommand::Run => {
                let executed = self.drain(lines);
                lines.push(format!("run: {executed} deferred item(s)"));
            }
            EmulatorCommand::Trace(on) => {
                let mode = if on {
                    TraceMode::Verbose
                } else {
                    TraceMode::Quiet
                };
                self.detector.set_trace(mode);
                lines.push(format!("trace {}", if on { "on" } else { "off" }));
            }
            EmulatorCommand::Bitbang(on) => {
                self.detector.uart_mut().bitbang = on;
                lines.push(format!("bitbang {}", if on { "on" } else { "off" }));
            }
            EmulatorCommand::Expect(expected) => {
                let actual = self.detector.state();
                if actual == expected {
                    lines.push(format!("OK {actual}"));
                } else {
                    lines.push(format!("MISMATCH expected {expected} got {actual}"));
                }
            }
            EmulatorCommand::Telemetry => self.dump_telemetry(lines),
            EmulatorCommand::Status => self.describe_status(lines),
            EmulatorCommand::Console(ConsoleCommand::State) => {
                let mut line = String::new();
                // Writing into a String cannot fail.
                let _ = write_state_line(&mut line, PEER_NAME, self.detector.state());
                lines.push(line);
            }
            EmulatorCommand::Console(ConsoleCommand::Help) => {
                lines.push("Available commands:".to_string());
                for (_, detail) in HELP_TOPICS {
                    lines.push(format!("  {detail}"));
                }
                for detail in HELP_LINES {
                    lines.push(format!("  {detail}"));
                }
            }
        }
    }

    fn set_level(&mut self, high: bool, lines: &mut Vec<String>) {
        let rising = high && !self.detector.sense().level;
        self.detector.sense_mut().level = high;
        lines.push(format!("level {}", if high { "high" } else { "low" }));

        if rising && self.armed.get() {
            self.raise_edge(lines);
            self.drain(lines);
        }
    }

    fn tick(&mut self, lines: &mut Vec<String>) {
        self.clock.advance(POLL_PERIOD);
        let outcome = self.detector.poll();
        self.collect(lines);
        self.drain(lines);
        lines.push(format!(
            "tick +{}s: {} ({})",
            self.clock.now().since_start().as_secs(),
            self.detector.state(),
            describe_poll(outcome)
        ));
    }

    fn raise_edge(&mut self, lines: &mut Vec<String>) {
        let outcome = self.edges.on_edge();
        let now = self.clock.now();
        self.detector
            .log_mut()
            .telemetry
            .recorder_mut()
            .record_edge(outcome, now);
        lines.push(format!("edge: {}", describe_edge(outcome)));
    }

    fn drain(&mut self, lines: &mut Vec<String>) -> usize {
        let executed = match self.detector.drain_deferred(&mut self.deferred) {
            Ok(count) => count,
            Err(err) => {
                lines.push(format!("ERR deferred {err}"));
                0
            }
        };
        self.collect(lines);
        executed
    }

    fn collect(&mut self, lines: &mut Vec<String>) {
        lines.append(&mut self.detector.log_mut().pending);
        lines.append(&mut self.detector.uart_mut().pending);
    }

    fn describe_status(&self, lines: &mut Vec<String>) {
        let sense = self.detector.sense();
        let uart = self.detector.uart();
        lines.push(format!(
            "state={} on={} level={} armed={} uart={} bitbang={} pending={}",
            self.detector.describe_state(),
            self.detector.is_on(),
            if sense.level { "high" } else { "low" },
            self.armed.get(),
            uart.mode.label(),
            uart.bitbang,
            self.deferred.len(),
        ));
    }

    fn dump_telemetry(&self, lines: &mut Vec<String>) {
        let records = self.telemetry();
        lines.push(format!("telemetry ({} records)", records.len()));
        for record in records {
            let at = record.timestamp.since_start().as_secs();
            match record.details {
                TelemetryPayload::Transition(details) => {
                    let held = details
                        .time_in_previous
                        .map_or_else(|| "-".to_string(), |held| format!("{}s", held.as_secs()));
                    lines.push(format!(
                        "  #{} +{at}s {} from={} held={held}",
                        record.id, record.event, details.from
                    ));
                }
                TelemetryPayload::None => {
                    lines.push(format!("  #{} +{at}s {}", record.id, record.event));
                }
            }
        }
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().since_start()
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let elapsed = self.elapsed();
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn describe_poll(outcome: PollOutcome) -> &'static str {
    match outcome {
        PollOutcome::Asserted(_) => "high",
        PollOutcome::SteadyOff => "low, steady",
        PollOutcome::ConfirmedOff => "low, confirmed",
        PollOutcome::DebounceStarted => "low, debouncing",
    }
}

fn describe_edge(outcome: EdgeOutcome) -> &'static str {
    match outcome {
        EdgeOutcome::Scheduled => "activation queued",
        EdgeOutcome::AlreadyPending => "activation already pending",
        EdgeOutcome::Dropped => "dropped",
    }
}

struct TranscriptLogger {
    writer: Box<dyn Write>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: Box::new(BufWriter::new(file)),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn discard() -> Self {
        Self {
            writer: Box::new(io::sink()),
        }
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
