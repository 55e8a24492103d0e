#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use detect_core::deferred::{
    DEFERRED_QUEUE_DEPTH, DeferredDequeueError, DeferredEnqueueError, DeferredQueueConsumer,
    DeferredQueueProducer, DeferredWork, EdgeInterrupt,
};
use detect_core::detector::{
    DetectLog, DetectorConfig, PeerDetector, PeerNotice, SenseLevel, TraceMode, UartControl,
};
use detect_core::state::DetectState;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UartCall {
    RxOnly,
    FullDuplex,
    Disable,
}

/// Sense line whose level and arm flag are shared with the test body.
#[derive(Clone, Default)]
pub struct SimSense {
    pub level: Rc<Cell<bool>>,
    pub armed: Rc<Cell<bool>>,
}

impl SimSense {
    pub fn edge(&self) -> SimEdge {
        SimEdge {
            armed: Rc::clone(&self.armed),
        }
    }
}

impl SenseLevel for SimSense {
    fn is_asserted(&mut self) -> bool {
        self.level.get()
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

/// Interrupt-side view of the sense line arm flag.
pub struct SimEdge {
    pub armed: Rc<Cell<bool>>,
}

impl EdgeInterrupt for SimEdge {
    fn enable_edge_interrupt(&mut self) {
        self.armed.set(true);
    }

    fn disable_edge_interrupt(&mut self) {
        self.armed.set(false);
    }
}

#[derive(Clone, Default)]
pub struct SimUart {
    pub bitbang: bool,
    pub calls: Rc<RefCell<Vec<UartCall>>>,
}

impl SimUart {
    pub fn calls(&self) -> Vec<UartCall> {
        self.calls.borrow().clone()
    }
}

impl UartControl for SimUart {
    fn enable_receive_only(&mut self) {
        self.calls.borrow_mut().push(UartCall::RxOnly);
    }

    fn enable_full_duplex(&mut self) {
        self.calls.borrow_mut().push(UartCall::FullDuplex);
    }

    fn disable(&mut self) {
        self.calls.borrow_mut().push(UartCall::Disable);
    }

    fn is_bitbang_active(&self) -> bool {
        self.bitbang
    }
}

#[derive(Default)]
pub struct LineLog {
    pub lines: Vec<String>,
}

impl DetectLog for LineLog {
    fn notice(&mut self, peer: &'static str, notice: PeerNotice) {
        self.lines.push(format!("{peer} {notice}"));
    }

    fn transition(&mut self, peer: &'static str, from: DetectState, to: DetectState) {
        self.lines.push(format!("{peer} {from} -> {to}"));
    }
}

/// Bounded FIFO shared between the edge handler and the detection task.
#[derive(Clone, Default)]
pub struct SharedQueue {
    pub items: Rc<RefCell<VecDeque<DeferredWork>>>,
}

impl DeferredQueueProducer for SharedQueue {
    type Error = ();

    fn try_enqueue(&mut self, work: DeferredWork) -> Result<(), DeferredEnqueueError<()>> {
        let mut items = self.items.borrow_mut();
        if items.len() >= DEFERRED_QUEUE_DEPTH {
            return Err(DeferredEnqueueError::QueueFull);
        }
        items.push_back(work);
        Ok(())
    }
}

impl DeferredQueueConsumer for SharedQueue {
    type Error = ();

    fn try_dequeue(&mut self) -> Result<Option<DeferredWork>, DeferredDequeueError<()>> {
        Ok(self.items.borrow_mut().pop_front())
    }
}

pub type TestDetector = PeerDetector<SimSense, SimUart, LineLog>;

pub struct Rig {
    pub sense: SimSense,
    pub uart: SimUart,
    pub detector: TestDetector,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_trace(TraceMode::Quiet)
    }

    pub fn with_trace(trace: TraceMode) -> Self {
        Self::build(SimUart::default(), trace)
    }

    pub fn with_bitbang() -> Self {
        Self::build(
            SimUart {
                bitbang: true,
                ..SimUart::default()
            },
            TraceMode::Quiet,
        )
    }

    fn build(uart: SimUart, trace: TraceMode) -> Self {
        let sense = SimSense::default();
        let detector = PeerDetector::new(
            sense.clone(),
            uart.clone(),
            LineLog::default(),
            DetectorConfig::new("EC").with_trace(trace),
        );
        Self {
            sense,
            uart,
            detector,
        }
    }

    pub fn poll_with(&mut self, level: bool) -> DetectState {
        self.sense.level.set(level);
        self.detector.poll();
        self.detector.state()
    }

    pub fn armed(&self) -> bool {
        self.sense.armed.get()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.detector.log().lines.clone()
    }
}
