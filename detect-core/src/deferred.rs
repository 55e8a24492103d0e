//! Interrupt-to-task handoff for the sense-line edge.
//!
//! The edge interrupt never touches detector state. It disarms itself and
//! pushes a [`DeferredWork`] item into a bounded queue; the detection task
//! drains that queue and runs the work with full access to the detector.
//! Firmware backs the queue with an Embassy channel, host tooling with a
//! `VecDeque`.

use core::fmt;

/// Depth of the deferred queue. One item in flight per interrupt source.
pub const DEFERRED_QUEUE_DEPTH: usize = 1;

/// Unit of work scheduled from interrupt context.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeferredWork {
    /// Run the idempotent "ensure the peer is on" activation.
    EnsureOn,
}

/// Error surfaced when deferred work cannot be enqueued.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeferredEnqueueError<E = ()> {
    /// Queue already holds as many items as it can.
    QueueFull,
    /// Queue has been disconnected from its consumer.
    Disconnected,
    /// Transport-specific failure.
    Other(E),
}

impl<E> DeferredEnqueueError<E> {
    /// Maps the inner error type.
    pub fn map_other<F, M>(self, mapper: M) -> DeferredEnqueueError<F>
    where
        M: FnOnce(E) -> F,
    {
        match self {
            DeferredEnqueueError::QueueFull => DeferredEnqueueError::QueueFull,
            DeferredEnqueueError::Disconnected => DeferredEnqueueError::Disconnected,
            DeferredEnqueueError::Other(err) => DeferredEnqueueError::Other(mapper(err)),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for DeferredEnqueueError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredEnqueueError::QueueFull => f.write_str("deferred queue full"),
            DeferredEnqueueError::Disconnected => f.write_str("deferred queue disconnected"),
            DeferredEnqueueError::Other(err) => write!(f, "deferred queue error: {err:?}"),
        }
    }
}

/// Error surfaced when dequeueing deferred work fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeferredDequeueError<E = ()> {
    /// Queue has been disconnected from its producers.
    Disconnected,
    /// Transport-specific failure.
    Other(E),
}

impl<E> DeferredDequeueError<E> {
    /// Maps the inner error type.
    pub fn map_other<F, M>(self, mapper: M) -> DeferredDequeueError<F>
    where
        M: FnOnce(E) -> F,
    {
        match self {
            DeferredDequeueError::Disconnected => DeferredDequeueError::Disconnected,
            DeferredDequeueError::Other(err) => DeferredDequeueError::Other(mapper(err)),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for DeferredDequeueError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredDequeueError::Disconnected => f.write_str("deferred queue disconnected"),
            DeferredDequeueError::Other(err) => write!(f, "deferred queue error: {err:?}"),
        }
    }
}

/// Producer half used from interrupt context.
pub trait DeferredQueueProducer {
    /// Transport-specific error type.
    type Error;

    /// Attempts to enqueue work without blocking.
    fn try_enqueue(&mut self, work: DeferredWork)
    -> Result<(), DeferredEnqueueError<Self::Error>>;
}

/// Consumer half drained by the detection task.
pub trait DeferredQueueConsumer {
    /// Transport-specific error type.
    type Error;

    /// Attempts to dequeue work without blocking.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    fn try_dequeue(&mut self) -> Result<Option<DeferredWork>, DeferredDequeueError<Self::Error>>;
}

/// Arm/disarm control for the sense-line edge interrupt.
///
/// Both operations are idempotent. `disable_edge_interrupt` must be safe to
/// call from interrupt context.
pub trait EdgeInterrupt {
    /// Arms the edge interrupt.
    fn enable_edge_interrupt(&mut self);

    /// Disarms the edge interrupt.
    fn disable_edge_interrupt(&mut self);
}

/// Result of servicing one edge interrupt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeOutcome {
    /// Activation was queued for the detection task.
    Scheduled,
    /// An activation was already in flight; nothing new was queued.
    AlreadyPending,
    /// The queue consumer is gone; the edge was dropped.
    Dropped,
}

/// Interrupt-side handle: only disarms the edge and enqueues work.
///
/// It holds no reference to the detector.
pub struct EdgeHandler<G, P> {
    edge: G,
    producer: P,
}

impl<G, P> EdgeHandler<G, P>
where
    G: EdgeInterrupt,
    P: DeferredQueueProducer,
{
    /// Creates a handler from an edge control handle and a queue producer.
    pub const fn new(edge: G, producer: P) -> Self {
        Self { edge, producer }
    }

    /// Services an asserted edge.
    pub fn on_edge(&mut self) -> EdgeOutcome {
        self.edge.disable_edge_interrupt();

        match self.producer.try_enqueue(DeferredWork::EnsureOn) {
            Ok(()) => EdgeOutcome::Scheduled,
            Err(DeferredEnqueueError::QueueFull) => EdgeOutcome::AlreadyPending,
            Err(DeferredEnqueueError::Disconnected | DeferredEnqueueError::Other(_)) => {
                EdgeOutcome::Dropped
            }
        }
    }

    /// Accesses the queue producer.
    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Accesses the edge control handle.
    pub fn edge(&self) -> &G {
        &self.edge
    }
}
