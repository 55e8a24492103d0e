use detect_core::deferred::EdgeHandler;
use detect_core::detector::{POLL_PERIOD, PeerDetector};
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};

use crate::detect::{DeferredConsumer, DeferredProducer, DeferredQueue, FirmwareLog};
use crate::hw::{EdgeArm, PeerUart, SenseLine};
use crate::status;

pub type FirmwareDetector = PeerDetector<SenseLine, PeerUart, FirmwareLog>;

#[embassy_executor::task]
pub async fn run(mut detector: FirmwareDetector, queue: &'static DeferredQueue) -> ! {
    let mut edges = EdgeHandler::new(EdgeArm, DeferredProducer::new(queue.sender()));
    let mut deferred = DeferredConsumer::new(queue.receiver());
    let period = Duration::try_from(POLL_PERIOD).expect("poll period exceeds timer range");
    let mut ticker = Ticker::every(period);

    status::publish_state(detector.state());

    loop {
        let wake = select(ticker.next(), detector.sense_mut().wait_for_edge()).await;
        match wake {
            Either::First(()) => {
                detector.poll();
            }
            Either::Second(()) => {
                let outcome = edges.on_edge();
                let now = detector.log().now();
                detector.log_mut().recorder_mut().record_edge(outcome, now);
            }
        }

        if detector.drain_deferred(&mut deferred).is_err() {
            defmt::warn!("detect: deferred queue unavailable");
        }

        status::publish_state(detector.state());
    }
}
