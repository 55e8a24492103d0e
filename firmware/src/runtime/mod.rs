use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Pull;
use embassy_stm32::usart::{Config as UartConfig, DataBits, Parity, StopBits, Uart};
use embassy_sync::channel::Channel;

use crate::detect::{DeferredQueue, FirmwareClock, FirmwareLog, detector_config};
use crate::hw::{PeerUart, SenseLine};
use detect_core::detector::PeerDetector;

mod console_task;
mod detect_task;

/// Baud rate of the link to the peer.
const PEER_UART_BAUD: u32 = 115_200;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static DEFERRED_QUEUE: DeferredQueue = Channel::new();

fn peer_uart_config() -> UartConfig {
    let mut config = UartConfig::default();
    config.baudrate = PEER_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;
    config
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        EXTI0,
        PA2,
        PA3,
        PA9,
        PA10,
        USART1,
        USART2,
        ..
    } = hal::init(config);

    let sense = SenseLine::new(ExtiInput::new(PA0, EXTI0, Pull::Down));
    let link = Uart::new_blocking(USART1, PA10, PA9, peer_uart_config())
        .expect("failed to initialize peer UART");
    let detector = PeerDetector::new(
        sense,
        PeerUart::new(link),
        FirmwareLog::new(FirmwareClock),
        detector_config(),
    );

    defmt::info!(
        "detect: watching {} (trace={})",
        detector.config().peer(),
        detector.config().trace().is_verbose()
    );

    spawner
        .spawn(detect_task::run(detector, &DEFERRED_QUEUE))
        .expect("failed to spawn detect task");

    spawner
        .spawn(console_task::run(USART2, PA3, PA2))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}
