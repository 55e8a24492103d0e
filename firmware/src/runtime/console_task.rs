//! One-line state dump over the debug USART.

use core::fmt::Write as _;

use detect_core::console::{ConsoleCommand, HELP_LINES, parse_command, write_state_line};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig};
use embassy_time::Timer;
use embedded_io_async::{Read, Write};
use heapless::String;
use static_cell::StaticCell;

use crate::console::{LineBuffer, LineEvent};
use crate::detect::PEER_NAME;
use crate::status;

const CONSOLE_BAUD: u32 = 115_200;
const CONSOLE_BUFFER_SIZE: usize = 64;
const LINE_CAPACITY: usize = 32;
const REPLY_CAPACITY: usize = 96;

static TX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct ConsoleIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART2>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_BAUD;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        TX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        RX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        ConsoleIrqs,
        config,
    )
    .expect("failed to initialize console UART");
    let (mut tx, mut rx) = uart.split();

    let mut line: LineBuffer<LINE_CAPACITY> = LineBuffer::new();
    let mut byte = [0u8; 1];

    loop {
        match rx.read(&mut byte).await {
            Ok(0) => {}
            Ok(_) => match line.push(byte[0]) {
                LineEvent::Pending => {}
                LineEvent::Line(text) => {
                    let reply = respond(text);
                    if !reply.is_empty() && tx.write_all(reply.as_bytes()).await.is_err() {
                        defmt::warn!("console: UART write error");
                    }
                }
                LineEvent::Overflow => defmt::warn!("console: line too long, discarded"),
            },
            Err(_) => {
                defmt::warn!("console: UART read error");
                Timer::after_millis(5).await;
            }
        }
    }
}

fn respond(line: &str) -> String<REPLY_CAPACITY> {
    let mut reply = String::new();
    let written = match parse_command(line) {
        Ok(ConsoleCommand::State) => write_state_line(&mut reply, PEER_NAME, status::peer_state()),
        Ok(ConsoleCommand::Help) => HELP_LINES
            .iter()
            .enumerate()
            .try_for_each(|(index, help)| {
                if index > 0 {
                    reply.write_str("\r\n")?;
                }
                reply.write_str(help)
            }),
        Err(detect_core::console::ConsoleParseError::Empty) => return reply,
        Err(err) => write!(reply, "{err}"),
    };

    if written.is_err() || reply.write_str("\r\n").is_err() {
        defmt::warn!("console: reply truncated");
    }
    reply
}
