//! Board adapters for the peer sense line and the peer UART.
//!
//! The sense line is an EXTI input; "arming" the edge interrupt means the
//! detect task is allowed to await a rising edge on it. The peer UART is
//! brought up by Embassy once at start-up so pins and baud rate are set, and
//! afterwards only its CR1 enable bits are toggled.

#![cfg(target_os = "none")]

use detect_core::deferred::EdgeInterrupt;
use detect_core::detector::{SenseLevel, UartControl};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::mode::Blocking;
use embassy_stm32::pac;
use embassy_stm32::usart::Uart;
use portable_atomic::{AtomicBool, Ordering};

use crate::status;

/// Whether the detect task should wake on a sense-line edge.
static EDGE_ARMED: AtomicBool = AtomicBool::new(false);

fn set_edge_armed(armed: bool) {
    EDGE_ARMED.store(armed, Ordering::Release);
}

/// Sense line owned by the detector.
pub struct SenseLine {
    input: ExtiInput<'static>,
}

impl SenseLine {
    pub fn new(input: ExtiInput<'static>) -> Self {
        set_edge_armed(false);
        Self { input }
    }

    /// Resolves on the next rising edge. Never resolves while disarmed.
    pub async fn wait_for_edge(&mut self) {
        if EDGE_ARMED.load(Ordering::Acquire) {
            self.input.wait_for_rising_edge().await;
        } else {
            core::future::pending::<()>().await;
        }
    }
}

impl SenseLevel for SenseLine {
    fn is_asserted(&mut self) -> bool {
        self.input.is_high()
    }
}

impl EdgeInterrupt for SenseLine {
    fn enable_edge_interrupt(&mut self) {
        set_edge_armed(true);
    }

    fn disable_edge_interrupt(&mut self) {
        set_edge_armed(false);
    }
}

/// Edge control handle given to the edge handler.
#[derive(Copy, Clone, Debug, Default)]
pub struct EdgeArm;

impl EdgeInterrupt for EdgeArm {
    fn enable_edge_interrupt(&mut self) {
        set_edge_armed(true);
    }

    fn disable_edge_interrupt(&mut self) {
        set_edge_armed(false);
    }
}

/// Peer UART with independent receive and transmit enables.
pub struct PeerUart {
    regs: pac::usart::Usart,
    // Held so Embassy keeps the pins in their alternate function.
    _link: Uart<'static, Blocking>,
}

impl PeerUart {
    /// Takes over an initialized USART1 link and disables it until the peer shows up.
    pub fn new(link: Uart<'static, Blocking>) -> Self {
        let mut uart = Self {
            regs: pac::USART1,
            _link: link,
        };
        uart.disable();
        uart
    }

    fn set_enables(&mut self, receive: bool, transmit: bool) {
        self.regs.cr1().modify(|w| {
            w.set_re(receive);
            w.set_te(transmit);
            w.set_ue(receive || transmit);
        });
    }
}

impl UartControl for PeerUart {
    fn enable_receive_only(&mut self) {
        self.set_enables(true, false);
    }

    fn enable_full_duplex(&mut self) {
        self.set_enables(true, true);
    }

    fn disable(&mut self) {
        self.set_enables(false, false);
    }

    fn is_bitbang_active(&self) -> bool {
        status::bitbang_active()
    }
}
