//! Line assembly for the debug console.
//!
//! Bytes arrive one at a time from the USART. A line that outgrows the
//! buffer is dropped whole: everything up to the next terminator is skipped
//! so its tail is never parsed as a command of its own.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use heapless::String;

#[derive(Debug, Eq, PartialEq)]
pub enum LineEvent<'a> {
    /// Byte stored or skipped; no line yet.
    Pending,
    /// A terminator closed this line. It stays valid until the next push.
    Line(&'a str),
    /// The line outgrew the buffer and is being discarded.
    Overflow,
}

pub struct LineBuffer<const N: usize> {
    line: String<N>,
    complete: bool,
    discarding: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            line: String::new(),
            complete: false,
            discarding: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> LineEvent<'_> {
        if core::mem::take(&mut self.complete) {
            self.line.clear();
        }

        match byte {
            b'\r' | b'\n' if self.discarding => {
                self.discarding = false;
                LineEvent::Pending
            }
            b'\r' | b'\n' => {
                self.complete = true;
                LineEvent::Line(self.line.as_str())
            }
            _ if self.discarding => LineEvent::Pending,
            other => {
                if self.line.push(char::from(other)).is_ok() {
                    return LineEvent::Pending;
                }
                self.line.clear();
                self.discarding = true;
                LineEvent::Overflow
            }
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
