//! Emulator command grammar.
//!
//! Simulation commands are parsed here; anything else falls through to the
//! firmware console grammar so `state` and `help` behave exactly as they do
//! on the board.

use detect_core::console::{ConsoleCommand, parse_command};
use detect_core::state::DetectState;
use winnow::ascii::{dec_uint, space1};
use winnow::combinator::{alt, eof, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EmulatorCommand {
    /// Drive the sense line high (`true`) or low.
    Level(bool),
    /// Advance simulated time by this many poll periods.
    Tick(u32),
    /// Raise the edge interrupt without letting the detect task run.
    Edge,
    /// Let the detect task drain deferred work.
    Run,
    Trace(bool),
    Bitbang(bool),
    /// Check the detector is in the given state.
    Expect(DetectState),
    Telemetry,
    Status,
    Console(ConsoleCommand),
}

fn switch(input: &mut &str) -> ModalResult<bool> {
    alt(("on".value(true), "off".value(false))).parse_next(input)
}

fn level(input: &mut &str) -> ModalResult<bool> {
    alt((
        "high".value(true),
        "low".value(false),
        "1".value(true),
        "0".value(false),
    ))
    .parse_next(input)
}

fn state_name(input: &mut &str) -> ModalResult<DetectState> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
        .verify_map(DetectState::from_name)
        .parse_next(input)
}

/// Upper bound on a single `tick` count: one hour of poll periods.
pub const MAX_TICKS: u32 = 3600;

fn tick(input: &mut &str) -> ModalResult<u32> {
    let count = dec_uint.verify(|count: &u32| (1..=MAX_TICKS).contains(count));
    preceded("tick", opt(preceded(space1, count)))
        .map(|count: Option<u32>| count.unwrap_or(1))
        .parse_next(input)
}

fn command(input: &mut &str) -> ModalResult<EmulatorCommand> {
    alt((
        preceded(("level", space1), level).map(EmulatorCommand::Level),
        tick.map(EmulatorCommand::Tick),
        "edge".value(EmulatorCommand::Edge),
        "run".value(EmulatorCommand::Run),
        preceded(("trace", space1), switch).map(EmulatorCommand::Trace),
        preceded(("bitbang", space1), switch).map(EmulatorCommand::Bitbang),
        preceded(("expect", space1), state_name).map(EmulatorCommand::Expect),
        "telemetry".value(EmulatorCommand::Telemetry),
        "status".value(EmulatorCommand::Status),
    ))
    .parse_next(input)
}

/// Parses one emulator input line.
pub fn parse(line: &str) -> Result<EmulatorCommand, String> {
    let trimmed = line.trim();
    if let Ok(parsed) = terminated(command, eof).parse(trimmed) {
        return Ok(parsed);
    }

    parse_command(trimmed)
        .map(EmulatorCommand::Console)
        .map_err(|err| err.to_string())
}
