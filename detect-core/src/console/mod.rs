//! One-line state dump for the diagnostic console.
//!
//! The console surface is intentionally tiny: `state` (or `ecstate`) prints
//! the current detection state, `help` lists that. Parsing uses `winnow` over
//! the raw line so the firmware and emulator share one grammar.

use core::fmt;

use winnow::combinator::{alt, eof, terminated};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::state::DetectState;

/// Column at which the state name starts in the dump line.
const STATE_COLUMN: usize = 9;

/// Commands understood by the console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    /// Print the detection state line.
    State,
    /// Print the command list.
    Help,
}

/// Help text for each console command.
pub const HELP_LINES: &[&str] = &["state    - print the peer detection state"];

/// Errors emitted while parsing a console line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleParseError<'a> {
    /// Line held only whitespace.
    Empty,
    /// First word is not a console command.
    UnknownCommand(&'a str),
    /// Extra input after a complete command.
    TrailingInput(&'a str),
}

impl fmt::Display for ConsoleParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleParseError::Empty => f.write_str("empty command"),
            ConsoleParseError::UnknownCommand(word) => write!(f, "unknown command `{word}`"),
            ConsoleParseError::TrailingInput(rest) => write!(f, "unexpected input `{rest}`"),
        }
    }
}

fn word<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        .parse_next(input)
}

fn command(input: &mut &str) -> ModalResult<ConsoleCommand> {
    alt((
        "ecstate".value(ConsoleCommand::State),
        "state".value(ConsoleCommand::State),
        "help".value(ConsoleCommand::Help),
    ))
    .parse_next(input)
}

/// Parses a single console line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleParseError<'_>> {
    let mut input = line.trim();
    if input.is_empty() {
        return Err(ConsoleParseError::Empty);
    }

    let start = input;
    let Ok(head) = word.parse_next(&mut input) else {
        return Err(ConsoleParseError::UnknownCommand(start));
    };

    let mut keyword = head;
    let parsed = terminated(command, eof).parse_next(&mut keyword);
    let Ok(parsed) = parsed else {
        return Err(ConsoleParseError::UnknownCommand(head));
    };

    let rest = input.trim_start();
    if rest.is_empty() {
        Ok(parsed)
    } else {
        Err(ConsoleParseError::TrailingInput(rest))
    }
}

/// Renders `<peer>:      <state>` for the console.
#[derive(Copy, Clone, Debug)]
pub struct StateLine {
    peer: &'static str,
    state: DetectState,
}

impl StateLine {
    #[must_use]
    pub const fn new(peer: &'static str, state: DetectState) -> Self {
        Self { peer, state }
    }
}

impl fmt::Display for StateLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.peer)?;
        let used = self.peer.len() + 1;
        let pad = STATE_COLUMN.saturating_sub(used).max(1);
        for _ in 0..pad {
            f.write_str(" ")?;
        }
        f.write_str(self.state.name())
    }
}

/// Writes the state dump line.
pub fn write_state_line<W: fmt::Write>(
    writer: &mut W,
    peer: &'static str,
    state: DetectState,
) -> fmt::Result {
    write!(writer, "{}", StateLine::new(peer, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    #[test]
    fn parses_state_aliases() {
        assert_eq!(parse_command("state"), Ok(ConsoleCommand::State));
        assert_eq!(parse_command("  ecstate  "), Ok(ConsoleCommand::State));
        assert_eq!(parse_command("help"), Ok(ConsoleCommand::Help));
    }

    #[test]
    fn rejects_unknown_and_partial_words() {
        assert_eq!(parse_command(""), Err(ConsoleParseError::Empty));
        assert_eq!(
            parse_command("stat"),
            Err(ConsoleParseError::UnknownCommand("stat"))
        );
        assert_eq!(
            parse_command("statefoo"),
            Err(ConsoleParseError::UnknownCommand("statefoo"))
        );
        assert_eq!(
            parse_command("?"),
            Err(ConsoleParseError::UnknownCommand("?"))
        );
    }

    #[test]
    fn rejects_arguments() {
        assert_eq!(
            parse_command("state now"),
            Err(ConsoleParseError::TrailingInput("now"))
        );
    }

    #[test]
    fn state_line_matches_console_layout() {
        let mut line: String<32> = String::new();
        write_state_line(&mut line, "EC", DetectState::On).unwrap();
        assert_eq!(line.as_str(), "EC:      on");
    }

    #[test]
    fn long_peer_names_keep_a_separator() {
        let mut line: String<48> = String::new();
        write_state_line(&mut line, "COMPANION", DetectState::InitDebouncing).unwrap();
        assert_eq!(line.as_str(), "COMPANION: init_debouncing");
    }
}
