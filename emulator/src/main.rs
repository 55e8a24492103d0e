mod command;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use detect_core::detector::TraceMode;
use session::{Session, TranscriptProfile};

const USAGE: &str = "Usage: detect-emulator [--profile <session|startup|interrupt|debounce>] [--trace] [--no-transcript]";

struct Options {
    profile: TranscriptProfile,
    trace: TraceMode,
    transcript: bool,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = if options.transcript {
        Session::new(options.profile, options.trace)?
    } else {
        Session::detached(options.trace)
    };
    let mut line = String::new();

    writeln!(
        writer,
        "Peer Detect Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(
                writer,
                "Session closed (state={}, uart={}).",
                session.state(),
                session.uart_mode().label()
            )?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        profile: TranscriptProfile::Interactive,
        trace: TraceMode::Quiet,
        transcript: true,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            options.profile = TranscriptProfile::from_tag(value)?;
        } else if arg == "--profile" {
            let value = args
                .next()
                .ok_or_else(|| "Expected value after --profile".to_string())?;
            options.profile = TranscriptProfile::from_tag(&value)?;
        } else if arg == "--trace" {
            options.trace = TraceMode::Verbose;
        } else if arg == "--no-transcript" {
            options.transcript = false;
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }

    Ok(options)
}
