use std::io;

#[allow(dead_code)]
#[path = "../command.rs"]
mod command;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use detect_core::detector::TraceMode;
use detect_core::state::DetectState;
use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Startup)?;
    record_profile(TranscriptProfile::Interrupt)?;
    record_profile(TranscriptProfile::Debounce)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile, TraceMode::Verbose)?;
    let expected = match profile {
        TranscriptProfile::Startup => record_startup(&mut session)?,
        TranscriptProfile::Interrupt => record_interrupt(&mut session)?,
        TranscriptProfile::Debounce | TranscriptProfile::Interactive => {
            record_debounce(&mut session)?
        }
    };

    if session.state() != expected {
        return Err(io::Error::other(format!(
            "{} ended in {} instead of {expected}",
            profile.log_path(),
            session.state()
        )));
    }

    println!(
        "{}: {} (uart {})",
        profile.log_path(),
        session.state(),
        session.uart_mode().label()
    );
    Ok(())
}

fn play(session: &mut Session, script: &[&str]) -> io::Result<()> {
    session.run_script(script).map(|_| ())
}

/// Peer absent at power-on: three low polls.
fn record_startup(session: &mut Session) -> io::Result<DetectState> {
    play(
        session,
        &[
            "level low",
            "tick",
            "expect init_debouncing",
            "tick",
            "expect off",
            "tick",
            "status",
            "ecstate",
        ],
    )?;
    Ok(DetectState::Off)
}

/// Peer wakes while off; the interrupt path turns it on before the next poll.
fn record_interrupt(session: &mut Session) -> io::Result<DetectState> {
    play(
        session,
        &[
            "tick 2",
            "expect off",
            "edge",
            "edge",
            "status",
            "run",
            "expect on",
            "level high",
            "tick",
            "telemetry",
        ],
    )?;
    Ok(DetectState::On)
}

/// Peer on, one low sample (a zero bit), then a real power-off.
fn record_debounce(session: &mut Session) -> io::Result<DetectState> {
    play(
        session,
        &[
            "level high",
            "tick 2",
            "expect on",
            "level low",
            "tick",
            "expect debouncing",
            "level high",
            "expect on",
            "level low",
            "tick 2",
            "expect off",
            "telemetry",
        ],
    )?;
    Ok(DetectState::Off)
}
