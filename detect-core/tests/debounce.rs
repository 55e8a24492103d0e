mod common;

use common::{Rig, UartCall};
use detect_core::detector::{PollOutcome, TraceMode};
use detect_core::state::DetectState;

#[test]
fn constant_input_converges_within_two_polls() {
    for level in [false, true] {
        let mut rig = Rig::new();
        rig.poll_with(level);
        let settled = rig.poll_with(level);

        for _ in 0..4 {
            assert_eq!(
                rig.poll_with(level),
                settled,
                "state kept moving under constant level={level}"
            );
        }

        let expected = if level {
            DetectState::On
        } else {
            DetectState::Off
        };
        assert_eq!(settled, expected);
    }
}

#[test]
fn three_low_samples_from_startup_settle_off() {
    let mut rig = Rig::new();

    assert_eq!(rig.poll_with(false), DetectState::InitDebouncing);
    assert!(rig.uart.calls().is_empty());

    assert_eq!(rig.poll_with(false), DetectState::Off);
    assert_eq!(rig.uart.calls(), vec![UartCall::Disable]);

    assert_eq!(rig.poll_with(false), DetectState::Off);
    assert_eq!(
        rig.uart.calls(),
        vec![UartCall::Disable],
        "steady off must not touch the UART again"
    );
    assert_eq!(rig.log_lines(), vec!["EC off".to_string()]);
}

#[test]
fn single_low_sample_keeps_peer_on() {
    let mut rig = Rig::new();
    rig.poll_with(true);
    rig.poll_with(true);
    assert_eq!(rig.detector.state(), DetectState::On);

    assert_eq!(rig.poll_with(false), DetectState::Debouncing);
    assert!(rig.detector.is_on());
    assert!(rig.armed());
    assert!(!rig.uart.calls().contains(&UartCall::Disable));
}

#[test]
fn second_low_sample_commits_off() {
    let mut rig = Rig::new();
    rig.poll_with(true);
    rig.poll_with(true);

    rig.poll_with(false);
    assert!(rig.detector.is_on());

    rig.sense.level.set(false);
    assert_eq!(rig.detector.poll(), PollOutcome::ConfirmedOff);
    assert!(!rig.detector.is_on());
    assert!(!rig.armed());
    assert_eq!(rig.uart.calls().last(), Some(&UartCall::Disable));
}

#[test]
fn low_sample_after_receive_only_start_debounces() {
    let mut rig = Rig::new();
    assert_eq!(rig.poll_with(true), DetectState::InitRxOnly);
    assert_eq!(rig.poll_with(false), DetectState::Debouncing);
    assert_eq!(rig.poll_with(false), DetectState::Off);
}

#[test]
fn verbose_trace_names_every_transition() {
    let mut rig = Rig::with_trace(TraceMode::Verbose);
    rig.poll_with(false);
    rig.poll_with(false);

    assert_eq!(
        rig.log_lines(),
        vec![
            "EC init -> init_debouncing".to_string(),
            "EC off".to_string(),
            "EC init_debouncing -> off".to_string(),
        ]
    );
}
