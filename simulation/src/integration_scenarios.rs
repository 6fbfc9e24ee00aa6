//! Integration scenarios testing the full stack end to end
//!
//! These run real controllers (engine + monitor tasks) over shared lines
//! with the accelerated timing preset, and assert on the reports, pin
//! snapshots, and completion lists each scenario must produce.

use std::time::Duration;

use wirepair_core::{ControllerId, FailureReason, LineName, Role, SignalTiming};
use wirepair_line::LineKind;

use crate::actors::Pinger;
use crate::harness::{ScenarioBuilder, ScenarioOutcome};
use crate::scenarios::{self, ScenarioOptions};

const A: ControllerId = ControllerId('A');
const B: ControllerId = ControllerId('B');

fn opts() -> ScenarioOptions {
    ScenarioOptions {
        timing: SignalTiming::accelerated(),
        max_duration: Duration::from_secs(30),
    }
}

/// Assert that exactly one controller paired as initiator and the other as
/// responder on `line`, with no failures anywhere
fn assert_clean_pairing(outcome: &ScenarioOutcome, line: &LineName) {
    assert!(
        outcome.failed().is_empty(),
        "unexpected failures: {:?}",
        outcome.failed()
    );

    let roles = outcome.roles_on(line);
    assert_eq!(roles.len(), 2, "expected two pairings on {line}: {roles:?}");
    let initiators = roles
        .iter()
        .filter(|(_, role)| *role == Role::Initiator)
        .count();
    let responders = roles
        .iter()
        .filter(|(_, role)| *role == Role::Responder)
        .count();
    assert_eq!(initiators, 1, "exactly one initiator on {line}: {roles:?}");
    assert_eq!(responders, 1, "exactly one responder on {line}: {roles:?}");

    for id in [A, B] {
        let (white, black) = outcome
            .completed(id)
            .unwrap_or_else(|| panic!("{id} never completed"));
        assert!(white.iter().any(|pin| pin.line == *line));
        assert!(black.is_empty(), "{id} blacklisted lines: {black:?}");
    }
}

/// Two controllers share one reliable line: exactly one initiator, one
/// responder, no failures
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_reliable_line_pairs_cleanly() {
    let outcome = ScenarioBuilder::new()
        .timing(SignalTiming::accelerated())
        .line("L1", LineKind::Reliable)
        .controller(A, &["L1"])
        .controller(B, &["L1"])
        .build()
        .unwrap()
        .run_until_complete(Duration::from_secs(30))
        .await
        .unwrap();

    assert_clean_pairing(&outcome, &"L1".into());
}

/// A fully dead line ends up in both black lists, never white-listed
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dead_unreliable_line_is_blacklisted_on_both_sides() {
    let outcome = scenarios::run_unreliable(1.0, &opts()).await.unwrap();
    let line: LineName = "L1".into();

    assert!(outcome.working().is_empty());
    for id in [A, B] {
        let (white, black) = outcome
            .completed(id)
            .unwrap_or_else(|| panic!("{id} never completed"));
        assert!(white.is_empty());
        assert_eq!(black.len(), 1);
        assert_eq!(black[0].line, line);
        assert!(matches!(
            black[0].failure,
            Some(FailureReason::Timeout) | Some(FailureReason::Disturbed)
        ));
    }
}

/// A one-way line whose sole sender never transmits: the probing controller
/// observes nothing, never becomes responder, and fails the line
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_way_line_stays_silent_for_non_sender() {
    let outcome = scenarios::run_one_way(&opts()).await.unwrap();
    let line: LineName = "L1".into();

    assert!(outcome.working().is_empty());
    let pin = outcome.pin(B, &line).expect("pin for L1");
    assert!(pin.blacklisted);
    assert!(!pin.successful);
    assert_eq!(pin.failure, Some(FailureReason::Timeout));
    // The controller transmitted (so it briefly held the initiator role)
    // but must never have been promoted to responder by a spurious SYN
    assert_ne!(pin.role, Some(Role::Responder));
    assert!(!pin.syn_ack && !pin.ack);

    // The line itself never carried a level: only the controller's ignored
    // drive attempts appear nowhere in the activity trace
    assert!(outcome.trace.is_empty(), "one-way line recorded activity: {:?}", outcome.trace);
}

/// Both controllers land in the same contention slot on the same line;
/// the overlap still resolves into one initiator and one responder
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_contention_resolves_roles() {
    let outcome = scenarios::run_collision(&opts()).await.unwrap();
    assert_clean_pairing(&outcome, &"L1".into());
}

/// A latched interference source drives the false-response counter to the
/// ceiling: the line is blacklisted as disturbed
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_latched_interference_disturbs_line() {
    let outcome = scenarios::run_disturbed(&opts()).await.unwrap();
    let line: LineName = "L1".into();

    let pin = outcome.pin(A, &line).expect("pin for L1");
    assert!(pin.blacklisted);
    assert_eq!(pin.failure, Some(FailureReason::Disturbed));
    assert_eq!(
        pin.false_responses,
        SignalTiming::accelerated().max_false_responses
    );

    let (white, black) = outcome.completed(A).expect("A never completed");
    assert!(white.is_empty());
    assert_eq!(black.len(), 1);
}

/// Two controllers over three reliable lines eventually white-list all of
/// them on both sides
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multi_line_pairing_tests_every_line() {
    // Cross-line collisions cost false responses; give the lines more
    // headroom than the default ceiling so retries can win out
    let timing = SignalTiming {
        max_false_responses: 5,
        ..SignalTiming::accelerated()
    };
    let outcome = scenarios::run_pairing(
        3,
        &ScenarioOptions {
            timing,
            max_duration: Duration::from_secs(60),
        },
    )
    .await
    .unwrap();

    for id in [A, B] {
        let (white, black) = outcome
            .completed(id)
            .unwrap_or_else(|| panic!("{id} never completed"));
        assert!(black.is_empty(), "{id} blacklisted lines: {black:?}");
        assert_eq!(white.len(), 3, "{id} white list: {white:?}");
    }
}

/// An early stop yields partial results, clean joins, and released lines
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_early_stop_releases_lines_and_reports_partially() {
    let scenario = ScenarioBuilder::new()
        .timing(SignalTiming::accelerated())
        .line("L1", LineKind::Reliable)
        .controller(A, &["L1"])
        .controller(B, &["L1"])
        .build()
        .unwrap();
    let line = scenario.line("L1").unwrap();

    // Far too short for a full handshake
    let outcome = scenario.run_for(Duration::from_millis(200)).await.unwrap();

    assert!(outcome.completed(A).is_none());
    assert!(outcome.completed(B).is_none());
    assert!(outcome.working().is_empty());
    assert!(!line.observe(), "line left asserted after early stop");
}

/// Interference pulses during the wait must not abort the whole controller:
/// a disturbed line is skipped and the remaining line still pairs
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disturbed_line_does_not_abort_controller() {
    // B gives up on CLEAN long before A escapes the noisy line; a generous
    // passive grace keeps B answering when A's SYN finally arrives
    let timing = SignalTiming {
        grace_period: Duration::from_secs(5),
        ..SignalTiming::accelerated()
    };
    let scenario = ScenarioBuilder::new()
        .timing(timing.clone())
        .line("NOISY", LineKind::Reliable)
        .line("CLEAN", LineKind::Reliable)
        .controller(A, &["NOISY", "CLEAN"])
        .controller(B, &["CLEAN"])
        .build()
        .unwrap();

    let noisy = scenario.line("NOISY").unwrap();
    let mut pinger = Pinger::latched(ControllerId('P'), noisy);
    pinger.start();

    let outcome = scenario
        .run_until_complete(Duration::from_secs(30))
        .await
        .unwrap();
    pinger.stop();
    pinger.join().await;

    let noisy_pin = outcome.pin(A, &"NOISY".into()).unwrap();
    assert!(noisy_pin.blacklisted);
    assert_eq!(noisy_pin.failure, Some(FailureReason::Disturbed));

    let clean_pin = outcome.pin(A, &"CLEAN".into()).unwrap();
    assert!(clean_pin.successful, "clean line never paired: {clean_pin:?}");

    let (white, black) = outcome.completed(A).expect("A never completed");
    assert_eq!(white.len(), 1);
    assert_eq!(black.len(), 1);
}
