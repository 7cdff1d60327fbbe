//! Action Contract Tests.
//!
//! Verifies the `Outcome` queries the driver relies on and the fold semantics of the
//! per-transaction shared-line signal.

use cohsim_core::common::{MessageKind, NodeId};
use cohsim_core::protocol::{Action, Outcome, SharedLine};
use cohsim_core::stats::{Counter, SimStats};
use pretty_assertions::assert_eq;

use crate::common::mocks::stats::MockSink;

#[test]
fn empty_outcome_has_no_effects() {
    let outcome = Outcome::none();
    assert!(outcome.is_empty());
    assert_eq!(outcome.bus_request(), None);
    assert!(!outcome.replies_to_processor());
    assert!(!outcome.asserts_shared_line());
    assert_eq!(outcome.data_on_bus(), None);
}

#[test]
fn bus_request_reports_issued_kind() {
    let gets = Outcome::none().action(Action::IssueGets);
    let getm = Outcome::none().action(Action::IssueGetm);
    assert_eq!(gets.bus_request(), Some(MessageKind::Gets));
    assert_eq!(getm.bus_request(), Some(MessageKind::Getm));
}

#[test]
fn data_on_bus_reports_destination() {
    let outcome = Outcome::none()
        .action(Action::AssertSharedLine)
        .action(Action::DataOnBus {
            dest: NodeId::Cache(2),
        });
    assert!(outcome.asserts_shared_line());
    assert_eq!(outcome.data_on_bus(), Some(NodeId::Cache(2)));
}

#[test]
fn actions_keep_issue_order() {
    let outcome = Outcome::none()
        .action(Action::DataToProcessor)
        .action(Action::AssertSharedLine);
    assert_eq!(
        outcome.actions(),
        [Action::DataToProcessor, Action::AssertSharedLine]
    );
}

#[test]
fn counters_are_forwarded_in_order() {
    let outcome = Outcome::none()
        .count(Counter::CacheMiss)
        .count(Counter::Invalidation);

    let mut seq = mockall::Sequence::new();
    let mut sink = MockSink::new();
    let _ = sink
        .expect_increment()
        .withf(|c| *c == Counter::CacheMiss)
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let _ = sink
        .expect_increment()
        .withf(|c| *c == Counter::Invalidation)
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    outcome.record_into(&mut sink);
}

#[test]
fn counters_land_in_sim_stats() {
    let mut stats = SimStats::default();
    Outcome::none()
        .count(Counter::CacheMiss)
        .count(Counter::SilentUpgrade)
        .count(Counter::CacheMiss)
        .record_into(&mut stats);

    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.silent_upgrades, 1);
    assert_eq!(stats.invalidations, 0);
}

// ══════════════════════════════════════════════════════════
// Shared line
// ══════════════════════════════════════════════════════════

#[test]
fn shared_line_starts_deasserted() {
    assert!(!SharedLine::new().is_asserted());
    assert!(!SharedLine::default().is_asserted());
}

#[test]
fn fold_asserts_on_any_assertion() {
    let quiet = Outcome::none();
    let loud = Outcome::none().action(Action::AssertSharedLine);

    let line = SharedLine::new().fold(&quiet);
    assert!(!line.is_asserted());
    let line = line.fold(&loud);
    assert!(line.is_asserted());
}

#[test]
fn fold_never_clears() {
    let line = SharedLine::asserted().fold(&Outcome::none());
    assert!(line.is_asserted());
}

#[test]
fn assert_line_is_idempotent() {
    let mut line = SharedLine::new();
    line.assert_line();
    line.assert_line();
    assert_eq!(line, SharedLine::asserted());
}
