//! MSI Transition Table Tests.
//!
//! Drives a single `MsiProtocol` line through every (state, message) pair of the
//! table and checks the next state, the requested actions and the counters.
//! Requests are issued by cache 0 unless noted; snooped requests come from cache 1.

use cohsim_core::common::{Message, NodeId, ViolationKind};
use cohsim_core::protocol::{
    Action, CacheLineState, CoherenceProtocol, MsiProtocol, MsiState, SharedLine,
};
use cohsim_core::stats::Counter;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{LINE, getm, gets, load, store};

fn line(state: MsiState) -> MsiProtocol {
    MsiProtocol::with_state(0, LINE, state)
}

fn memory_data() -> Message {
    Message::data(NodeId::Memory, LINE)
}

// ══════════════════════════════════════════════════════════
// 1. Processor requests
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::load_miss(MsiState::I, load(0), MsiState::IS, vec![Action::IssueGets], vec![Counter::CacheMiss])]
#[case::store_miss(MsiState::I, store(0), MsiState::IM, vec![Action::IssueGetm], vec![Counter::CacheMiss])]
#[case::load_hit_shared(MsiState::S, load(0), MsiState::S, vec![Action::DataToProcessor], vec![])]
#[case::store_upgrade(MsiState::S, store(0), MsiState::SM, vec![Action::IssueGetm], vec![])]
#[case::load_hit_modified(MsiState::M, load(0), MsiState::M, vec![Action::DataToProcessor], vec![])]
#[case::store_hit_modified(MsiState::M, store(0), MsiState::M, vec![Action::DataToProcessor], vec![])]
fn processor_transitions(
    #[case] from: MsiState,
    #[case] msg: Message,
    #[case] to: MsiState,
    #[case] actions: Vec<Action>,
    #[case] counters: Vec<Counter>,
) {
    let mut line = line(from);
    let outcome = line.process_cache_request(&msg).expect("legal transition");

    assert_eq!(line.state(), to);
    assert_eq!(outcome.actions(), actions.as_slice());
    assert_eq!(outcome.counters(), counters.as_slice());
}

/// A store upgrade from `S` is not a miss; only the racing-writer path counts one.
#[test]
fn upgrade_from_shared_is_not_a_miss() {
    let mut line = line(MsiState::S);
    let outcome = line.process_cache_request(&store(0)).expect("legal transition");
    assert!(outcome.counters().is_empty());
}

// ══════════════════════════════════════════════════════════
// 2. Snooped messages
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::invalid_ignores_gets(MsiState::I, gets(1), MsiState::I, vec![], vec![])]
#[case::invalid_ignores_getm(MsiState::I, getm(1), MsiState::I, vec![], vec![])]
#[case::invalid_ignores_data(MsiState::I, memory_data(), MsiState::I, vec![], vec![])]
#[case::is_ignores_gets(MsiState::IS, gets(1), MsiState::IS, vec![], vec![])]
#[case::is_ignores_getm(MsiState::IS, getm(1), MsiState::IS, vec![], vec![])]
#[case::is_fill(MsiState::IS, memory_data(), MsiState::S, vec![Action::DataToProcessor], vec![])]
#[case::im_ignores_getm(MsiState::IM, getm(1), MsiState::IM, vec![], vec![])]
#[case::im_fill(MsiState::IM, memory_data(), MsiState::M, vec![Action::DataToProcessor], vec![])]
#[case::shared_ignores_gets(MsiState::S, gets(1), MsiState::S, vec![], vec![])]
#[case::shared_invalidated(MsiState::S, getm(1), MsiState::I, vec![], vec![Counter::Invalidation])]
#[case::sm_ignores_gets(MsiState::SM, gets(1), MsiState::SM, vec![], vec![])]
#[case::sm_loses_race(MsiState::SM, getm(1), MsiState::IM, vec![], vec![Counter::CacheMiss, Counter::Invalidation])]
#[case::sm_fill(MsiState::SM, memory_data(), MsiState::M, vec![Action::DataToProcessor], vec![])]
#[case::owner_downgrades(
    MsiState::M,
    gets(1),
    MsiState::S,
    vec![Action::AssertSharedLine, Action::DataOnBus { dest: NodeId::Cache(1) }],
    vec![]
)]
#[case::owner_invalidated(
    MsiState::M,
    getm(1),
    MsiState::I,
    vec![Action::AssertSharedLine, Action::DataOnBus { dest: NodeId::Cache(1) }],
    vec![Counter::Invalidation]
)]
fn snoop_transitions(
    #[case] from: MsiState,
    #[case] msg: Message,
    #[case] to: MsiState,
    #[case] actions: Vec<Action>,
    #[case] counters: Vec<Counter>,
) {
    let mut line = line(from);
    let outcome = line
        .process_snoop_request(&msg, SharedLine::new())
        .expect("legal transition");

    assert_eq!(line.state(), to);
    assert_eq!(outcome.actions(), actions.as_slice());
    assert_eq!(outcome.counters(), counters.as_slice());
}

/// `IM` tolerates a foreign `GETS` and stays put. The reader's copy is invalidated
/// when this cache's own `GETM`, queued behind the `GETS`, is serviced.
#[test]
fn im_silently_ignores_foreign_gets() {
    let mut line = line(MsiState::IM);
    let outcome = line
        .process_snoop_request(&gets(1), SharedLine::new())
        .expect("IM + GETS is tolerated");

    assert_eq!(line.state(), MsiState::IM);
    assert!(outcome.is_empty());
}

/// MSI does not read the shared line: a fill from `IS` always lands in `S`.
#[test]
fn shared_line_does_not_affect_msi_fill() {
    let mut line = line(MsiState::IS);
    let _ = line
        .process_snoop_request(&memory_data(), SharedLine::asserted())
        .expect("legal transition");
    assert_eq!(line.state(), MsiState::S);
}

// ══════════════════════════════════════════════════════════
// 3. Violations
// ══════════════════════════════════════════════════════════

#[rstest]
fn second_request_while_transient_is_rejected(
    #[values(MsiState::IS, MsiState::IM, MsiState::SM)] from: MsiState,
    #[values(load(0), store(0))] msg: Message,
) {
    let mut line = line(from);
    let violation = line
        .process_cache_request(&msg)
        .expect_err("must be rejected");

    assert_eq!(violation.kind, ViolationKind::OutstandingRequest);
    assert_eq!(violation.state, CacheLineState::Msi(from));
    assert_eq!(violation.message, msg.kind);
    assert_eq!(line.state(), from, "rejected message must not change state");
}

#[rstest]
fn data_for_a_held_line_is_rejected(#[values(MsiState::S, MsiState::M)] from: MsiState) {
    let mut line = line(from);
    let violation = line
        .process_snoop_request(&memory_data(), SharedLine::new())
        .expect_err("must be rejected");

    assert_eq!(violation.kind, ViolationKind::UnexpectedMessage);
    assert_eq!(violation.origin, NodeId::Memory);
    assert_eq!(line.state(), from);
}

#[rstest]
fn bus_message_on_processor_side_is_rejected(
    #[values(MsiState::I, MsiState::S, MsiState::M)] from: MsiState,
    #[values(gets(1), getm(1), memory_data())] msg: Message,
) {
    let mut line = line(from);
    let violation = line.process_cache_request(&msg).expect_err("must be rejected");
    assert_eq!(violation.kind, ViolationKind::UnexpectedMessage);
    assert_eq!(line.state(), from);
}

#[rstest]
fn processor_message_on_snoop_side_is_rejected(
    #[values(MsiState::I, MsiState::IS, MsiState::S, MsiState::M)] from: MsiState,
    #[values(load(1), store(1))] msg: Message,
) {
    let mut line = line(from);
    let violation = line
        .process_snoop_request(&msg, SharedLine::new())
        .expect_err("must be rejected");
    assert_eq!(violation.kind, ViolationKind::UnexpectedMessage);
    assert_eq!(line.state(), from);
}

#[test]
fn violation_identifies_cache_and_line() {
    let mut line = MsiProtocol::with_state(3, LINE, MsiState::IS);
    let violation = line
        .process_cache_request(&Message::load(3, LINE))
        .expect_err("must be rejected");

    assert_eq!(violation.cache, 3);
    assert_eq!(violation.addr, LINE);
    assert_eq!(violation.origin, NodeId::Cache(3));
    let text = violation.to_string();
    assert!(text.contains("cache 3"), "{text}");
    assert!(text.contains("IS"), "{text}");
}

// ══════════════════════════════════════════════════════════
// 4. Names
// ══════════════════════════════════════════════════════════

#[test]
fn state_names_are_mnemonics() {
    let names: Vec<_> = [
        MsiState::I,
        MsiState::IS,
        MsiState::IM,
        MsiState::S,
        MsiState::SM,
        MsiState::M,
    ]
    .into_iter()
    .map(|s| line(s).state_name())
    .collect();
    assert_eq!(names, ["I", "IS", "IM", "S", "SM", "M"]);
}

#[test]
fn new_line_starts_invalid() {
    let line = MsiProtocol::new(0, LINE);
    assert_eq!(line.current_state(), CacheLineState::Msi(MsiState::I));
    assert!(line.current_state().is_invalid());
}
