//! Simulator Scenario Tests.
//!
//! End-to-end runs through processors, line tables and the bus. Every context checks
//! the exclusivity invariant after each transaction, so a run that completes also
//! proves the invariant held throughout.

use cohsim_core::Simulator;
use cohsim_core::common::{LineAddr, SimError};
use cohsim_core::config::{Config, ConfigError};
use cohsim_core::protocol::{CacheLineState, MesiState, MsiState, ProtocolKind};
use cohsim_core::sim::{MemRef, TraceError};
use pretty_assertions::assert_eq;

use crate::common::harness::{LINE, TestContext};

const X: u64 = LINE.0;

// ══════════════════════════════════════════════════════════
// 1. Reference scenarios
// ══════════════════════════════════════════════════════════

/// A reads X alone and gets it exclusive; B then reads X, A supplies it and both
/// end up shared.
#[test]
fn mesi_two_readers() {
    let mut ctx = TestContext::new(ProtocolKind::Mesi, 2).with_refs(&[MemRef::load(0, X)]);

    ctx.sim.step().expect("cycle 1");
    assert_eq!(ctx.state(0), CacheLineState::Mesi(MesiState::E));
    assert_eq!(ctx.sim.stats().cache_misses, 1);

    ctx.sim.submit(MemRef::load(1, X)).expect("cache 1 exists");
    let stats = ctx.run_ok();

    assert_eq!(ctx.states(), ["S", "S"]);
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.silent_upgrades, 0);
    assert_eq!(stats.cache_transfers, 1);
    assert_eq!(stats.memory_fetches, 1);
}

/// Both reads issue in the same cycle; the second is still resolved against the
/// first reader's exclusive copy.
#[test]
fn mesi_two_readers_same_cycle() {
    let mut ctx = TestContext::new(ProtocolKind::Mesi, 2)
        .with_refs(&[MemRef::load(0, X), MemRef::load(1, X)]);
    let stats = ctx.run_ok();

    assert_eq!(ctx.states(), ["S", "S"]);
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.silent_upgrades, 0);
}

/// Cache 1 holds X shared and starts an upgrade, but cache 0's `GETM` wins the bus
/// first: cache 1 drops to `IM`, the upgrade becomes a miss, and its own queued
/// `GETM` completes the write afterwards.
#[test]
fn msi_upgrade_loses_race() {
    let mut ctx = TestContext::new(ProtocolKind::Msi, 2).with_refs(&[MemRef::load(1, X)]);
    let _ = ctx.run_ok();
    assert_eq!(ctx.state(1), CacheLineState::Msi(MsiState::S));
    let misses_before = ctx.sim.stats().cache_misses;

    ctx.sim.submit(MemRef::store(0, X)).expect("cache 0 exists");
    ctx.sim.submit(MemRef::store(1, X)).expect("cache 1 exists");
    ctx.sim.step().expect("first GETM");

    assert_eq!(ctx.state(0), CacheLineState::Msi(MsiState::M));
    assert_eq!(ctx.state(1), CacheLineState::Msi(MsiState::IM));
    // Cache 0's store miss plus cache 1's lost upgrade.
    assert_eq!(ctx.sim.stats().cache_misses, misses_before + 2);

    let stats = ctx.run_ok();
    assert_eq!(ctx.states(), ["I", "M"]);
    assert_eq!(stats.cache_transfers, 1);
    assert_eq!(stats.invalidations, 2);
}

// ══════════════════════════════════════════════════════════
// 2. Ownership and upgrades
// ══════════════════════════════════════════════════════════

#[test]
fn modified_owner_hands_off_to_writer() {
    let mut ctx = TestContext::new(ProtocolKind::Mesi, 2)
        .with_trace("0 STORE 0x40\n1 STORE 0x40\n");
    let stats = ctx.run_ok();

    assert_eq!(ctx.states(), ["I", "M"]);
    assert_eq!(stats.bus_getm, 2);
    assert_eq!(stats.cache_transfers, 1);
}

#[test]
fn modified_owner_downgrades_for_reader() {
    let mut ctx = TestContext::new(ProtocolKind::Msi, 3)
        .with_trace("0 STORE 0x40\n2 LOAD 0x40\n");
    let stats = ctx.run_ok();

    assert_eq!(ctx.states(), ["S", "I", "S"]);
    assert_eq!(stats.cache_transfers, 1);
    assert_eq!(stats.bus_gets, 1);
}

#[test]
fn exclusive_store_upgrades_silently() {
    let mut ctx = TestContext::new(ProtocolKind::Mesi, 2)
        .with_refs(&[MemRef::load(0, X), MemRef::store(0, X), MemRef::load(0, X)]);
    let stats = ctx.run_ok();

    assert_eq!(ctx.state(0), CacheLineState::Mesi(MesiState::M));
    assert_eq!(stats.silent_upgrades, 1);
    assert_eq!(stats.bus_transactions(), 1);
    assert_eq!(stats.hits, 2);
}

#[test]
fn msi_store_after_load_needs_the_bus() {
    let mut ctx = TestContext::new(ProtocolKind::Msi, 1)
        .with_refs(&[MemRef::load(0, X), MemRef::store(0, X)]);
    let stats = ctx.run_ok();

    assert_eq!(ctx.state(0), CacheLineState::Msi(MsiState::M));
    assert_eq!(stats.bus_gets, 1);
    assert_eq!(stats.bus_getm, 1);
    assert_eq!(stats.cache_misses, 1, "an upgrade is not a miss");
}

#[test]
fn lines_are_independent() {
    let mut ctx = TestContext::new(ProtocolKind::Mesi, 2)
        .with_trace("0 STORE 0x40\n1 STORE 0x80\n0 LOAD 0x80\n");
    let _ = ctx.run_ok();

    assert_eq!(ctx.states(), ["M", "I"]);
    assert_eq!(
        ctx.sim.line_state(0, LineAddr(0x80)),
        CacheLineState::Mesi(MesiState::S)
    );
    assert_eq!(
        ctx.sim.line_state(1, LineAddr(0x80)),
        CacheLineState::Mesi(MesiState::S)
    );
}

// ══════════════════════════════════════════════════════════
// 3. Driver behavior
// ══════════════════════════════════════════════════════════

#[test]
fn counts_references_and_cycles() {
    let mut ctx = TestContext::new(ProtocolKind::Mesi, 2).with_trace(
        "0 LOAD 0x40\n0 LOAD 0x40\n1 STORE 0x80\n1 LOAD 0x80\n",
    );
    assert!(!ctx.sim.is_finished());
    let stats = ctx.run_ok();

    assert!(ctx.sim.is_finished());
    assert_eq!(stats.loads, 3);
    assert_eq!(stats.stores, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.references(), 4);
    assert!(stats.cycles >= 2);
    assert!(ctx.sim.violations().is_empty());
}

#[test]
fn empty_run_finishes_immediately() {
    let mut ctx = TestContext::new(ProtocolKind::Msi, 4);
    assert!(ctx.sim.is_finished());
    let stats = ctx.run_ok();
    assert_eq!(stats.cycles, 0);
}

#[test]
fn cycle_limit_stops_run() {
    let mut ctx = TestContext::with_config(Config {
        num_caches: 1,
        max_cycles: Some(1),
        ..Config::default()
    })
    .with_refs(&[MemRef::load(0, X), MemRef::load(0, 0x80)]);

    let err = ctx.run().expect_err("two misses need two cycles");
    assert!(matches!(err, SimError::CycleLimit(1)), "{err}");
}

#[test]
fn submit_rejects_unknown_cache() {
    let mut ctx = TestContext::new(ProtocolKind::Mesi, 2);
    let err = ctx
        .sim
        .submit(MemRef::load(5, X))
        .expect_err("cache 5 does not exist");
    assert!(matches!(
        err,
        SimError::Trace(TraceError::CacheOutOfRange {
            cache: 5,
            num_caches: 2,
            ..
        })
    ));
}

#[test]
fn invalid_config_is_rejected() {
    let err = Simulator::new(&Config {
        num_caches: 0,
        ..Config::default()
    })
    .expect_err("zero caches");
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "num_caches",
            ..
        }
    ));
}

#[test]
fn unreferenced_lines_are_invalid() {
    let ctx = TestContext::new(ProtocolKind::Msi, 2);
    assert!(ctx.state(0).is_invalid());
    assert!(ctx.sim.verify_coherence().is_ok());
}

#[test]
fn collecting_policy_runs_clean_trace_without_violations() {
    let mut ctx = TestContext::collecting(ProtocolKind::Msi, 3)
        .with_trace("0 LOAD 0x40\n1 STORE 0x40\n2 LOAD 0x40\n0 STORE 0x40\n");
    let stats = ctx.run_ok();

    assert_eq!(stats.violations, 0);
    assert!(ctx.sim.violations().is_empty());
    assert!(ctx.sim.verify_coherence().is_ok());
}
