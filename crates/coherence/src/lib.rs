//! Snooping-bus cache coherence simulator library.
//!
//! This crate implements per-line cache coherence state machines and a driver that
//! exercises them:
//! 1. **Protocols:** MSI and MESI, each a pure (state, message) table producing the next
//!    state and the bus actions and counters the transition causes.
//! 2. **Driver:** Per-cache line tables, processors replaying memory reference traces,
//!    and an atomic FIFO-arbitrated bus carrying `GETS`, `GETM` and `DATA`.
//! 3. **Simulation:** Configuration, statistics collection, and the single-writer /
//!    multiple-reader invariant checker.

/// Common types (addresses, agents, messages, errors).
pub mod common;
/// Simulator configuration (defaults, violation policy, JSON loading).
pub mod config;
/// Coherence protocols (action contract, MSI, MESI).
pub mod protocol;
/// Simulation driver (line tables, bus, simulator, trace loading).
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or load it from JSON.
pub use crate::config::Config;
/// Per-line protocol state machine interface.
pub use crate::protocol::{CoherenceProtocol, ProtocolKind};
/// Top-level driver; construct with `Simulator::new`.
pub use crate::sim::Simulator;
