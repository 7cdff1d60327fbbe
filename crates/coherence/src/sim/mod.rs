//! Simulation driver.
//!
//! Connects the per-line protocol state machines into a system of private caches on an
//! atomic snooping bus, and feeds it memory reference traces.

/// Atomic snooping bus with FIFO arbitration.
pub mod bus;

/// Cycle-level driver that owns the caches, processors and bus.
pub mod simulator;

/// Per-cache map from line address to protocol state machine.
pub mod table;

/// Memory reference trace parsing.
pub mod trace;

pub use bus::{Bus, BusRequest, Transaction};
pub use simulator::{Simulator, ViolationLog};
pub use table::LineTable;
pub use trace::{Access, MemRef, TraceError, load_trace, parse_trace};
