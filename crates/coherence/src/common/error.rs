//! Protocol violation and simulation error definitions.
//!
//! This module defines the error handling for the simulator. It provides:
//! 1. **Protocol Violations:** The single error kind a coherence state machine can raise.
//! 2. **Simulation Errors:** What the driver reports back to its caller, unifying violations,
//!    configuration and trace failures, and invariant breaches.

use thiserror::Error;

use super::addr::{CacheId, LineAddr, NodeId};
use super::message::MessageKind;
use crate::config::ConfigError;
use crate::protocol::CacheLineState;
use crate::sim::trace::TraceError;

/// Why a message was rejected by a line's state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ViolationKind {
    /// A processor message arrived while the line was waiting on a bus reply.
    ///
    /// Each processor may have only one outstanding request per line.
    #[error("only one outstanding request per line is allowed")]
    OutstandingRequest,

    /// The message is not legal in the line's current state.
    ///
    /// Covers `DATA` arriving for a line the cache already holds, and messages
    /// delivered through the wrong entry point (bus messages to the processor side,
    /// processor messages to the snoop side).
    #[error("message is not legal in this state")]
    UnexpectedMessage,
}

/// A coherence protocol violation.
///
/// Indicates either an illegal interleaving produced by the driver or a hole in the
/// protocol tables. Carries enough context to diagnose the fault: the cache, the line,
/// the state it was in, and the offending message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("protocol violation in cache {cache}: line {addr} in state {state} got {message} from {origin}: {kind}")]
pub struct ProtocolViolation {
    /// Cache that owns the offending line.
    pub cache: CacheId,
    /// Address of the offending line.
    pub addr: LineAddr,
    /// State the line was in when the message arrived (left unchanged).
    pub state: CacheLineState,
    /// Kind of the rejected message.
    pub message: MessageKind,
    /// Originator of the rejected message.
    pub origin: NodeId,
    /// Classification of the violation.
    pub kind: ViolationKind,
}

/// Errors reported by the simulation driver.
#[derive(Debug, Error)]
pub enum SimError {
    /// A line's state machine rejected a message and the run is configured to abort.
    #[error(transparent)]
    Violation(#[from] ProtocolViolation),

    /// The configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A memory reference trace could not be loaded.
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// The single-writer/multiple-reader invariant does not hold for a line.
    #[error("coherence breach on line {addr}: owners {owners:?}, sharers {sharers:?}")]
    CoherenceBreach {
        /// The line on which the breach was observed.
        addr: LineAddr,
        /// Caches holding the line in `M` or `E`.
        owners: Vec<CacheId>,
        /// Caches holding the line in `S`.
        sharers: Vec<CacheId>,
    },

    /// The run did not drain within the configured cycle bound.
    #[error("simulation did not finish within {0} cycles")]
    CycleLimit(u64),
}
