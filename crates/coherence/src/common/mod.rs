//! Common types used throughout the coherence simulator.
//!
//! This module provides the building blocks shared by the protocols and the driver:
//! 1. **Address Types:** Line addresses, cache identifiers, and bus agents.
//! 2. **Messages:** The processor and bus events delivered to a line.
//! 3. **Error Handling:** Protocol violations and simulation errors.

/// Line address and agent identifier types.
pub mod addr;

/// Error types (protocol violations, simulation errors).
pub mod error;

/// Coherence message definitions.
pub mod message;

pub use addr::{CacheId, LineAddr, NodeId};
pub use error::{ProtocolViolation, SimError, ViolationKind};
pub use message::{Message, MessageKind};
