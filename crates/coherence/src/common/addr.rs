//! Line addresses and bus agent identifiers.
//!
//! This module defines the strong types that name *where* a coherence event happens:
//! 1. **Line Addresses:** The coherence unit; one state machine exists per (cache, line).
//! 2. **Cache Identifiers:** Index of a private cache (and its processor) on the bus.
//! 3. **Bus Agents:** Either a cache or main memory, used as the source of a message.

use std::fmt;

/// Index of a private cache on the shared bus.
///
/// Cache `n` is paired with processor `n`; identifiers are dense and start at zero.
pub type CacheId = usize;

/// Address of a cache line (the coherence unit).
///
/// The simulator does not model offsets within a line: every reference is already
/// line-granular when it reaches the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineAddr(pub u64);

impl LineAddr {
    /// Creates a new line address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LineAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for LineAddr {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}

/// An agent attached to the bus that can originate a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// A private cache (or the processor behind it).
    Cache(CacheId),
    /// Main memory; only ever the source of `DATA` replies.
    Memory,
}

impl NodeId {
    /// Returns the cache index, or `None` for main memory.
    pub const fn cache(self) -> Option<CacheId> {
        match self {
            Self::Cache(id) => Some(id),
            Self::Memory => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache(id) => write!(f, "cache{id}"),
            Self::Memory => f.write_str("memory"),
        }
    }
}
