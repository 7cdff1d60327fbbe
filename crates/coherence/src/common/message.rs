//! Coherence messages.
//!
//! A [`Message`] is the immutable descriptor of one event delivered to a line's state
//! machine. Processor messages (`LOAD`, `STORE`) arrive through the cache entry point;
//! bus messages (`GETS`, `GETM`, `DATA`) arrive through the snoop entry point.

use std::fmt;

use super::addr::{CacheId, LineAddr, NodeId};

/// Kind of a coherence message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Processor read of a line.
    Load,
    /// Processor write of a line.
    Store,
    /// Bus request for a shared (read-only) copy.
    Gets,
    /// Bus request for a modifiable (exclusive) copy.
    Getm,
    /// Bus reply carrying the line's contents; terminates a pending `GETS`/`GETM`.
    Data,
}

impl MessageKind {
    /// Returns `true` for messages that originate at the local processor.
    pub const fn is_processor(self) -> bool {
        matches!(self, Self::Load | Self::Store)
    }

    /// Returns `true` for messages that travel on the shared bus.
    pub const fn is_bus(self) -> bool {
        !self.is_processor()
    }

    /// Returns the upper-case mnemonic used in traces and diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Load => "LOAD",
            Self::Store => "STORE",
            Self::Gets => "GETS",
            Self::Getm => "GETM",
            Self::Data => "DATA",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One coherence event: what happened, to which line, and who caused it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message {
    /// What kind of event this is.
    pub kind: MessageKind,
    /// The line the event refers to.
    pub addr: LineAddr,
    /// The agent that originated the message.
    pub source: NodeId,
}

impl Message {
    /// Creates a message from its parts.
    pub const fn new(kind: MessageKind, addr: LineAddr, source: NodeId) -> Self {
        Self { kind, addr, source }
    }

    /// A processor read issued by the processor paired with `cache`.
    pub const fn load(cache: CacheId, addr: LineAddr) -> Self {
        Self::new(MessageKind::Load, addr, NodeId::Cache(cache))
    }

    /// A processor write issued by the processor paired with `cache`.
    pub const fn store(cache: CacheId, addr: LineAddr) -> Self {
        Self::new(MessageKind::Store, addr, NodeId::Cache(cache))
    }

    /// A `GETS` placed on the bus by `cache`.
    pub const fn gets(cache: CacheId, addr: LineAddr) -> Self {
        Self::new(MessageKind::Gets, addr, NodeId::Cache(cache))
    }

    /// A `GETM` placed on the bus by `cache`.
    pub const fn getm(cache: CacheId, addr: LineAddr) -> Self {
        Self::new(MessageKind::Getm, addr, NodeId::Cache(cache))
    }

    /// A `DATA` reply supplied by `from` (a cache or main memory).
    pub const fn data(from: NodeId, addr: LineAddr) -> Self {
        Self::new(MessageKind::Data, addr, from)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} from {}", self.kind, self.addr, self.source)
    }
}
