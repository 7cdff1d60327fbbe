//! Per-cache line table.
//!
//! Maps each line a cache has referenced to the protocol state machine that owns it.
//! Records are created lazily, in `I`, on the first processor reference; snooped
//! messages for lines the cache never referenced are equivalent to `I` and do not
//! create records.

use std::collections::BTreeMap;

use crate::common::{CacheId, LineAddr};
use crate::protocol::{CacheLineState, CoherenceProtocol, ProtocolKind};

/// The lines held by one cache.
#[derive(Debug)]
pub struct LineTable {
    cache: CacheId,
    protocol: ProtocolKind,
    lines: BTreeMap<LineAddr, Box<dyn CoherenceProtocol>>,
}

impl LineTable {
    /// Creates an empty table for `cache` whose lines run `protocol`.
    pub const fn new(cache: CacheId, protocol: ProtocolKind) -> Self {
        Self {
            cache,
            protocol,
            lines: BTreeMap::new(),
        }
    }

    /// Returns the cache this table belongs to.
    pub const fn cache(&self) -> CacheId {
        self.cache
    }

    /// Returns the protocol every line in this table runs.
    pub const fn protocol(&self) -> ProtocolKind {
        self.protocol
    }

    /// Returns the state machine for `addr`, creating it in `I` on first reference.
    pub fn get_or_create_line(&mut self, addr: LineAddr) -> &mut dyn CoherenceProtocol {
        let (cache, protocol) = (self.cache, self.protocol);
        self.lines
            .entry(addr)
            .or_insert_with(|| protocol.instantiate(cache, addr))
            .as_mut()
    }

    /// Returns the state machine for `addr` if the cache ever referenced it.
    pub fn line(&self, addr: LineAddr) -> Option<&dyn CoherenceProtocol> {
        self.lines.get(&addr).map(AsRef::as_ref)
    }

    /// Mutable variant of [`LineTable::line`].
    pub fn line_mut(&mut self, addr: LineAddr) -> Option<&mut dyn CoherenceProtocol> {
        match self.lines.get_mut(&addr) {
            Some(line) => Some(line.as_mut()),
            None => None,
        }
    }

    /// Returns the state of `addr`; lines never referenced are `I`.
    pub fn state(&self, addr: LineAddr) -> CacheLineState {
        self.line(addr).map_or_else(
            || self.protocol.instantiate(self.cache, addr).current_state(),
            CoherenceProtocol::current_state,
        )
    }

    /// Iterates `(address, state)` over every line record, in address order.
    pub fn states(&self) -> impl Iterator<Item = (LineAddr, CacheLineState)> + '_ {
        self.lines
            .iter()
            .map(|(addr, line)| (*addr, line.current_state()))
    }

    /// Number of line records.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if the cache has not referenced any line.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
