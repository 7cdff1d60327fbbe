//! Atomic snooping bus.
//!
//! This module implements the shared bus the caches snoop. It provides:
//! 1. **Arbitration:** Requests queue in FIFO order; one transaction is granted per cycle.
//! 2. **Broadcast:** A granted `GETS`/`GETM` is snooped by every cache except the
//!    requester, in cache-id order, while a fresh shared-line signal collects assertions.
//! 3. **Data reply:** The first cache that puts its copy on the bus supplies the line;
//!    otherwise main memory does. `DATA` goes to the requester only.

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use super::simulator::ViolationLog;
use super::table::LineTable;
use crate::common::{CacheId, LineAddr, Message, MessageKind, NodeId, ProtocolViolation};
use crate::protocol::SharedLine;
use crate::stats::SimStats;

/// A `GETS` or `GETM` waiting for the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusRequest {
    /// The cache that issued the request.
    pub requester: CacheId,
    /// `GETS` or `GETM`.
    pub kind: MessageKind,
    /// The requested line.
    pub addr: LineAddr,
}

impl BusRequest {
    /// Returns the message snoopers observe for this request.
    pub const fn message(&self) -> Message {
        Message::new(self.kind, self.addr, NodeId::Cache(self.requester))
    }
}

impl fmt::Display for BusRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} by cache{}", self.kind, self.addr, self.requester)
    }
}

/// The result of one serviced bus transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// The request that was granted.
    pub request: BusRequest,
    /// The shared-line signal after every snooper responded.
    pub shared_line: SharedLine,
    /// The cache that supplied the data, or `None` if memory did.
    pub supplier: Option<CacheId>,
}

impl Transaction {
    /// Returns the node the `DATA` reply came from.
    pub fn data_source(&self) -> NodeId {
        self.supplier.map_or(NodeId::Memory, NodeId::Cache)
    }
}

/// FIFO-arbitrated snooping bus.
#[derive(Debug, Default)]
pub struct Bus {
    queue: VecDeque<BusRequest>,
}

impl Bus {
    /// Creates an idle bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a request behind every request already waiting.
    pub fn request(&mut self, req: BusRequest) {
        debug!(requester = req.requester, kind = %req.kind, addr = %req.addr, "bus request queued");
        self.queue.push_back(req);
    }

    /// Grants the bus to the oldest waiting request.
    pub fn grant(&mut self) -> Option<BusRequest> {
        self.queue.pop_front()
    }

    /// Number of requests waiting for the bus.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no request is waiting.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Services one granted request to completion.
    ///
    /// Snoopers that never referenced the line are in `I` and ignore the request, so
    /// only caches with a record for the line are consulted.
    ///
    /// # Arguments
    ///
    /// * `req` - The granted request.
    /// * `tables` - Every cache's line table, indexed by cache id.
    /// * `stats` - Receives protocol counters and bus traffic counts.
    /// * `log` - Decides whether a violation aborts the transaction.
    ///
    /// # Returns
    ///
    /// The completed transaction, or the violation that aborted it.
    pub fn service(
        req: BusRequest,
        tables: &mut [LineTable],
        stats: &mut SimStats,
        log: &mut ViolationLog,
    ) -> Result<Transaction, ProtocolViolation> {
        debug!(requester = req.requester, kind = %req.kind, addr = %req.addr, "bus granted");

        let snooped = req.message();
        let mut shared = SharedLine::new();
        let mut supplier = None;

        for table in tables.iter_mut().filter(|t| t.cache() != req.requester) {
            let cache = table.cache();
            let Some(line) = table.line_mut(req.addr) else {
                continue;
            };
            match line.process_snoop_request(&snooped, shared) {
                Ok(outcome) => {
                    outcome.record_into(stats);
                    shared = shared.fold(&outcome);
                    if supplier.is_none() && outcome.data_on_bus().is_some() {
                        supplier = Some(cache);
                    }
                }
                Err(violation) => log.handle(violation, stats)?,
            }
        }

        let txn = Transaction {
            request: req,
            shared_line: shared,
            supplier,
        };
        match txn.supplier {
            Some(_) => stats.cache_transfers += 1,
            None => stats.memory_fetches += 1,
        }
        match req.kind {
            MessageKind::Getm => stats.bus_getm += 1,
            _ => stats.bus_gets += 1,
        }

        let reply = Message::data(txn.data_source(), req.addr);
        let requester = tables[req.requester].get_or_create_line(req.addr);
        match requester.process_snoop_request(&reply, shared) {
            Ok(outcome) => outcome.record_into(stats),
            Err(violation) => log.handle(violation, stats)?,
        }

        debug!(
            requester = req.requester,
            kind = %req.kind,
            addr = %req.addr,
            supplier = %txn.data_source(),
            shared = shared.is_asserted(),
            "bus transaction complete"
        );
        Ok(txn)
    }
}
