//! Cache coherence protocols.
//!
//! Each cache line is owned by one protocol state machine. The machine has exactly two
//! entry points, one for the local processor and one for messages snooped off the bus,
//! and answers every message with a new state plus an [`Outcome`]: the bus traffic,
//! processor replies and counter increments the transition causes.
//!
//! # Protocols
//!
//! - `MSI`: Modified / Shared / Invalid with `IS`, `IM` and `SM` transients.
//! - `MESI`: adds Exclusive; a read miss resolves to `E` or `S` through the shared line.

/// MESI protocol state machine.
pub mod mesi;

/// MSI protocol state machine.
pub mod msi;

pub use mesi::{MesiProtocol, MesiState};
pub use msi::{MsiProtocol, MsiState};

use std::fmt;

use serde::Deserialize;
use tracing::trace;

use crate::common::{
    CacheId, LineAddr, Message, MessageKind, NodeId, ProtocolViolation, ViolationKind,
};
use crate::stats::{Counter, StatsSink};

/// Trait for per-line coherence state machines.
///
/// Implementations must answer every (state, message) pair: either with a transition
/// (possibly to the same state) or with a [`ProtocolViolation`]. A rejected message
/// leaves the state unchanged. Handlers never block.
pub trait CoherenceProtocol: fmt::Debug + Send + Sync {
    /// Handles a `LOAD` or `STORE` from the local processor.
    ///
    /// # Arguments
    ///
    /// * `msg` - The processor message.
    ///
    /// # Returns
    ///
    /// The actions the transition requests, or a violation if the line is waiting on a
    /// bus reply or the message is not a processor message.
    fn process_cache_request(&mut self, msg: &Message) -> Result<Outcome, ProtocolViolation>;

    /// Handles a `GETS`, `GETM` or `DATA` observed on the bus.
    ///
    /// # Arguments
    ///
    /// * `msg` - The snooped bus message.
    /// * `shared` - The shared-line signal of the transaction being serviced. Only a
    ///   requester resolving a `DATA` reply reads it.
    ///
    /// # Returns
    ///
    /// The actions the transition requests, or a violation for messages that are not
    /// legal in the current state.
    fn process_snoop_request(
        &mut self,
        msg: &Message,
        shared: SharedLine,
    ) -> Result<Outcome, ProtocolViolation>;

    /// Returns the line's current state.
    fn current_state(&self) -> CacheLineState;

    /// Returns the human-readable name of the current state.
    fn state_name(&self) -> &'static str {
        self.current_state().name()
    }
}

/// State of one cache line, tagged with the protocol it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheLineState {
    /// A line driven by the MSI protocol.
    Msi(MsiState),
    /// A line driven by the MESI protocol.
    Mesi(MesiState),
}

impl CacheLineState {
    /// Returns the state's mnemonic (`I`, `ISE`, `SM`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Msi(s) => s.name(),
            Self::Mesi(s) => s.name(),
        }
    }

    /// Returns `true` while the line awaits a bus reply.
    pub const fn is_transient(self) -> bool {
        match self {
            Self::Msi(s) => s.is_transient(),
            Self::Mesi(s) => s.is_transient(),
        }
    }

    /// Returns `true` if the line is held in `M` or `E`.
    pub const fn is_owner(self) -> bool {
        matches!(
            self,
            Self::Msi(MsiState::M) | Self::Mesi(MesiState::M | MesiState::E)
        )
    }

    /// Returns `true` if the line is held in the stable `S` state.
    pub const fn is_sharer(self) -> bool {
        matches!(self, Self::Msi(MsiState::S) | Self::Mesi(MesiState::S))
    }

    /// Returns `true` if the line is `I`.
    pub const fn is_invalid(self) -> bool {
        matches!(self, Self::Msi(MsiState::I) | Self::Mesi(MesiState::I))
    }
}

impl fmt::Display for CacheLineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<MsiState> for CacheLineState {
    fn from(state: MsiState) -> Self {
        Self::Msi(state)
    }
}

impl From<MesiState> for CacheLineState {
    fn from(state: MesiState) -> Self {
        Self::Mesi(state)
    }
}

/// Which coherence protocol the caches run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProtocolKind {
    /// Modified / Shared / Invalid.
    #[serde(alias = "Msi", alias = "msi")]
    Msi,
    /// Modified / Exclusive / Shared / Invalid.
    #[default]
    #[serde(alias = "Mesi", alias = "mesi")]
    Mesi,
}

impl ProtocolKind {
    /// Builds a fresh state machine for `addr` in `cache`, starting in `I`.
    pub fn instantiate(self, cache: CacheId, addr: LineAddr) -> Box<dyn CoherenceProtocol> {
        match self {
            Self::Msi => Box::new(MsiProtocol::new(cache, addr)),
            Self::Mesi => Box::new(MesiProtocol::new(cache, addr)),
        }
    }

    /// Returns the protocol's display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Msi => "MSI",
            Self::Mesi => "MESI",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive side effect requested by a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Place a `GETS` for this line on the bus.
    IssueGets,
    /// Place a `GETM` for this line on the bus.
    IssueGetm,
    /// Complete the processor's pending `LOAD`/`STORE`.
    DataToProcessor,
    /// Supply this cache's copy of the line to `dest` over the bus.
    DataOnBus {
        /// The requester that receives the data.
        dest: NodeId,
    },
    /// Assert the wired-OR shared-line signal for the current transaction.
    AssertSharedLine,
}

/// Everything a single transition asks the outside world to do.
///
/// Built by the protocol tables; folded by the driver into the bus, the processor and
/// the statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    actions: Vec<Action>,
    counters: Vec<Counter>,
}

impl Outcome {
    /// An outcome with no side effects.
    pub const fn none() -> Self {
        Self {
            actions: Vec::new(),
            counters: Vec::new(),
        }
    }

    /// Appends an action.
    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Appends a counter increment.
    #[must_use]
    pub fn count(mut self, counter: Counter) -> Self {
        self.counters.push(counter);
        self
    }

    /// Returns the requested actions in the order the transition issued them.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Returns the counter increments.
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// Returns `true` if the outcome has neither actions nor counter increments.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.counters.is_empty()
    }

    /// Returns the bus request kind (`GETS` or `GETM`) this transition issued, if any.
    pub fn bus_request(&self) -> Option<MessageKind> {
        self.actions.iter().find_map(|a| match a {
            Action::IssueGets => Some(MessageKind::Gets),
            Action::IssueGetm => Some(MessageKind::Getm),
            _ => None,
        })
    }

    /// Returns `true` if the processor's pending request was satisfied.
    pub fn replies_to_processor(&self) -> bool {
        self.actions.contains(&Action::DataToProcessor)
    }

    /// Returns `true` if the shared-line signal was asserted.
    pub fn asserts_shared_line(&self) -> bool {
        self.actions.contains(&Action::AssertSharedLine)
    }

    /// Returns the destination of a cache-to-cache data reply, if any.
    pub fn data_on_bus(&self) -> Option<NodeId> {
        self.actions.iter().find_map(|a| match a {
            Action::DataOnBus { dest } => Some(*dest),
            _ => None,
        })
    }

    /// Forwards every counter increment to `sink`.
    pub fn record_into(&self, sink: &mut dyn StatsSink) {
        for counter in &self.counters {
            sink.increment(*counter);
        }
    }
}

/// The wired-OR shared-line signal of one bus transaction.
///
/// A fresh (deasserted) value is created when a transaction is granted. Snoopers may
/// only assert it; nothing clears it before the transaction ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SharedLine(bool);

impl SharedLine {
    /// A deasserted signal, as seen at the start of every transaction.
    pub const fn new() -> Self {
        Self(false)
    }

    /// An already-asserted signal.
    pub const fn asserted() -> Self {
        Self(true)
    }

    /// Asserts the signal.
    pub fn assert_line(&mut self) {
        self.0 = true;
    }

    /// Reads the signal.
    pub const fn is_asserted(self) -> bool {
        self.0
    }

    /// Folds one snooper's response into the signal.
    #[must_use]
    pub fn fold(mut self, outcome: &Outcome) -> Self {
        if outcome.asserts_shared_line() {
            self.assert_line();
        }
        self
    }
}

/// Result of looking up a (state, message) pair in a protocol table: the next state
/// and its side effects, or the reason the pair is illegal.
pub type Step<S> = Result<(S, Outcome), ViolationKind>;

/// Applies a table lookup to a line: commits the new state on success, or reports a
/// violation carrying the line's identity and leaves the state untouched.
pub(crate) fn commit<S>(
    cache: CacheId,
    addr: LineAddr,
    state: &mut S,
    msg: &Message,
    step: Step<S>,
) -> Result<Outcome, ProtocolViolation>
where
    S: Copy + Into<CacheLineState>,
{
    let from: CacheLineState = (*state).into();
    match step {
        Ok((next, outcome)) => {
            *state = next;
            let to: CacheLineState = next.into();
            trace!(
                cache,
                addr = %addr,
                msg = %msg.kind,
                source = %msg.source,
                from = %from,
                to = %to,
                "line transition"
            );
            Ok(outcome)
        }
        Err(kind) => Err(ProtocolViolation {
            cache,
            addr,
            state: from,
            message: msg.kind,
            origin: msg.source,
            kind,
        }),
    }
}
