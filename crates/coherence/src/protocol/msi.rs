//! MSI coherence protocol.
//!
//! Three stable states and three transients:
//!
//! | State | Meaning                                              |
//! |-------|------------------------------------------------------|
//! | `I`   | No valid copy.                                       |
//! | `IS`  | `GETS` issued, waiting for `DATA`.                   |
//! | `IM`  | `GETM` issued, waiting for `DATA`.                   |
//! | `S`   | Read-only copy; other caches may hold `S` too.       |
//! | `SM`  | Holds `S`, `GETM` issued to upgrade, waiting.        |
//! | `M`   | Only valid copy, dirty; this cache supplies the data.|
//!
//! A cache in `SM` that snoops a foreign `GETM` has lost its copy to the other writer:
//! it falls back to `IM` and the upgrade becomes a miss. Its own `GETM` is still queued
//! and completes the transition when its `DATA` arrives.

use super::{Action, CacheLineState, CoherenceProtocol, Outcome, SharedLine, Step, commit};
use crate::common::{CacheId, LineAddr, Message, MessageKind, ProtocolViolation, ViolationKind};
use crate::stats::Counter;

/// MSI line state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MsiState {
    /// Invalid.
    #[default]
    I,
    /// Invalid, waiting for shared data.
    IS,
    /// Invalid, waiting for modifiable data.
    IM,
    /// Shared.
    S,
    /// Shared, waiting for the upgrade to modified.
    SM,
    /// Modified.
    M,
}

impl MsiState {
    /// Returns the state's mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            Self::I => "I",
            Self::IS => "IS",
            Self::IM => "IM",
            Self::S => "S",
            Self::SM => "SM",
            Self::M => "M",
        }
    }

    /// Returns `true` for states waiting on a bus reply.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::IS | Self::IM | Self::SM)
    }

    /// Looks up a processor message in the MSI table.
    pub fn on_processor(self, kind: MessageKind) -> Step<Self> {
        use MessageKind::{Data, Getm, Gets, Load, Store};

        match (self, kind) {
            (Self::I, Load) => Ok((
                Self::IS,
                Outcome::none()
                    .action(Action::IssueGets)
                    .count(Counter::CacheMiss),
            )),
            (Self::I, Store) => Ok((
                Self::IM,
                Outcome::none()
                    .action(Action::IssueGetm)
                    .count(Counter::CacheMiss),
            )),
            (Self::IS | Self::IM | Self::SM, Load | Store) => {
                Err(ViolationKind::OutstandingRequest)
            }
            (Self::S, Load) => Ok((Self::S, Outcome::none().action(Action::DataToProcessor))),
            // Write hit on a read-only copy: upgrade through the bus.
            (Self::S, Store) => Ok((Self::SM, Outcome::none().action(Action::IssueGetm))),
            (Self::M, Load | Store) => {
                Ok((Self::M, Outcome::none().action(Action::DataToProcessor)))
            }
            (_, Gets | Getm | Data) => Err(ViolationKind::UnexpectedMessage),
        }
    }

    /// Looks up a snooped bus message in the MSI table.
    ///
    /// MSI never reads the shared line; `M` still asserts it when it supplies data.
    pub fn on_snoop(self, msg: &Message) -> Step<Self> {
        use MessageKind::{Data, Getm, Gets, Load, Store};

        match (self, msg.kind) {
            (_, Load | Store) => Err(ViolationKind::UnexpectedMessage),

            (Self::I, Gets | Getm | Data) => Ok((Self::I, Outcome::none())),

            (Self::IS, Gets | Getm) => Ok((Self::IS, Outcome::none())),
            (Self::IS, Data) => Ok((Self::S, Outcome::none().action(Action::DataToProcessor))),

            // A GETS while waiting on our own GETM is tolerated and ignored.
            (Self::IM, Gets | Getm) => Ok((Self::IM, Outcome::none())),
            (Self::IM, Data) => Ok((Self::M, Outcome::none().action(Action::DataToProcessor))),

            (Self::S, Gets) => Ok((Self::S, Outcome::none())),
            (Self::S, Getm) => Ok((Self::I, Outcome::none().count(Counter::Invalidation))),
            (Self::S, Data) => Err(ViolationKind::UnexpectedMessage),

            (Self::SM, Gets) => Ok((Self::SM, Outcome::none())),
            (Self::SM, Getm) => Ok((
                Self::IM,
                Outcome::none()
                    .count(Counter::CacheMiss)
                    .count(Counter::Invalidation),
            )),
            (Self::SM, Data) => Ok((Self::M, Outcome::none().action(Action::DataToProcessor))),

            (Self::M, Gets) => Ok((
                Self::S,
                Outcome::none()
                    .action(Action::AssertSharedLine)
                    .action(Action::DataOnBus { dest: msg.source }),
            )),
            (Self::M, Getm) => Ok((
                Self::I,
                Outcome::none()
                    .action(Action::AssertSharedLine)
                    .action(Action::DataOnBus { dest: msg.source })
                    .count(Counter::Invalidation),
            )),
            (Self::M, Data) => Err(ViolationKind::UnexpectedMessage),
        }
    }
}

/// An MSI state machine bound to one line of one cache.
#[derive(Debug, Clone)]
pub struct MsiProtocol {
    cache: CacheId,
    addr: LineAddr,
    state: MsiState,
}

impl MsiProtocol {
    /// Creates the state machine for `addr` in `cache`, starting in `I`.
    pub const fn new(cache: CacheId, addr: LineAddr) -> Self {
        Self::with_state(cache, addr, MsiState::I)
    }

    /// Creates the state machine in an arbitrary state.
    pub const fn with_state(cache: CacheId, addr: LineAddr, state: MsiState) -> Self {
        Self { cache, addr, state }
    }

    /// Returns the MSI state.
    pub const fn state(&self) -> MsiState {
        self.state
    }
}

impl CoherenceProtocol for MsiProtocol {
    fn process_cache_request(&mut self, msg: &Message) -> Result<Outcome, ProtocolViolation> {
        let step = self.state.on_processor(msg.kind);
        commit(self.cache, self.addr, &mut self.state, msg, step)
    }

    fn process_snoop_request(
        &mut self,
        msg: &Message,
        _shared: SharedLine,
    ) -> Result<Outcome, ProtocolViolation> {
        let step = self.state.on_snoop(msg);
        commit(self.cache, self.addr, &mut self.state, msg, step)
    }

    fn current_state(&self) -> CacheLineState {
        CacheLineState::Msi(self.state)
    }
}
