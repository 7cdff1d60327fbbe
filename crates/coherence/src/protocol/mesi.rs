//! MESI coherence protocol.
//!
//! Extends MSI with the Exclusive state. A read miss waits in `ISE`; when its `DATA`
//! arrives the requester reads the shared line: if no other cache asserted it during
//! the transaction the line becomes `E`, otherwise `S`. A store to an `E` line upgrades
//! to `M` silently, with no bus traffic.
//!
//! Every valid holder (`S`, `SM`, `E`, `M`) asserts the shared line when it snoops a
//! foreign request, so the `E` decision is never wrong.

use super::{Action, CacheLineState, CoherenceProtocol, Outcome, SharedLine, Step, commit};
use crate::common::{CacheId, LineAddr, Message, MessageKind, ProtocolViolation, ViolationKind};
use crate::stats::Counter;

/// MESI line state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MesiState {
    /// Invalid.
    #[default]
    I,
    /// Invalid, waiting for data that resolves to `S` or `E`.
    ISE,
    /// Invalid, waiting for modifiable data.
    IM,
    /// Shared.
    S,
    /// Shared, waiting for the upgrade to modified.
    SM,
    /// Exclusive and clean.
    E,
    /// Modified.
    M,
}

impl MesiState {
    /// Returns the state's mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            Self::I => "I",
            Self::ISE => "ISE",
            Self::IM => "IM",
            Self::S => "S",
            Self::SM => "SM",
            Self::E => "E",
            Self::M => "M",
        }
    }

    /// Returns `true` for states waiting on a bus reply.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::ISE | Self::IM | Self::SM)
    }

    /// Looks up a processor message in the MESI table.
    pub fn on_processor(self, kind: MessageKind) -> Step<Self> {
        use MessageKind::{Data, Getm, Gets, Load, Store};

        match (self, kind) {
            (Self::I, Load) => Ok((
                Self::ISE,
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
            (Self::ISE | Self::IM | Self::SM, Load | Store) => {
                Err(ViolationKind::OutstandingRequest)
            }
            (Self::S, Load) => Ok((Self::S, Outcome::none().action(Action::DataToProcessor))),
            (Self::S, Store) => Ok((Self::SM, Outcome::none().action(Action::IssueGetm))),
            (Self::E, Load) => Ok((Self::E, Outcome::none().action(Action::DataToProcessor))),
            (Self::E, Store) => Ok((
                Self::M,
                Outcome::none()
                    .action(Action::DataToProcessor)
                    .count(Counter::SilentUpgrade),
            )),
            (Self::M, Load | Store) => {
                Ok((Self::M, Outcome::none().action(Action::DataToProcessor)))
            }
            (_, Gets | Getm | Data) => Err(ViolationKind::UnexpectedMessage),
        }
    }

    /// Looks up a snooped bus message in the MESI table.
    ///
    /// # Arguments
    ///
    /// * `msg` - The snooped message.
    /// * `shared` - The transaction's shared line; read only by `ISE` on `DATA`.
    pub fn on_snoop(self, msg: &Message, shared: SharedLine) -> Step<Self> {
        use MessageKind::{Data, Getm, Gets, Load, Store};

        let supply = || {
            Outcome::none()
                .action(Action::AssertSharedLine)
                .action(Action::DataOnBus { dest: msg.source })
        };

        match (self, msg.kind) {
            (_, Load | Store) => Err(ViolationKind::UnexpectedMessage),

            (Self::I, Gets | Getm | Data) => Ok((Self::I, Outcome::none())),

            (Self::ISE, Gets | Getm) => Ok((Self::ISE, Outcome::none())),
            (Self::ISE, Data) => {
                let next = if shared.is_asserted() { Self::S } else { Self::E };
                Ok((next, Outcome::none().action(Action::DataToProcessor)))
            }

            (Self::IM, Gets | Getm) => Ok((Self::IM, Outcome::none())),
            (Self::IM, Data) => Ok((Self::M, Outcome::none().action(Action::DataToProcessor))),

            (Self::S, Gets) => Ok((Self::S, Outcome::none().action(Action::AssertSharedLine))),
            (Self::S, Getm) => Ok((Self::I, Outcome::none().count(Counter::Invalidation))),

            (Self::SM, Gets) => Ok((Self::SM, Outcome::none().action(Action::AssertSharedLine))),
            (Self::SM, Getm) => Ok((
                Self::IM,
                Outcome::none()
                    .count(Counter::CacheMiss)
                    .count(Counter::Invalidation),
            )),
            (Self::SM, Data) => Ok((Self::M, Outcome::none().action(Action::DataToProcessor))),

            (Self::E | Self::M, Gets) => Ok((Self::S, supply())),
            (Self::E | Self::M, Getm) => Ok((Self::I, supply().count(Counter::Invalidation))),

            // The line is already held; nobody should be sending us data for it.
            (Self::S | Self::E | Self::M, Data) => Err(ViolationKind::UnexpectedMessage),
        }
    }
}

/// A MESI state machine bound to one line of one cache.
#[derive(Debug, Clone)]
pub struct MesiProtocol {
    cache: CacheId,
    addr: LineAddr,
    state: MesiState,
}

impl MesiProtocol {
    /// Creates the state machine for `addr` in `cache`, starting in `I`.
    pub const fn new(cache: CacheId, addr: LineAddr) -> Self {
        Self::with_state(cache, addr, MesiState::I)
    }

    /// Creates the state machine in an arbitrary state.
    pub const fn with_state(cache: CacheId, addr: LineAddr, state: MesiState) -> Self {
        Self { cache, addr, state }
    }

    /// Returns the MESI state.
    pub const fn state(&self) -> MesiState {
        self.state
    }
}

impl CoherenceProtocol for MesiProtocol {
    fn process_cache_request(&mut self, msg: &Message) -> Result<Outcome, ProtocolViolation> {
        let step = self.state.on_processor(msg.kind);
        commit(self.cache, self.addr, &mut self.state, msg, step)
    }

    fn process_snoop_request(
        &mut self,
        msg: &Message,
        shared: SharedLine,
    ) -> Result<Outcome, ProtocolViolation> {
        let step = self.state.on_snoop(msg, shared);
        commit(self.cache, self.addr, &mut self.state, msg, step)
    }

    fn current_state(&self) -> CacheLineState {
        CacheLineState::Mesi(self.state)
    }
}
