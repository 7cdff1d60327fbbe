//! Simulator: owns the caches, their processors and the bus side-by-side.
//!
//! Each cycle runs two phases:
//! 1. **Processor phase:** Every idle processor issues its next reference to its cache.
//!    Hits complete immediately; misses and upgrades queue a bus request and block.
//! 2. **Bus phase:** The oldest queued request is serviced atomically and its processor
//!    released.

use std::collections::{BTreeSet, VecDeque};

use tracing::{error, info, warn};

use super::bus::{Bus, BusRequest};
use super::table::LineTable;
use super::trace::{MemRef, TraceError};
use crate::common::{CacheId, LineAddr, MessageKind, ProtocolViolation, SimError};
use crate::config::{Config, ConfigError, ViolationPolicy};
use crate::protocol::CacheLineState;
use crate::stats::SimStats;

/// Applies the configured [`ViolationPolicy`] to protocol violations.
#[derive(Debug)]
pub struct ViolationLog {
    policy: ViolationPolicy,
    collected: Vec<ProtocolViolation>,
}

impl ViolationLog {
    /// Creates an empty log applying `policy`.
    pub const fn new(policy: ViolationPolicy) -> Self {
        Self {
            policy,
            collected: Vec::new(),
        }
    }

    /// Handles one violation.
    ///
    /// # Returns
    ///
    /// `Ok` if the violation was recorded and the run may continue, or the violation
    /// itself if the run must abort.
    pub fn handle(
        &mut self,
        violation: ProtocolViolation,
        stats: &mut SimStats,
    ) -> Result<(), ProtocolViolation> {
        match self.policy {
            ViolationPolicy::Abort => {
                error!(%violation, "aborting on protocol violation");
                Err(violation)
            }
            ViolationPolicy::Collect => {
                warn!(%violation, "protocol violation recorded");
                stats.violations += 1;
                self.collected.push(violation);
                Ok(())
            }
        }
    }

    /// Returns the violations recorded so far, oldest first.
    pub fn collected(&self) -> &[ProtocolViolation] {
        &self.collected
    }
}

/// A processor: its remaining references and the one it is blocked on, if any.
#[derive(Debug, Default)]
struct Processor {
    pending: VecDeque<MemRef>,
    outstanding: Option<MemRef>,
}

impl Processor {
    const fn is_blocked(&self) -> bool {
        self.outstanding.is_some()
    }

    fn is_done(&self) -> bool {
        self.pending.is_empty() && self.outstanding.is_none()
    }
}

/// Top-level simulator: per-cache line tables, processors and the shared bus.
#[derive(Debug)]
pub struct Simulator {
    config: Config,
    tables: Vec<LineTable>,
    cores: Vec<Processor>,
    bus: Bus,
    stats: SimStats,
    log: ViolationLog,
}

impl Simulator {
    /// Creates a simulator with every line of every cache in `I`.
    ///
    /// # Arguments
    ///
    /// * `config` - System shape and run options; validated before use.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let tables = (0..config.num_caches)
            .map(|cache| LineTable::new(cache, config.protocol))
            .collect();
        let cores = (0..config.num_caches).map(|_| Processor::default()).collect();
        info!(
            protocol = %config.protocol,
            caches = config.num_caches,
            "simulator initialized"
        );
        Ok(Self {
            config: config.clone(),
            tables,
            cores,
            bus: Bus::new(),
            stats: SimStats::default(),
            log: ViolationLog::new(config.violation_policy),
        })
    }

    /// Returns the configuration the simulator was built with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Appends a reference to its processor's queue.
    pub fn submit(&mut self, mref: MemRef) -> Result<(), SimError> {
        let num_caches = self.cores.len();
        let core = self
            .cores
            .get_mut(mref.cache)
            .ok_or(TraceError::CacheOutOfRange {
                line: 0,
                cache: mref.cache,
                num_caches,
            })?;
        core.pending.push_back(mref);
        Ok(())
    }

    /// Submits every reference of a trace, in order.
    pub fn load_trace(&mut self, refs: impl IntoIterator<Item = MemRef>) -> Result<(), SimError> {
        for mref in refs {
            self.submit(mref)?;
        }
        Ok(())
    }

    /// Advances the simulation by one cycle.
    pub fn step(&mut self) -> Result<(), SimError> {
        self.stats.cycles += 1;
        self.issue_references()?;
        self.service_bus()
    }

    /// Runs until every processor has drained its references.
    ///
    /// # Returns
    ///
    /// The final statistics, or the error that stopped the run. Exceeding
    /// `max_cycles` is reported as [`SimError::CycleLimit`].
    pub fn run(&mut self) -> Result<&SimStats, SimError> {
        while !self.is_finished() {
            if let Some(max) = self.config.max_cycles.filter(|&max| self.stats.cycles >= max) {
                return Err(SimError::CycleLimit(max));
            }
            self.step()?;
        }
        info!(
            cycles = self.stats.cycles,
            refs = self.stats.references(),
            violations = self.stats.violations,
            "simulation finished"
        );
        Ok(&self.stats)
    }

    /// Returns `true` once every reference has completed and the bus is idle.
    pub fn is_finished(&self) -> bool {
        self.bus.is_idle() && self.cores.iter().all(Processor::is_done)
    }

    /// Returns the state of `addr` in `cache`; unreferenced lines are `I`.
    ///
    /// # Panics
    ///
    /// Panics if `cache` is not a cache of this system.
    pub fn line_state(&self, cache: CacheId, addr: LineAddr) -> CacheLineState {
        self.tables[cache].state(addr)
    }

    /// Returns the statistics gathered so far.
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Returns the violations recorded under [`ViolationPolicy::Collect`].
    pub fn violations(&self) -> &[ProtocolViolation] {
        self.log.collected()
    }

    /// Checks the single-writer/multiple-reader invariant on every line any cache holds.
    ///
    /// # Returns
    ///
    /// `Ok` if no line has more than one owner, or an owner alongside a sharer;
    /// otherwise the first breach in address order.
    pub fn verify_coherence(&self) -> Result<(), SimError> {
        let addrs: BTreeSet<LineAddr> = self
            .tables
            .iter()
            .flat_map(|table| table.states().map(|(addr, _)| addr))
            .collect();
        addrs.into_iter().try_for_each(|addr| self.verify_line(addr))
    }

    fn verify_line(&self, addr: LineAddr) -> Result<(), SimError> {
        let mut owners = Vec::new();
        let mut sharers = Vec::new();
        for table in &self.tables {
            let state = table.state(addr);
            if state.is_owner() {
                owners.push(table.cache());
            } else if state.is_sharer() {
                sharers.push(table.cache());
            }
        }
        if owners.len() > 1 || (owners.len() == 1 && !sharers.is_empty()) {
            return Err(SimError::CoherenceBreach {
                addr,
                owners,
                sharers,
            });
        }
        Ok(())
    }

    fn issue_references(&mut self) -> Result<(), SimError> {
        for (cache, core) in self.cores.iter_mut().enumerate() {
            if core.is_blocked() {
                continue;
            }
            let Some(mref) = core.pending.pop_front() else {
                continue;
            };

            let msg = mref.message();
            let line = self.tables[cache].get_or_create_line(mref.addr);
            match msg.kind {
                MessageKind::Store => self.stats.stores += 1,
                _ => self.stats.loads += 1,
            }
            let outcome = match line.process_cache_request(&msg) {
                Ok(outcome) => outcome,
                Err(violation) => {
                    self.log.handle(violation, &mut self.stats)?;
                    continue;
                }
            };
            outcome.record_into(&mut self.stats);

            if let Some(kind) = outcome.bus_request() {
                self.bus.request(BusRequest {
                    requester: cache,
                    kind,
                    addr: mref.addr,
                });
                core.outstanding = Some(mref);
            } else if outcome.replies_to_processor() {
                self.stats.hits += 1;
            }
        }
        Ok(())
    }

    fn service_bus(&mut self) -> Result<(), SimError> {
        let Some(req) = self.bus.grant() else {
            return Ok(());
        };
        let result = Bus::service(req, &mut self.tables, &mut self.stats, &mut self.log);
        self.cores[req.requester].outstanding = None;
        let _ = result?;

        if self.config.check_invariants {
            self.verify_line(req.addr)?;
        }
        Ok(())
    }
}
