//! Simulation statistics collection and reporting.
//!
//! This module tracks the counters of a coherence run. It provides:
//! 1. **Protocol counters:** Cache misses and silent upgrades, incremented through
//!    [`StatsSink`] by the transitions that cause them.
//! 2. **Processor mix:** Loads, stores, and hits.
//! 3. **Bus traffic:** `GETS`/`GETM` transactions, cache-to-cache transfers, memory fetches.

use std::time::Instant;

use serde::Serialize;

/// A counter a protocol transition may increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    /// A processor request that needs the bus to obtain data it does not hold,
    /// including an upgrade that lost its copy to a racing writer.
    CacheMiss,
    /// A store to an `E` line that became `M` without bus traffic.
    SilentUpgrade,
    /// A valid copy destroyed by a foreign `GETM`.
    Invalidation,
}

/// Receiver of counter increments.
///
/// The protocol state machines never own counters; the driver passes their reported
/// increments to a sink.
pub trait StatsSink {
    /// Increments `counter` by one.
    fn increment(&mut self, counter: Counter);
}

/// Simulation statistics structure tracking all coherence metrics.
#[derive(Clone, Debug, Serialize)]
pub struct SimStats {
    #[serde(skip)]
    start_time: Instant,
    /// Total simulator cycles elapsed.
    pub cycles: u64,

    /// Processor `LOAD` references issued.
    pub loads: u64,
    /// Processor `STORE` references issued.
    pub stores: u64,
    /// References satisfied without bus traffic.
    pub hits: u64,

    /// Misses counted by the protocol transitions.
    pub cache_misses: u64,
    /// Silent `E` to `M` upgrades.
    pub silent_upgrades: u64,
    /// Valid copies destroyed by foreign `GETM`s.
    pub invalidations: u64,

    /// `GETS` transactions serviced by the bus.
    pub bus_gets: u64,
    /// `GETM` transactions serviced by the bus.
    pub bus_getm: u64,
    /// `DATA` replies supplied by another cache.
    pub cache_transfers: u64,
    /// `DATA` replies supplied by main memory.
    pub memory_fetches: u64,

    /// Protocol violations recorded instead of aborting.
    pub violations: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            loads: 0,
            stores: 0,
            hits: 0,
            cache_misses: 0,
            silent_upgrades: 0,
            invalidations: 0,
            bus_gets: 0,
            bus_getm: 0,
            cache_transfers: 0,
            memory_fetches: 0,
            violations: 0,
        }
    }
}

impl StatsSink for SimStats {
    fn increment(&mut self, counter: Counter) {
        match counter {
            Counter::CacheMiss => self.cache_misses += 1,
            Counter::SilentUpgrade => self.silent_upgrades += 1,
            Counter::Invalidation => self.invalidations += 1,
        }
    }
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"protocol"`, `"bus"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "protocol", "bus"];

impl SimStats {
    /// Total processor references issued.
    pub const fn references(&self) -> u64 {
        self.loads + self.stores
    }

    /// Percentage of references counted as misses, or 0 with no references.
    #[allow(clippy::cast_precision_loss)]
    pub fn miss_rate(&self) -> f64 {
        let refs = self.references();
        if refs == 0 {
            0.0
        } else {
            (self.cache_misses as f64 / refs as f64) * 100.0
        }
    }

    /// Total bus transactions serviced.
    pub const fn bus_transactions(&self) -> u64 {
        self.bus_gets + self.bus_getm
    }

    /// Renders the requested sections as the text report printed by [`SimStats::print`].
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]. Pass an empty
    /// slice to render all sections.
    pub fn render_sections(&self, sections: &[String]) -> String {
        use std::fmt::Write;

        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64();
        let mut out = String::new();

        let _ = writeln!(out, "==========================================================");
        let _ = writeln!(out, "CACHE COHERENCE SIMULATION STATISTICS");
        let _ = writeln!(out, "==========================================================");
        if want("summary") {
            let _ = writeln!(out, "host_seconds             {seconds:.4} s");
            let _ = writeln!(out, "sim_cycles               {}", self.cycles);
            let _ = writeln!(out, "sim_refs                 {}", self.references());
            let _ = writeln!(out, "  refs.load              {}", self.loads);
            let _ = writeln!(out, "  refs.store             {}", self.stores);
            let _ = writeln!(out, "  refs.hit               {}", self.hits);
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("protocol") {
            let _ = writeln!(out, "PROTOCOL");
            let _ = writeln!(
                out,
                "  cache_misses           {} ({:.2}%)",
                self.cache_misses,
                self.miss_rate()
            );
            let _ = writeln!(out, "  silent_upgrades        {}", self.silent_upgrades);
            let _ = writeln!(out, "  invalidations          {}", self.invalidations);
            let _ = writeln!(out, "  violations             {}", self.violations);
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("bus") {
            let _ = writeln!(out, "BUS");
            let _ = writeln!(out, "  bus.transactions       {}", self.bus_transactions());
            let _ = writeln!(out, "  bus.gets               {}", self.bus_gets);
            let _ = writeln!(out, "  bus.getm               {}", self.bus_getm);
            let _ = writeln!(out, "  data.cache_to_cache    {}", self.cache_transfers);
            let _ = writeln!(out, "  data.memory            {}", self.memory_fetches);
        }
        let _ = writeln!(out, "==========================================================");
        out
    }

    /// Prints only the requested statistics sections to stdout.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.render_sections(sections));
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
