// SPDX-License-Identifier: Apache-2.0
//! Telemetry sink contract for runtime observability.
//!
//! The core reports lifecycle and failure events through a sink trait object;
//! adapters decide what to do with them (JSONL, metrics, nothing). The core
//! never formats or buffers — events are fire-and-forget and must be cheap
//! when unobserved.

/// Aggregate counters for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Tick number that just completed.
    pub tick: u64,
    /// Living organisms at the end of the tick.
    pub alive: u64,
    /// Instructions that completed without failure.
    pub executed: u64,
    /// Instructions that set a failure flag.
    pub failed: u64,
    /// Organisms born during the tick.
    pub births: u64,
    /// Organisms that died during the tick.
    pub deaths: u64,
}

/// Observability events emitted by the runtime.
///
/// Implementations must be `Send + Sync`; the core holds the sink behind an
/// `Arc` and may invoke it from whichever thread drives the tick loop. All
/// methods default to no-ops so sinks implement only what they consume.
pub trait TelemetrySink: Send + Sync {
    /// An instruction could not complete; `reason` is a stable, human-readable
    /// failure description.
    fn on_instruction_failure(&self, tick: u64, organism_id: u32, reason: &str) {
        let _ = (tick, organism_id, reason);
    }

    /// A new organism entered the simulation.
    fn on_birth(&self, tick: u64, organism_id: u32, parent_id: Option<u32>) {
        let _ = (tick, organism_id, parent_id);
    }

    /// An organism died this tick.
    fn on_death(&self, tick: u64, organism_id: u32) {
        let _ = (tick, organism_id);
    }

    /// A world-generation plugin reported an error; the tick continues.
    fn on_plugin_error(&self, tick: u64, plugin: &str, error: &str) {
        let _ = (tick, plugin, error);
    }

    /// Per-tick aggregate counters, emitted once after the tick completes.
    fn on_tick_summary(&self, summary: &TickSummary) {
        let _ = summary;
    }
}

/// Sink that drops every event. The default when no telemetry is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {}
