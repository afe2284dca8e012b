//! Lifecycle and recoverable-failure events, and the sink port they go to.
//!
//! The driver never logs numerical fallbacks itself; it reports them as
//! [`SimEvent`]s and lets the sink decide whether they become log lines,
//! collected records or nothing.

use log::{debug, info, warn};

use crate::sim::engine::HourlySnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    ScenarioStarted {
        name: String,
        hours: usize,
    },
    /// The flow balance had no root; the tick ran with zero blower flow.
    FlowSolveFailed {
        hour: usize,
        tick: usize,
        drive: f64,
    },
    /// The implicit pressure step did not converge.
    PressureSolveFailed {
        hour: usize,
        tick: usize,
    },
    /// A concentration update was non-finite and kept its previous value.
    ConcentrationFallback {
        hour: usize,
        bins: usize,
    },
    FilterClogged {
        hour: usize,
        dust_g: f64,
        replaced: bool,
    },
    DamperRehomed {
        hour: usize,
    },
    ScenarioFinished {
        name: String,
        total_cost: f64,
        degraded_ticks: u64,
    },
}

impl SimEvent {
    /// Whether the event marks a numerical fallback.
    pub fn is_degradation(&self) -> bool {
        matches!(
            self,
            SimEvent::FlowSolveFailed { .. }
                | SimEvent::PressureSolveFailed { .. }
                | SimEvent::ConcentrationFallback { .. }
        )
    }
}

/// Receives events and closed hours from a running scenario.
pub trait SimulationSink {
    fn on_event(&mut self, event: &SimEvent);

    fn on_hour(&mut self, _snapshot: &HourlySnapshot) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SimulationSink for NullSink {
    fn on_event(&mut self, _event: &SimEvent) {}
}

/// Writes events through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SimulationSink for LogSink {
    fn on_event(&mut self, event: &SimEvent) {
        match event {
            SimEvent::ScenarioStarted { name, hours } => {
                info!("Scenario '{}' started ({} h)", name, hours)
            }
            SimEvent::FlowSolveFailed { hour, tick, drive } => warn!(
                "Hour {} tick {}: no flow operating point at drive {:.4}, running with zero flow",
                hour, tick, drive
            ),
            SimEvent::PressureSolveFailed { hour, tick } => {
                warn!("Hour {} tick {}: pressure step did not converge", hour, tick)
            }
            SimEvent::ConcentrationFallback { hour, bins } => {
                warn!("Hour {}: {} PM bin(s) kept their previous value", hour, bins)
            }
            SimEvent::FilterClogged {
                hour,
                dust_g,
                replaced,
            } => info!(
                "Hour {}: filter clogged at {:.1} g{}",
                hour,
                dust_g,
                if *replaced { ", replaced" } else { "" }
            ),
            SimEvent::DamperRehomed { hour } => debug!("Hour {}: damper re-homing", hour),
            SimEvent::ScenarioFinished {
                name,
                total_cost,
                degraded_ticks,
            } => info!(
                "Scenario '{}' finished: ${:.2}, {} degraded tick(s)",
                name, total_cost, degraded_ticks
            ),
        }
    }

    fn on_hour(&mut self, snapshot: &HourlySnapshot) {
        debug!(
            "Hour {}: P={:.2} Pa drive={:.3} Q={:.1} CFM life={:.1}% cost=${:.4}",
            snapshot.hour,
            snapshot.pressure_pa,
            snapshot.drive,
            snapshot.flow_cfm,
            snapshot.filter_life_pct,
            snapshot.cumulative_cost
        );
    }
}

/// Keeps every event and snapshot in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub events: Vec<SimEvent>,
    pub hours: Vec<HourlySnapshot>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn degradations(&self) -> usize {
        self.events.iter().filter(|e| e.is_degradation()).count()
    }
}

impl SimulationSink for MemorySink {
    fn on_event(&mut self, event: &SimEvent) {
        self.events.push(event.clone());
    }

    fn on_hour(&mut self, snapshot: &HourlySnapshot) {
        self.hours.push(snapshot.clone());
    }
}
