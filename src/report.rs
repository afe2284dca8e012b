//! Scenario summaries and side-by-side comparison reports.
//!
//! A [`ScenarioSummary`] condenses one run into scalar metrics; a
//! [`ComparisonReport`] lines several up against a baseline and exports
//! Markdown, CSV or JSON.

use std::fmt;

use serde::Serialize;

use crate::error::SimError;
use crate::sim::cost::HourCost;
use crate::sim::engine::{HourlySnapshot, ScenarioOutput};

/// Scalar metrics compared across scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MeanPressure,
    MeanFlow,
    MeanIndoorPm,
    TotalCost,
    FilterReplacements,
    DegradedTicks,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::MeanPressure,
        Metric::MeanFlow,
        Metric::MeanIndoorPm,
        Metric::TotalCost,
        Metric::FilterReplacements,
        Metric::DegradedTicks,
    ];

    pub fn display_name(&self) -> &str {
        match self {
            Metric::MeanPressure => "Mean pressure (Pa)",
            Metric::MeanFlow => "Mean blower flow (CFM)",
            Metric::MeanIndoorPm => "Mean indoor PM (µg/m³)",
            Metric::TotalCost => "Total cost ($)",
            Metric::FilterReplacements => "Filter replacements",
            Metric::DegradedTicks => "Degraded ticks",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Condensed result of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub hours: usize,
    pub mean_pressure_pa: f64,
    pub max_abs_pressure_pa: f64,
    pub mean_drive: f64,
    pub mean_flow_cfm: f64,
    /// Mean indoor PM per bin over the hourly snapshots
    pub mean_indoor_pm: Vec<f64>,
    pub final_indoor_pm: Vec<f64>,
    pub mean_outdoor_pm: Vec<f64>,
    /// Cost totals per category
    pub cost: HourCost,
    pub total_cost: f64,
    pub replacements: u32,
    pub final_filter_life_pct: f64,
    pub degraded_ticks: u64,
}

impl ScenarioSummary {
    pub fn from_output(output: &ScenarioOutput) -> Self {
        let snaps = &output.snapshots;
        let bins = output.final_state.num_bins();
        let per_bin = |f: &dyn Fn(&HourlySnapshot, usize) -> f64| -> Vec<f64> {
            (0..bins).map(|i| mean(snaps.iter().map(|s| f(s, i)))).collect()
        };

        let cost = snaps.iter().fold(HourCost::default(), |acc, s| HourCost {
            blower: acc.blower + s.cost.blower,
            heating: acc.heating + s.cost.heating,
            cooling: acc.cooling + s.cost.cooling,
            filters: acc.filters + s.cost.filters,
        });

        Self {
            name: output.name.clone(),
            hours: snaps.len(),
            mean_pressure_pa: mean(snaps.iter().map(|s| s.mean_pressure_pa)),
            max_abs_pressure_pa: snaps.iter().map(|s| s.pressure_pa.abs()).fold(0.0, f64::max),
            mean_drive: mean(snaps.iter().map(|s| s.mean_drive)),
            mean_flow_cfm: mean(snaps.iter().map(|s| s.mean_flow_cfm)),
            mean_indoor_pm: per_bin(&|s, i| s.indoor_pm.get(i).copied().unwrap_or(0.0)),
            final_indoor_pm: output.final_state.indoor_pm.clone(),
            mean_outdoor_pm: per_bin(&|s, i| s.outdoor_pm.get(i).copied().unwrap_or(0.0)),
            cost,
            total_cost: output.total_cost(),
            replacements: output.replacements(),
            final_filter_life_pct: output.final_state.filter_life_pct,
            degraded_ticks: output.degraded_ticks(),
        }
    }

    /// Indoor/outdoor ratio of the mean concentrations, per bin.
    pub fn indoor_outdoor_ratio(&self) -> Vec<f64> {
        self.mean_indoor_pm
            .iter()
            .zip(&self.mean_outdoor_pm)
            .map(|(i, o)| if *o > 0.0 { i / o } else { 0.0 })
            .collect()
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::MeanPressure => self.mean_pressure_pa,
            Metric::MeanFlow => self.mean_flow_cfm,
            Metric::MeanIndoorPm => mean(self.mean_indoor_pm.iter().copied()),
            Metric::TotalCost => self.total_cost,
            Metric::FilterReplacements => self.replacements as f64,
            Metric::DegradedTicks => self.degraded_ticks as f64,
        }
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# Scenario: {}\n\n", self.name));
        output.push_str("| Metric | Value |\n");
        output.push_str("|--------|-------|\n");
        output.push_str(&format!("| Hours | {} |\n", self.hours));
        output.push_str(&format!("| Mean pressure | {:.3} Pa |\n", self.mean_pressure_pa));
        output.push_str(&format!("| Max abs pressure | {:.3} Pa |\n", self.max_abs_pressure_pa));
        output.push_str(&format!("| Mean drive | {:.3} |\n", self.mean_drive));
        output.push_str(&format!("| Mean blower flow | {:.1} CFM |\n", self.mean_flow_cfm));
        output.push_str(&format!("| Filter replacements | {} |\n", self.replacements));
        output.push_str(&format!("| Final filter life | {:.1}% |\n", self.final_filter_life_pct));
        output.push_str(&format!("| Degraded ticks | {} |\n", self.degraded_ticks));
        output.push('\n');

        output.push_str("## Particulates\n\n");
        output.push_str("| Bin | Mean outdoor | Mean indoor | Final indoor | I/O |\n");
        output.push_str("|-----|--------------|-------------|--------------|-----|\n");
        let ratio = self.indoor_outdoor_ratio();
        for i in 0..self.mean_indoor_pm.len() {
            output.push_str(&format!(
                "| {} | {:.3} | {:.3} | {:.3} | {:.3} |\n",
                i,
                self.mean_outdoor_pm.get(i).copied().unwrap_or(0.0),
                self.mean_indoor_pm[i],
                self.final_indoor_pm.get(i).copied().unwrap_or(0.0),
                ratio.get(i).copied().unwrap_or(0.0),
            ));
        }
        output.push('\n');

        output.push_str("## Cost\n\n");
        output.push_str("| Category | $ |\n");
        output.push_str("|----------|---|\n");
        output.push_str(&format!("| Blower | {:.4} |\n", self.cost.blower));
        output.push_str(&format!("| Heating | {:.4} |\n", self.cost.heating));
        output.push_str(&format!("| Cooling | {:.4} |\n", self.cost.cooling));
        output.push_str(&format!("| Filters | {:.2} |\n", self.cost.filters));
        output.push_str(&format!("| **Total** | **{:.4}** |\n", self.total_cost));
        output
    }
}

/// Several scenarios compared against the first one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    pub summaries: Vec<ScenarioSummary>,
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, summary: ScenarioSummary) {
        self.summaries.push(summary);
    }

    pub fn baseline(&self) -> Option<&ScenarioSummary> {
        self.summaries.first()
    }

    /// `(scenario, metric, value − baseline value)` for every non-baseline scenario.
    pub fn delta_analysis(&self) -> Vec<(String, Metric, f64)> {
        let Some(base) = self.baseline() else {
            return Vec::new();
        };
        self.summaries
            .iter()
            .skip(1)
            .flat_map(|s| {
                Metric::ALL
                    .iter()
                    .map(move |&m| (s.name.clone(), m, s.metric(m) - base.metric(m)))
            })
            .collect()
    }

    /// Scenario with the lowest total cost.
    pub fn cheapest(&self) -> Option<&ScenarioSummary> {
        self.summaries
            .iter()
            .min_by(|a, b| a.total_cost.total_cmp(&b.total_cost))
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str("# Scenario Comparison\n\n");

        output.push_str("| Scenario |");
        for m in Metric::ALL {
            output.push_str(&format!(" {} |", m));
        }
        output.push('\n');
        output.push_str("|----------|");
        for _ in Metric::ALL {
            output.push_str("---|");
        }
        output.push('\n');
        for s in &self.summaries {
            output.push_str(&format!("| {} |", s.name));
            for m in Metric::ALL {
                output.push_str(&format!(" {:.4} |", s.metric(m)));
            }
            output.push('\n');
        }
        output.push('\n');

        let deltas = self.delta_analysis();
        if let (Some(base), false) = (self.baseline(), deltas.is_empty()) {
            output.push_str("## Delta Analysis\n\n");
            output.push_str(&format!("Baseline: {}\n\n", base.name));
            output.push_str("| Scenario - Metric | Delta from Baseline |\n");
            output.push_str("|-------------------|---------------------|\n");
            for (name, metric, delta) in &deltas {
                output.push_str(&format!("| {} - {} | {:+.4} |\n", name, metric, delta));
            }
            output.push('\n');
        }

        if let Some(best) = self.cheapest() {
            output.push_str(&format!("Lowest total cost: **{}** (${:.4})\n", best.name, best.total_cost));
        }
        output
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from("scenario");
        for m in Metric::ALL {
            csv.push_str(&format!(",{}", m));
        }
        csv.push('\n');
        for s in &self.summaries {
            csv.push_str(&s.name);
            for m in Metric::ALL {
                csv.push_str(&format!(",{}", s.metric(m)));
            }
            csv.push('\n');
        }
        csv
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
