//! Mutable scenario state.
//!
//! One [`SimulationState`] exists per scenario. The driver owns it and lends it
//! by `&mut` to each component in tick order; components themselves only hold
//! read-only parameters.

use serde::{Deserialize, Serialize};

use crate::sim::filter::FilterPhase;

/// Energy gathered since the last hour close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyTally {
    /// Blower electrical energy (J)
    pub blower_j: f64,
    /// Thermal energy to heat supply air (J)
    pub heating_j: f64,
    /// Thermal energy to cool supply air (J)
    pub cooling_j: f64,
    /// Filter replacements to be charged
    pub filter_changes: u32,
}

impl EnergyTally {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// House pressure relative to outdoors (Pa)
    pub pressure_pa: f64,
    /// Controller output, normalised 0–1
    pub drive: f64,
    /// Drive seen by the fan after quantisation
    pub applied_drive: f64,
    /// Last resolved blower flow (CFM); also seeds the next solve
    pub flow_cfm: f64,
    /// Static pressure at the last operating point (Pa)
    pub fan_pressure_pa: f64,

    /// Captured dust per particle bin (g)
    pub dust_by_bin_g: Vec<f64>,
    pub total_dust_g: f64,
    /// Remaining filter life (%)
    pub filter_life_pct: f64,
    pub clogged: bool,
    pub filter_phase: FilterPhase,
    pub replacements: u32,

    /// Indoor PM per bin (µg/m³)
    pub indoor_pm: Vec<f64>,

    pub controller_integral: f64,
    pub controller_elapsed_secs: f64,
    /// False while the warm-up hold is in force
    pub controller_engaged: bool,
    /// Pressure seen at the previous warm-up tick (Pa)
    pub warmup_reference_pa: Option<f64>,

    pub energy: EnergyTally,
    /// Running cost ($), never decreasing
    pub cumulative_cost: f64,

    /// Ticks where a solver fell back
    pub degraded_ticks: u64,
    pub elapsed_secs: f64,
}

impl SimulationState {
    /// Fresh state for `num_bins` bins. Missing or invalid initial
    /// concentrations start at zero.
    pub fn new(num_bins: usize, initial_indoor_pm: &[f64], initial_pressure_pa: f64) -> Self {
        let indoor_pm = (0..num_bins)
            .map(|i| match initial_indoor_pm.get(i) {
                Some(&c) if c.is_finite() && c > 0.0 => c,
                _ => 0.0,
            })
            .collect();
        Self {
            pressure_pa: if initial_pressure_pa.is_finite() {
                initial_pressure_pa
            } else {
                0.0
            },
            drive: 0.0,
            applied_drive: 0.0,
            flow_cfm: 0.0,
            fan_pressure_pa: 0.0,
            dust_by_bin_g: vec![0.0; num_bins],
            total_dust_g: 0.0,
            filter_life_pct: 100.0,
            clogged: false,
            filter_phase: FilterPhase::Clean,
            replacements: 0,
            indoor_pm,
            controller_integral: 0.0,
            controller_elapsed_secs: 0.0,
            controller_engaged: false,
            warmup_reference_pa: None,
            energy: EnergyTally::default(),
            cumulative_cost: 0.0,
            degraded_ticks: 0,
            elapsed_secs: 0.0,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.indoor_pm.len()
    }

    /// Checks the physical invariants that must survive every tick.
    pub fn is_consistent(&self, pressure_limit_pa: f64) -> bool {
        self.dust_by_bin_g.iter().all(|&d| d.is_finite() && d >= 0.0)
            && self.indoor_pm.iter().all(|&c| c.is_finite() && c >= 0.0)
            && (0.0..=100.0).contains(&self.filter_life_pct)
            && self.pressure_pa.is_finite()
            && self.pressure_pa.abs() <= pressure_limit_pa + 1e-9
            && self.cumulative_cost.is_finite()
            && self.cumulative_cost >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = SimulationState::new(3, &[5.0, f64::NAN], 0.0);
        assert_eq!(state.indoor_pm, vec![5.0, 0.0, 0.0]);
        assert_eq!(state.dust_by_bin_g, vec![0.0; 3]);
        assert_eq!(state.filter_life_pct, 100.0);
        assert_eq!(state.filter_phase, FilterPhase::Clean);
        assert!(state.is_consistent(30.0));
    }

    #[test]
    fn test_consistency_catches_violations() {
        let mut state = SimulationState::new(1, &[], 0.0);
        state.pressure_pa = 31.0;
        assert!(!state.is_consistent(30.0));
        state.pressure_pa = 0.0;
        state.dust_by_bin_g[0] = -1.0;
        assert!(!state.is_consistent(30.0));
    }

    #[test]
    fn test_tally_clear() {
        let mut tally = EnergyTally {
            blower_j: 10.0,
            heating_j: 1.0,
            cooling_j: 2.0,
            filter_changes: 1,
        };
        tally.clear();
        assert_eq!(tally, EnergyTally::default());
    }
}
