//! Filter dust loading.
//!
//! Every tick the blower pushes outdoor-origin PM through the filter; the
//! captured mass builds the dust cake that raises filter resistance. The
//! tracker runs `Clean → Loading → Clogged → [replace] → Clean` and reports the
//! clog transition exactly once per filter.

use log::info;
use serde::{Deserialize, Serialize};

use crate::physics::particles::{FilterMedia, ParticleBin};
use crate::physics::units::cfm_to_m3s;
use crate::sim::state::SimulationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPhase {
    Clean,
    Loading,
    Clogged,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub media: FilterMedia,
    /// Dust the filter can hold before it counts as spent (g)
    pub capacity_g: f64,
    /// Share of capacity at which the filter is declared clogged
    pub clog_fraction: f64,
    /// Swap the filter as soon as it clogs
    pub auto_replace: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl FilterConfig {
    pub fn standard() -> Self {
        Self {
            media: FilterMedia::standard(),
            capacity_g: 120.0,
            clog_fraction: 0.95,
            auto_replace: true,
        }
    }

    pub fn hepa() -> Self {
        Self {
            media: FilterMedia::hepa(),
            capacity_g: 80.0,
            clog_fraction: 0.95,
            auto_replace: true,
        }
    }
}

/// What a loading step did to the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOutcome {
    Unchanged,
    /// The clog threshold was crossed on this tick. `replaced` is true when
    /// the filter was swapped immediately.
    Clogged { dust_g: f64, replaced: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterLoadingTracker {
    capacity_g: f64,
    clog_fraction: f64,
    auto_replace: bool,
}

impl FilterLoadingTracker {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            capacity_g: if config.capacity_g.is_finite() && config.capacity_g > 0.0 {
                config.capacity_g
            } else {
                FilterConfig::standard().capacity_g
            },
            clog_fraction: if config.clog_fraction.is_finite() {
                config.clog_fraction.clamp(0.01, 1.0)
            } else {
                0.95
            },
            auto_replace: config.auto_replace,
        }
    }

    pub fn capacity_g(&self) -> f64 {
        self.capacity_g
    }

    pub fn threshold_g(&self) -> f64 {
        self.clog_fraction * self.capacity_g
    }

    /// Returns a tracker with a different capacity.
    ///
    /// Call [`refresh`](Self::refresh) afterwards so a clogged filter below
    /// the new threshold returns to `Loading`.
    pub fn with_capacity(mut self, capacity_g: f64) -> Self {
        if capacity_g.is_finite() && capacity_g > 0.0 {
            self.capacity_g = capacity_g;
        }
        self
    }

    /// Captured mass flux per bin (g/s) at `flow_cfm`.
    pub fn capture_flux(flow_cfm: f64, outdoor_pm: f64, bin: &ParticleBin) -> f64 {
        let flux = cfm_to_m3s(flow_cfm.max(0.0)) * outdoor_pm * bin.filter_efficiency * 1e-6;
        if flux.is_finite() && flux > 0.0 {
            flux
        } else {
            0.0
        }
    }

    /// Adds one tick of captured dust and advances the state machine.
    ///
    /// `outdoor_pm` is indexed like `bins`; missing entries count as clean air.
    pub fn accumulate(
        &self,
        state: &mut SimulationState,
        flow_cfm: f64,
        outdoor_pm: &[f64],
        bins: &[ParticleBin],
        dt: f64,
    ) -> FilterOutcome {
        self.refresh(state);

        for (i, bin) in bins.iter().enumerate() {
            let c_out = outdoor_pm.get(i).copied().unwrap_or(0.0);
            let added = Self::capture_flux(flow_cfm, c_out, bin) * dt.max(0.0);
            if let Some(dust) = state.dust_by_bin_g.get_mut(i) {
                let next = *dust + added;
                *dust = if next.is_finite() { next.max(0.0) } else { *dust };
            }
        }
        self.update_totals(state);

        if state.total_dust_g >= self.threshold_g() && !state.clogged {
            let dust_g = state.total_dust_g;
            state.clogged = true;
            state.filter_phase = FilterPhase::Clogged;
            state.replacements += 1;
            if self.auto_replace {
                info!(
                    "Filter clogged at {:.1} g ({:.0}% of capacity), replacing",
                    dust_g,
                    100.0 * dust_g / self.capacity_g
                );
                self.replace(state);
            } else {
                info!("Filter clogged at {:.1} g, waiting for replacement", dust_g);
            }
            return FilterOutcome::Clogged {
                dust_g,
                replaced: self.auto_replace,
            };
        }

        if !state.clogged {
            state.filter_phase = if state.total_dust_g > 0.0 {
                FilterPhase::Loading
            } else {
                FilterPhase::Clean
            };
        }
        FilterOutcome::Unchanged
    }

    /// Re-evaluates a clogged filter after an external change.
    pub fn refresh(&self, state: &mut SimulationState) {
        self.update_totals(state);
        if state.clogged && state.total_dust_g < self.threshold_g() {
            state.clogged = false;
            state.filter_phase = if state.total_dust_g > 0.0 {
                FilterPhase::Loading
            } else {
                FilterPhase::Clean
            };
        }
    }

    /// Installs a fresh filter.
    pub fn replace(&self, state: &mut SimulationState) {
        state.dust_by_bin_g.iter_mut().for_each(|d| *d = 0.0);
        state.total_dust_g = 0.0;
        state.filter_life_pct = 100.0;
        state.clogged = false;
        state.filter_phase = FilterPhase::Clean;
    }

    fn update_totals(&self, state: &mut SimulationState) {
        state.total_dust_g = state.dust_by_bin_g.iter().sum();
        state.filter_life_pct = (100.0 * (1.0 - state.total_dust_g / self.capacity_g)).clamp(0.0, 100.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bins() -> Vec<ParticleBin> {
        let media = FilterMedia::standard();
        vec![
            ParticleBin::new(2.5, &media).with_filter_efficiency(0.5),
            ParticleBin::new(10.0, &media).with_filter_efficiency(0.9),
        ]
    }

    fn manual(capacity_g: f64) -> FilterLoadingTracker {
        FilterLoadingTracker::new(&FilterConfig {
            capacity_g,
            auto_replace: false,
            ..FilterConfig::standard()
        })
    }

    #[test]
    fn test_zero_flow_adds_no_dust() {
        let tracker = manual(120.0);
        let mut state = SimulationState::new(2, &[], 0.0);
        let outcome = tracker.accumulate(&mut state, 0.0, &[50.0, 50.0], &bins(), 1.0);
        assert_eq!(outcome, FilterOutcome::Unchanged);
        assert_eq!(state.total_dust_g, 0.0);
        assert_eq!(state.filter_phase, FilterPhase::Clean);
    }

    #[test]
    fn test_capture_flux() {
        let bin = ParticleBin::new(2.5, &FilterMedia::standard()).with_filter_efficiency(0.5);
        // 1000 CFM = 0.4719 m³/s, 100 µg/m³, 50 % capture
        assert_relative_eq!(
            FilterLoadingTracker::capture_flux(1000.0, 100.0, &bin),
            0.4719474432 * 100.0 * 0.5 * 1e-6,
            max_relative = 1e-12
        );
        assert_eq!(FilterLoadingTracker::capture_flux(1000.0, f64::NAN, &bin), 0.0);
        assert_eq!(FilterLoadingTracker::capture_flux(1000.0, -5.0, &bin), 0.0);
    }

    #[test]
    fn test_dust_monotone_and_life_bounded() {
        let tracker = manual(1e-3);
        let mut state = SimulationState::new(2, &[], 0.0);
        let mut last = 0.0;
        for _ in 0..100 {
            tracker.accumulate(&mut state, 500.0, &[40.0, 80.0], &bins(), 1.0);
            assert!(state.total_dust_g >= last);
            assert!((0.0..=100.0).contains(&state.filter_life_pct));
            last = state.total_dust_g;
        }
        assert_eq!(state.filter_life_pct, 0.0);
    }

    #[test]
    fn test_clog_is_edge_triggered() {
        let tracker = manual(1e-4);
        let mut state = SimulationState::new(2, &[], 0.0);
        let clogs = (0..200)
            .map(|_| tracker.accumulate(&mut state, 800.0, &[60.0, 60.0], &bins(), 1.0))
            .filter(|o| matches!(o, FilterOutcome::Clogged { .. }))
            .count();
        assert_eq!(clogs, 1);
        assert_eq!(state.replacements, 1);
        assert!(state.clogged);
        assert_eq!(state.filter_phase, FilterPhase::Clogged);

        tracker.replace(&mut state);
        assert_eq!(state.filter_phase, FilterPhase::Clean);
        assert_eq!(state.filter_life_pct, 100.0);
        assert!(!state.clogged);
    }

    #[test]
    fn test_auto_replace_resets_immediately() {
        let tracker = FilterLoadingTracker::new(&FilterConfig {
            capacity_g: 1e-4,
            ..FilterConfig::standard()
        });
        let mut state = SimulationState::new(2, &[], 0.0);
        let mut outcomes = Vec::new();
        for _ in 0..200 {
            if let FilterOutcome::Clogged { replaced, .. } =
                tracker.accumulate(&mut state, 800.0, &[60.0, 60.0], &bins(), 1.0)
            {
                outcomes.push(replaced);
                assert_eq!(state.total_dust_g, 0.0);
                assert_eq!(state.filter_phase, FilterPhase::Clean);
            }
        }
        assert!(outcomes.len() >= 2);
        assert!(outcomes.iter().all(|&r| r));
        assert_eq!(state.replacements as usize, outcomes.len());
    }

    #[test]
    fn test_capacity_change_unclogs() {
        let tracker = manual(1e-4);
        let mut state = SimulationState::new(2, &[], 0.0);
        while !state.clogged {
            tracker.accumulate(&mut state, 800.0, &[60.0, 60.0], &bins(), 1.0);
        }
        let bigger = tracker.with_capacity(1.0);
        bigger.refresh(&mut state);
        assert!(!state.clogged);
        assert_eq!(state.filter_phase, FilterPhase::Loading);
    }
}
