//! Particle size bins and their size-dependent transport properties.
//!
//! Filter capture efficiency, envelope penetration and natural deposition all
//! depend on aerodynamic diameter. Each is a monotone empirical fit clamped to
//! a physical range, so arbitrary user diameters still give sane factors.

use serde::{Deserialize, Serialize};

use crate::physics::units::finite_or;

/// Smallest diameter the empirical fits are evaluated at (µm).
const MIN_DIAMETER_UM: f64 = 0.01;
/// Largest diameter the empirical fits are evaluated at (µm).
const MAX_DIAMETER_UM: f64 = 100.0;
/// Efficiency ceiling; a filter never captures everything.
const MAX_EFFICIENCY: f64 = 0.999_999;

/// Fractional-efficiency curve of a filter medium.
///
/// `η(d) = η_min + (η_max − η_min) / (1 + (d50 / d)^slope)` increases
/// monotonically with diameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterMedia {
    pub min_efficiency: f64,
    pub max_efficiency: f64,
    /// Diameter at the curve midpoint (µm)
    pub d50_um: f64,
    pub slope: f64,
}

impl FilterMedia {
    /// MERV 8 class pleated media.
    pub fn standard() -> Self {
        Self {
            min_efficiency: 0.05,
            max_efficiency: 0.90,
            d50_um: 3.0,
            slope: 1.5,
        }
    }

    /// HEPA media (≥ 99.97 % at the most penetrating size).
    pub fn hepa() -> Self {
        Self {
            min_efficiency: 0.9997,
            max_efficiency: 0.99999,
            d50_um: 0.3,
            slope: 1.0,
        }
    }

    /// Capture efficiency at `diameter_um`, clamped to [0, 0.999999].
    pub fn efficiency(&self, diameter_um: f64) -> f64 {
        let d = clamp_diameter(diameter_um);
        let lo = self.min_efficiency.clamp(0.0, MAX_EFFICIENCY);
        let hi = self.max_efficiency.clamp(lo, MAX_EFFICIENCY);
        let d50 = if self.d50_um.is_finite() && self.d50_um > 0.0 {
            self.d50_um
        } else {
            1.0
        };
        let slope = finite_or(self.slope, 1.0).max(0.0);
        let eta = lo + (hi - lo) / (1.0 + (d50 / d).powf(slope));
        if eta.is_finite() {
            eta.clamp(0.0, MAX_EFFICIENCY)
        } else {
            lo
        }
    }
}

impl Default for FilterMedia {
    fn default() -> Self {
        Self::standard()
    }
}

fn clamp_diameter(diameter_um: f64) -> f64 {
    finite_or(diameter_um, MIN_DIAMETER_UM).clamp(MIN_DIAMETER_UM, MAX_DIAMETER_UM)
}

/// Fraction of outdoor particles that survive passage through envelope cracks.
///
/// Near unity for fine particles, falling off for coarse ones.
pub fn envelope_penetration(diameter_um: f64) -> f64 {
    let d = clamp_diameter(diameter_um);
    (1.0 - 0.05 * (d - 1.0).max(0.0)).clamp(0.2, 1.0)
}

/// Natural indoor deposition rate (1/s), rising with particle size.
pub fn deposition_rate(diameter_um: f64) -> f64 {
    let d = clamp_diameter(diameter_um);
    let per_hour = (0.1 + 0.05 * d.powf(1.5)).clamp(0.05, 5.0);
    per_hour / 3600.0
}

/// One particle-size class tracked by the mass balances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleBin {
    /// Representative aerodynamic diameter (µm)
    pub diameter_um: f64,
    /// Single-pass capture efficiency of the installed filter (0–1)
    pub filter_efficiency: f64,
    /// Envelope penetration factor (0–1)
    pub envelope_penetration: f64,
    /// Natural deposition rate (1/s)
    pub deposition_rate: f64,
}

impl ParticleBin {
    /// Derives every property from the diameter and the filter media.
    pub fn new(diameter_um: f64, media: &FilterMedia) -> Self {
        Self {
            diameter_um,
            filter_efficiency: media.efficiency(diameter_um),
            envelope_penetration: envelope_penetration(diameter_um),
            deposition_rate: deposition_rate(diameter_um),
        }
    }

    /// Replaces the filter efficiency with a rated value.
    pub fn with_filter_efficiency(mut self, efficiency: f64) -> Self {
        self.filter_efficiency = finite_or(efficiency, 0.0).clamp(0.0, MAX_EFFICIENCY);
        self
    }

    /// Fraction of outdoor particles the envelope removes.
    pub fn envelope_efficiency(&self) -> f64 {
        1.0 - self.envelope_penetration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIAMETERS: [f64; 7] = [0.05, 0.3, 1.0, 2.5, 5.0, 10.0, 50.0];

    #[test]
    fn test_efficiency_monotone_in_size() {
        for media in [FilterMedia::standard(), FilterMedia::hepa()] {
            let eff: Vec<f64> = DIAMETERS.iter().map(|&d| media.efficiency(d)).collect();
            assert!(eff.windows(2).all(|w| w[1] >= w[0]), "{eff:?}");
            assert!(eff.iter().all(|&e| (0.0..1.0).contains(&e)));
        }
    }

    #[test]
    fn test_hepa_beats_standard() {
        let std = FilterMedia::standard();
        let hepa = FilterMedia::hepa();
        for d in DIAMETERS {
            assert!(hepa.efficiency(d) > std.efficiency(d));
        }
        assert!(hepa.efficiency(0.3) >= 0.9997);
    }

    #[test]
    fn test_penetration_and_deposition_are_clamped_monotone() {
        let pen: Vec<f64> = DIAMETERS.iter().map(|&d| envelope_penetration(d)).collect();
        let dep: Vec<f64> = DIAMETERS.iter().map(|&d| deposition_rate(d)).collect();
        assert!(pen.windows(2).all(|w| w[1] <= w[0]));
        assert!(dep.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(envelope_penetration(0.3), 1.0);
        assert_eq!(envelope_penetration(1e9), 0.2);
        assert!(deposition_rate(f64::NAN) > 0.0);
    }

    #[test]
    fn test_efficiency_override() {
        let bin = ParticleBin::new(2.5, &FilterMedia::standard()).with_filter_efficiency(0.9999);
        assert_eq!(bin.filter_efficiency, 0.9999);
        let bin = bin.with_filter_efficiency(3.0);
        assert!(bin.filter_efficiency < 1.0);
    }
}
