//! System flow-resistance model.
//!
//! Maps a volumetric flow (CFM) to the static pressure (Pa) the blower has to
//! overcome. Three independently toggleable terms are summed:
//!
//! - **Duct friction**: empirical Darcy–Weisbach fit, `Δp ∝ L · Q^1.9 / D^4.9`
//! - **Envelope leakage**: inverted power law, `Δp = (Q / C)^(1/n)`
//! - **Filter**: Darcy composite of clean media plus the captured dust cake
//!
//! The flow-balance solver evaluates these at arbitrary points of its bracket,
//! so every term is total: any non-finite intermediate is replaced by that
//! term's fallback (a linear approximation, then zero) instead of propagating.

use serde::{Deserialize, Serialize};

use crate::physics::units::{cfm_to_m3s, finite_or, AIR_VISCOSITY};

/// Duct friction coefficient at the reference diameter (Pa / (m · CFM^1.9)).
pub const DUCT_COEFFICIENT: f64 = 4.0e-6;

/// Duct friction flow exponent.
pub const DUCT_EXPONENT: f64 = 1.9;

/// Diameter exponent of the duct friction fit.
pub const DUCT_DIAMETER_EXPONENT: f64 = 4.9;

/// Diameter at which [`DUCT_COEFFICIENT`] was fitted (m).
pub const DUCT_REFERENCE_DIAMETER: f64 = 0.25;

/// Flows below this (CFM) produce no envelope pressure.
pub const ENVELOPE_FLOW_EPSILON: f64 = 1e-3;

/// Floor applied to every permeability (m or m²).
pub const MIN_PERMEABILITY: f64 = 1e-15;

/// Floor applied to areas, coefficients and diameters.
const MIN_POSITIVE: f64 = 1e-6;

/// Immutable per-scenario resistance parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceParameters {
    /// Equivalent supply duct length (m)
    pub duct_length_m: f64,
    /// Equivalent round duct diameter (m)
    pub duct_diameter_m: f64,
    /// Envelope leakage coefficient C (CFM/Pa^n)
    pub leakage_coefficient: f64,
    /// Envelope leakage exponent n (typically 0.5–0.8)
    pub leakage_exponent: f64,
    /// Clean media permeability per unit thickness (m)
    pub media_permeability: f64,
    /// Dust cake permeability (m²)
    pub cake_permeability: f64,
    /// Dust cake bulk density (kg/m³)
    pub cake_density: f64,
    /// Media plus cake face area (m²)
    pub filter_area_m2: f64,
}

impl Default for ResistanceParameters {
    fn default() -> Self {
        Self {
            duct_length_m: 15.0,
            duct_diameter_m: DUCT_REFERENCE_DIAMETER,
            leakage_coefficient: 118.0, // ~1500 CFM50
            leakage_exponent: 0.65,
            media_permeability: 5.7e-7,
            cake_permeability: 2.5e-10,
            cake_density: 500.0,
            filter_area_m2: 0.5,
        }
    }
}

/// Which resistance terms take part in the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceToggles {
    pub duct: bool,
    pub envelope: bool,
    pub filter: bool,
}

impl Default for ResistanceToggles {
    fn default() -> Self {
        Self {
            duct: true,
            envelope: true,
            filter: true,
        }
    }
}

/// Time-varying inputs to the resistance curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResistanceConditions {
    /// Total captured dust (g)
    pub dust_mass_g: f64,
    /// Multiplier on duct loss from a partially closed damper (≥ 1)
    pub damper_multiplier: f64,
}

impl ResistanceConditions {
    pub fn new(dust_mass_g: f64) -> Self {
        Self {
            dust_mass_g,
            damper_multiplier: 1.0,
        }
    }

    pub fn with_damper(mut self, multiplier: f64) -> Self {
        self.damper_multiplier = multiplier;
        self
    }
}

impl Default for ResistanceConditions {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Flow-resistance curve of the duct + envelope + filter system.
#[derive(Debug, Clone)]
pub struct ResistanceModel {
    params: ResistanceParameters,
    toggles: ResistanceToggles,
}

/// Non-finite or negative inputs count as zero.
fn sanitize_non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn first_finite(candidates: &[f64]) -> f64 {
    candidates
        .iter()
        .copied()
        .find(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

impl ResistanceModel {
    pub fn new(params: ResistanceParameters, toggles: ResistanceToggles) -> Self {
        Self { params, toggles }
    }

    pub fn params(&self) -> &ResistanceParameters {
        &self.params
    }

    pub fn toggles(&self) -> ResistanceToggles {
        self.toggles
    }

    /// Leakage exponent clamped to a range where the inverse power law is well behaved.
    pub fn leakage_exponent(&self) -> f64 {
        finite_or(self.params.leakage_exponent, 0.65).clamp(0.3, 1.0)
    }

    /// Leakage coefficient floored to a small positive value.
    pub fn leakage_coefficient(&self) -> f64 {
        finite_or(self.params.leakage_coefficient, MIN_POSITIVE).max(MIN_POSITIVE)
    }

    /// Duct friction loss (Pa).
    pub fn duct_loss(&self, flow_cfm: f64, damper_multiplier: f64) -> f64 {
        let q = sanitize_non_negative(flow_cfm);
        let diameter = self.params.duct_diameter_m.max(MIN_POSITIVE);
        let length = sanitize_non_negative(self.params.duct_length_m);
        let multiplier = finite_or(damper_multiplier, 1.0).max(1.0);
        let k = DUCT_COEFFICIENT
            * length
            * (DUCT_REFERENCE_DIAMETER / diameter).powf(DUCT_DIAMETER_EXPONENT)
            * multiplier;

        first_finite(&[k * q.powf(DUCT_EXPONENT), DUCT_COEFFICIENT * length * q])
    }

    /// Envelope pressure needed to push `flow_cfm` through the leakage area (Pa).
    pub fn envelope_loss(&self, flow_cfm: f64) -> f64 {
        let q = sanitize_non_negative(flow_cfm);
        if q < ENVELOPE_FLOW_EPSILON {
            return 0.0;
        }
        let c = self.leakage_coefficient();
        let n = self.leakage_exponent();
        first_finite(&[(q / c).powf(1.0 / n), q / c])
    }

    /// Leakage flow (CFM) through the envelope at pressure difference `|dp|`.
    pub fn leakage_flow(&self, dp_pa: f64) -> f64 {
        let dp = finite_or(dp_pa, 0.0).abs();
        let c = self.leakage_coefficient();
        first_finite(&[c * dp.powf(self.leakage_exponent()), c * dp])
    }

    /// Dust cake thickness (m) for a captured mass in grams.
    pub fn cake_thickness(&self, dust_mass_g: f64) -> f64 {
        let mass_kg = sanitize_non_negative(dust_mass_g) / 1000.0;
        let density = self.params.cake_density.max(MIN_POSITIVE);
        let area = self.params.filter_area_m2.max(MIN_POSITIVE);
        first_finite(&[mass_kg / (density * area)])
    }

    /// Filter media + cake pressure drop (Pa).
    pub fn filter_loss(&self, flow_cfm: f64, dust_mass_g: f64) -> f64 {
        let q = cfm_to_m3s(sanitize_non_negative(flow_cfm));
        let area = self.params.filter_area_m2.max(MIN_POSITIVE);
        let k_media = self.params.media_permeability.max(MIN_PERMEABILITY);
        let k_cake = self.params.cake_permeability.max(MIN_PERMEABILITY);
        let face = AIR_VISCOSITY * q / area;
        let cake = self.cake_thickness(dust_mass_g);

        first_finite(&[face * (1.0 / k_media + cake / k_cake), face / k_media])
    }

    /// Sum of the enabled terms (Pa). Finite and non-negative for any input.
    pub fn total(&self, flow_cfm: f64, conditions: &ResistanceConditions) -> f64 {
        let mut dp = 0.0;
        if self.toggles.duct {
            dp += self.duct_loss(flow_cfm, conditions.damper_multiplier);
        }
        if self.toggles.envelope {
            dp += self.envelope_loss(flow_cfm);
        }
        if self.toggles.filter {
            dp += self.filter_loss(flow_cfm, conditions.dust_mass_g);
        }
        dp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> ResistanceModel {
        ResistanceModel::new(ResistanceParameters::default(), ResistanceToggles::default())
    }

    #[test]
    fn test_zero_flow_is_zero_pressure() {
        let m = model();
        assert_eq!(m.total(0.0, &ResistanceConditions::new(50.0)), 0.0);
        assert_eq!(m.envelope_loss(5e-4), 0.0);
    }

    #[test]
    fn test_envelope_inverts_leakage() {
        let m = model();
        let dp = m.envelope_loss(300.0);
        assert_relative_eq!(m.leakage_flow(dp), 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duct_scales_with_length_and_diameter() {
        let mut params = ResistanceParameters::default();
        let base = ResistanceModel::new(params, ResistanceToggles::default()).duct_loss(800.0, 1.0);
        params.duct_length_m *= 2.0;
        let longer = ResistanceModel::new(params, ResistanceToggles::default()).duct_loss(800.0, 1.0);
        assert_relative_eq!(longer, 2.0 * base, epsilon = 1e-9);

        params.duct_diameter_m = 0.2;
        let narrower =
            ResistanceModel::new(params, ResistanceToggles::default()).duct_loss(800.0, 1.0);
        assert!(narrower > longer);
    }

    #[test]
    fn test_cake_raises_filter_loss() {
        let m = model();
        let clean = m.filter_loss(600.0, 0.0);
        let loaded = m.filter_loss(600.0, 100.0);
        assert!(clean > 0.0);
        assert!(loaded > clean);
        // 100 g over 0.5 m² at 500 kg/m³
        assert_relative_eq!(m.cake_thickness(100.0), 4.0e-4, epsilon = 1e-12);
    }

    #[test]
    fn test_toggles_remove_terms() {
        let toggles = ResistanceToggles {
            duct: false,
            envelope: true,
            filter: false,
        };
        let m = ResistanceModel::new(ResistanceParameters::default(), toggles);
        let c = ResistanceConditions::new(10.0);
        assert_relative_eq!(m.total(400.0, &c), m.envelope_loss(400.0), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_parameters_stay_finite() {
        let params = ResistanceParameters {
            duct_length_m: f64::NAN,
            duct_diameter_m: 0.0,
            leakage_coefficient: 0.0,
            leakage_exponent: f64::INFINITY,
            media_permeability: 0.0,
            cake_permeability: -1.0,
            cake_density: 0.0,
            filter_area_m2: 0.0,
        };
        let m = ResistanceModel::new(params, ResistanceToggles::default());
        for q in [0.0, 1e-9, 1.0, 1e3, 1e12, f64::NAN, -5.0, f64::INFINITY] {
            let dp = m.total(q, &ResistanceConditions::new(1e6));
            assert!(dp.is_finite() && dp >= 0.0, "q={q} dp={dp}");
        }
    }

    #[test]
    fn test_damper_multiplier_only_affects_duct() {
        let m = model();
        let open = m.total(500.0, &ResistanceConditions::new(0.0));
        let throttled = m.total(500.0, &ResistanceConditions::new(0.0).with_damper(4.0));
        let duct = m.duct_loss(500.0, 1.0);
        assert_relative_eq!(throttled - open, 3.0 * duct, epsilon = 1e-9);
    }
}
