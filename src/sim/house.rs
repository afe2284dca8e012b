//! House pressure and indoor PM balance.
//!
//! The house is a single well-mixed air volume. Its pressure relative to
//! outdoors follows the volumetric imbalance between blower supply, stack
//! flow, exhaust and envelope leakage:
//!
//! ```text
//! C_house · dP/dt = Q_blower + Q_stack − Q_exhaust − sign(P)·C·|P|^n
//! C_house = V / (γ · P_atm)
//! ```
//!
//! Both the pressure and the per-bin concentrations are advanced with
//! backward Euler. The pressure step is solved inside a band of
//! `±max_pressure_step_pa` around the previous value, which is the rate limit,
//! and then clamped to the safety band.

use serde::{Deserialize, Serialize};

use crate::physics::implicit::BackwardEuler;
use crate::physics::particles::ParticleBin;
use crate::physics::resistance::ResistanceModel;
use crate::physics::units::{cfm_to_m3s, ATMOSPHERIC_PRESSURE, AIR_GAMMA};
use crate::sim::state::SimulationState;

/// Indoor mixing and loss coefficients (all 1/s).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixingRates {
    /// Loss at full blower flow, scaled by `Q_fan / Q_max`
    pub forced_convection: f64,
    /// Loss per kelvin of indoor/outdoor temperature difference
    pub buoyancy_per_k: f64,
    /// Constant background loss
    pub diffusion: f64,
}

impl Default for MixingRates {
    fn default() -> Self {
        Self {
            forced_convection: 1e-4,
            buoyancy_per_k: 1e-6,
            diffusion: 1e-5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseConfig {
    /// Conditioned air volume (m³)
    pub volume_m3: f64,
    /// Held indoor temperature (°C)
    pub indoor_temp_c: f64,
    /// Largest pressure change per control tick (Pa)
    pub max_pressure_step_pa: f64,
    /// Pressure safety band (± Pa)
    pub pressure_limit_pa: f64,
    pub initial_pressure_pa: f64,
    /// Indoor PM per bin at t = 0 (µg/m³); missing bins start clean
    pub initial_indoor_pm: Vec<f64>,
    pub mixing: MixingRates,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            volume_m3: 400.0,
            indoor_temp_c: 21.0,
            max_pressure_step_pa: 2.0,
            pressure_limit_pa: 30.0,
            initial_pressure_pa: 0.0,
            initial_indoor_pm: Vec::new(),
            mixing: MixingRates::default(),
        }
    }
}

/// Boundary flows and conditions for one tick.
#[derive(Debug, Clone, Copy)]
pub struct HouseInputs<'a> {
    pub blower_cfm: f64,
    pub exhaust_cfm: f64,
    /// Buoyancy flow, positive into the house (CFM)
    pub stack_cfm: f64,
    /// Largest flow the blower can deliver (CFM)
    pub max_blower_cfm: f64,
    pub outdoor_temp_c: f64,
    /// Outdoor PM per bin (µg/m³)
    pub outdoor_pm: &'a [f64],
}

/// Result of one house step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HouseStep {
    pub pressure_pa: f64,
    /// Outdoor air entering through the envelope (CFM)
    pub infiltration_cfm: f64,
    pub pressure_converged: bool,
    /// Bins whose update produced a non-finite value and kept the old one
    pub degraded_bins: usize,
}

impl HouseStep {
    pub fn is_degraded(&self) -> bool {
        !self.pressure_converged || self.degraded_bins > 0
    }
}

#[derive(Debug, Clone)]
pub struct HouseIntegrator {
    volume_m3: f64,
    capacitance: f64,
    indoor_temp_c: f64,
    max_step: f64,
    limit: f64,
    mixing: MixingRates,
    envelope: ResistanceModel,
    implicit: BackwardEuler,
}

impl HouseIntegrator {
    /// `envelope` supplies the leakage curve `C·|P|^n`.
    pub fn new(config: &HouseConfig, envelope: ResistanceModel) -> Self {
        let volume_m3 = config.volume_m3.max(1e-3);
        Self {
            volume_m3,
            capacitance: volume_m3 / (AIR_GAMMA * ATMOSPHERIC_PRESSURE),
            indoor_temp_c: config.indoor_temp_c,
            max_step: config.max_pressure_step_pa.abs(),
            limit: config.pressure_limit_pa.abs(),
            mixing: config.mixing,
            envelope,
            implicit: BackwardEuler::default(),
        }
    }

    pub fn volume_m3(&self) -> f64 {
        self.volume_m3
    }

    /// Pneumatic capacitance of the house (m³/Pa).
    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }

    pub fn pressure_limit(&self) -> f64 {
        self.limit
    }

    pub fn indoor_temp_c(&self) -> f64 {
        self.indoor_temp_c
    }

    /// Signed envelope flow out of the house at pressure `p` (CFM).
    fn leakage_out(&self, p: f64) -> f64 {
        self.envelope.leakage_flow(p).copysign(p)
    }

    /// Net flow into the house at pressure `p` (CFM).
    pub fn net_flow(&self, inputs: &HouseInputs<'_>, p: f64) -> f64 {
        inputs.blower_cfm.max(0.0) + inputs.stack_cfm - inputs.exhaust_cfm.max(0.0) - self.leakage_out(p)
    }

    /// Outdoor air entering through the envelope at pressure `p` (CFM).
    pub fn infiltration(&self, p: f64, stack_cfm: f64) -> f64 {
        (-self.leakage_out(p)).max(0.0) + stack_cfm.abs()
    }

    /// Mixing/deposition loss rate for `bin` (1/s).
    pub fn mixing_rate(&self, bin: &ParticleBin, inputs: &HouseInputs<'_>) -> f64 {
        let rate = |k: f64| if k.is_finite() { k.max(0.0) } else { 0.0 };
        let fan_share = if inputs.max_blower_cfm > 0.0 {
            (inputs.blower_cfm / inputs.max_blower_cfm).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let dt_k = (self.indoor_temp_c - inputs.outdoor_temp_c).abs();
        let k = rate(bin.deposition_rate)
            + rate(self.mixing.forced_convection) * fan_share
            + rate(self.mixing.buoyancy_per_k) * if dt_k.is_finite() { dt_k } else { 0.0 }
            + rate(self.mixing.diffusion);
        rate(k)
    }

    /// Advances pressure and indoor PM by one tick.
    pub fn step(
        &self,
        state: &mut SimulationState,
        inputs: &HouseInputs<'_>,
        bins: &[ParticleBin],
        dt: f64,
    ) -> HouseStep {
        let p_old = state.pressure_pa;
        let rate = |p: f64| cfm_to_m3s(self.net_flow(inputs, p)) / self.capacitance;
        let outcome = self
            .implicit
            .step(p_old, dt, p_old - self.max_step, p_old + self.max_step, rate);
        let pressure = outcome.value.clamp(-self.limit, self.limit);
        state.pressure_pa = pressure;

        let infiltration_cfm = self.infiltration(pressure, inputs.stack_cfm);
        let q_leak = cfm_to_m3s(infiltration_cfm);
        let q_fan = cfm_to_m3s(inputs.blower_cfm.max(0.0));
        let q_exh = cfm_to_m3s(inputs.exhaust_cfm.max(0.0));
        let v = self.volume_m3;

        let mut degraded_bins = 0;
        for (i, bin) in bins.iter().enumerate() {
            let Some(c_old) = state.indoor_pm.get(i).copied() else {
                continue;
            };
            let c_out = match inputs.outdoor_pm.get(i) {
                Some(&c) if c.is_finite() && c > 0.0 => c,
                _ => 0.0,
            };
            let c_fan_in = (1.0 - bin.filter_efficiency) * c_out;
            let c_leak_in = (1.0 - bin.envelope_efficiency()) * c_out;

            let source = (q_leak * c_leak_in + q_fan * c_fan_in - q_exh * c_old) / v;
            let sink = (q_leak + q_fan + q_exh) / v + self.mixing_rate(bin, inputs);
            if !(source.is_finite() && sink.is_finite()) {
                degraded_bins += 1;
                continue;
            }
            state.indoor_pm[i] = self.implicit.step_linear(c_old, dt, source, sink).max(0.0);
        }

        HouseStep {
            pressure_pa: pressure,
            infiltration_cfm,
            pressure_converged: outcome.converged,
            degraded_bins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::particles::FilterMedia;
    use crate::physics::resistance::{ResistanceParameters, ResistanceToggles};

    fn house() -> HouseIntegrator {
        let envelope = ResistanceModel::new(ResistanceParameters::default(), ResistanceToggles::default());
        HouseIntegrator::new(&HouseConfig::default(), envelope)
    }

    fn bin() -> ParticleBin {
        ParticleBin::new(2.5, &FilterMedia::hepa()).with_filter_efficiency(0.9999)
    }

    fn inputs(blower_cfm: f64, outdoor_pm: &[f64]) -> HouseInputs<'_> {
        HouseInputs {
            blower_cfm,
            exhaust_cfm: 0.0,
            stack_cfm: 0.0,
            max_blower_cfm: 1800.0,
            outdoor_temp_c: 21.0,
            outdoor_pm,
        }
    }

    #[test]
    fn test_pressure_rate_limited_and_bounded() {
        let house = house();
        let mut state = SimulationState::new(1, &[], 0.0);
        let pm = [0.0];
        let step = house.step(&mut state, &inputs(1500.0, &pm), &[bin()], 1.0);
        assert!((step.pressure_pa - 2.0).abs() < 1e-9);

        for _ in 0..100 {
            let step = house.step(&mut state, &inputs(5000.0, &pm), &[bin()], 1.0);
            assert!(step.pressure_pa <= 30.0);
        }
        assert_eq!(state.pressure_pa, 30.0);
    }

    #[test]
    fn test_pressure_settles_at_leakage_balance() {
        let house = house();
        let mut state = SimulationState::new(1, &[], 0.0);
        let pm = [0.0];
        for _ in 0..120 {
            house.step(&mut state, &inputs(118.0, &pm), &[bin()], 1.0);
        }
        // 118 CFM through C = 118 CFM/Pa^0.65 balances at 1 Pa.
        assert!((state.pressure_pa - 1.0).abs() < 1e-3);
        assert!(house.infiltration(state.pressure_pa, 0.0) == 0.0);
    }

    #[test]
    fn test_negative_pressure_infiltrates() {
        let house = house();
        assert!(house.infiltration(-2.0, 0.0) > 0.0);
        assert_eq!(house.infiltration(2.0, 0.0), 0.0);
        assert_eq!(house.infiltration(2.0, -10.0), 10.0);
    }

    #[test]
    fn test_zero_outdoor_pm_stays_zero() {
        let house = house();
        let mut state = SimulationState::new(1, &[], 0.0);
        let pm = [0.0];
        for _ in 0..500 {
            house.step(&mut state, &inputs(300.0, &pm), &[bin()], 1.0);
            assert_eq!(state.indoor_pm[0], 0.0);
        }
    }

    #[test]
    fn test_indoor_pm_decays_without_sources() {
        let house = house();
        let mut state = SimulationState::new(1, &[40.0], 0.0);
        let pm = [0.0];
        let mut last = 40.0;
        for _ in 0..600 {
            house.step(&mut state, &inputs(200.0, &pm), &[bin()], 1.0);
            assert!(state.indoor_pm[0] <= last);
            last = state.indoor_pm[0];
        }
        assert!(last < 40.0 && last >= 0.0);
    }

    #[test]
    fn test_non_finite_outdoor_pm_is_clean_air() {
        let house = house();
        let mut state = SimulationState::new(1, &[10.0], 0.0);
        let pm = [f64::NAN];
        let step = house.step(&mut state, &inputs(200.0, &pm), &[bin()], 1.0);
        assert_eq!(step.degraded_bins, 0);
        assert!(state.indoor_pm[0] < 10.0);
    }

    #[test]
    fn test_capacitance() {
        let house = house();
        assert!((house.capacitance() - 400.0 / (1.4 * 101_325.0)).abs() < 1e-12);
    }
}
