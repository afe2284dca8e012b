//! Scenario configuration.
//!
//! A [`ScenarioConfig`] bundles every read-only parameter set a scenario needs.
//! It is plain data: built once (from a preset or JSON), sanitised, validated,
//! then handed to the driver.
//!
//! Faults are split in two tiers. Values that are merely out of range are
//! clamped by [`ScenarioConfig::sanitize`] with a `warn!` line. Structural
//! faults (a time grid that cannot nest, a fan curve with fewer than two
//! points, no particle bins) are returned as [`SimError`] by
//! [`ScenarioConfig::validate`].

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::physics::fan::{FanCurve, FanPoint, DEFAULT_FAN_CURVE};
use crate::physics::particles::ParticleBin;
use crate::physics::resistance::{ResistanceParameters, ResistanceToggles};
use crate::sim::controller::ControllerConfig;
use crate::sim::cost::EconomicParameters;
use crate::sim::damper::DamperConfig;
use crate::sim::drive::DriveScale;
use crate::sim::filter::FilterConfig;
use crate::sim::house::HouseConfig;
use crate::sim::schedule::DailySchedule;
use crate::sim::ventilation::{ExhaustEvent, StackEffect};

/// Seconds per hour of weather.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Dual-rate clock: control ticks nested inside environment steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeGrid {
    pub control_step_secs: f64,
    pub env_step_secs: f64,
    /// Number of environment steps to simulate
    pub hours: usize,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            control_step_secs: 1.0,
            env_step_secs: SECONDS_PER_HOUR,
            hours: 24,
        }
    }
}

impl TimeGrid {
    pub fn new(control_step_secs: f64, env_step_secs: f64, hours: usize) -> Result<Self, SimError> {
        let grid = Self {
            control_step_secs,
            env_step_secs,
            hours,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let fail = |reason: &'static str| {
            Err(SimError::InvalidTimeGrid {
                control_step_secs: self.control_step_secs,
                env_step_secs: self.env_step_secs,
                hours: self.hours,
                reason,
            })
        };
        if !(self.control_step_secs.is_finite() && self.control_step_secs > 0.0) {
            return fail("control step must be a positive number of seconds");
        }
        if !(self.env_step_secs.is_finite() && self.env_step_secs > 0.0) {
            return fail("environment step must be a positive number of seconds");
        }
        if self.env_step_secs < self.control_step_secs {
            return fail("environment step is shorter than the control step");
        }
        let ratio = self.env_step_secs / self.control_step_secs;
        if (ratio - ratio.round()).abs() > 1e-9 * ratio {
            return fail("environment step is not an integer multiple of the control step");
        }
        if self.hours == 0 {
            return fail("no environment steps to simulate");
        }
        Ok(())
    }

    /// Control ticks per environment step.
    pub fn ticks_per_step(&self) -> usize {
        (self.env_step_secs / self.control_step_secs).round().max(1.0) as usize
    }

    pub fn total_ticks(&self) -> usize {
        self.ticks_per_step() * self.hours
    }

    /// Hour of day at the start of environment step `step`.
    pub fn hour_of_day(&self, step: usize) -> usize {
        ((step as f64 * self.env_step_secs) / SECONDS_PER_HOUR).floor() as usize % 24
    }
}

/// Switches for optional model terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub duct_loss: bool,
    pub envelope_loss: bool,
    pub filter_loss: bool,
    pub stack_effect: bool,
    pub exhaust: bool,
    pub damper: bool,
    pub discrete_drive: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            duct_loss: true,
            envelope_loss: true,
            filter_loss: true,
            stack_effect: true,
            exhaust: true,
            damper: false,
            discrete_drive: false,
        }
    }
}

impl FeatureToggles {
    pub fn resistance_toggles(&self) -> ResistanceToggles {
        ResistanceToggles {
            duct: self.duct_loss,
            envelope: self.envelope_loss,
            filter: self.filter_loss,
        }
    }
}

/// One particle-size bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    pub diameter_um: f64,
    /// Rated capture efficiency; derived from the filter media when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_efficiency: Option<f64>,
}

impl BinConfig {
    pub fn new(diameter_um: f64) -> Self {
        Self {
            diameter_um,
            filter_efficiency: None,
        }
    }

    pub fn with_efficiency(diameter_um: f64, efficiency: f64) -> Self {
        Self {
            diameter_um,
            filter_efficiency: Some(efficiency),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    pub time_grid: TimeGrid,
    pub house: HouseConfig,
    pub resistance: ResistanceParameters,
    /// Blower curve samples at full drive
    pub fan_curve: Vec<FanPoint>,
    pub filter: FilterConfig,
    pub bins: Vec<BinConfig>,
    pub controller: ControllerConfig,
    pub economics: EconomicParameters,
    pub features: FeatureToggles,
    pub stack: StackEffect,
    pub exhaust_events: Vec<ExhaustEvent>,
    pub damper: DamperConfig,
    /// Commanded damper angle per hour of day (degrees)
    pub damper_schedule: DailySchedule,
    pub drive_scale: DriveScale,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::standard()
    }
}

fn check(value: &mut f64, valid: impl Fn(f64) -> bool, fallback: f64, what: &str, fixes: &mut usize) {
    if !valid(*value) {
        warn!("Invalid {} ({}), using {}", what, value, fallback);
        *value = fallback;
        *fixes += 1;
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Unit-interval fraction that excludes zero.
fn open_fraction(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

impl ScenarioConfig {
    /// MERV-8 class filter, PM2.5 and PM10 bins, typical kitchen/bath exhaust.
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            time_grid: TimeGrid::default(),
            house: HouseConfig::default(),
            resistance: ResistanceParameters::default(),
            fan_curve: DEFAULT_FAN_CURVE.to_vec(),
            filter: FilterConfig::standard(),
            bins: vec![BinConfig::new(2.5), BinConfig::new(10.0)],
            controller: ControllerConfig::default(),
            economics: EconomicParameters::default(),
            features: FeatureToggles::default(),
            stack: StackEffect::default(),
            exhaust_events: vec![
                ExhaustEvent::new("bath fan", 7, 8, 50.0),
                ExhaustEvent::new("kitchen hood", 17, 19, 100.0),
            ],
            damper: DamperConfig::default(),
            damper_schedule: DailySchedule::constant("damper", 90.0),
            drive_scale: DriveScale::default(),
        }
    }

    /// Same house with a HEPA filter: larger face area, tighter media, dearer
    /// replacements.
    pub fn hepa() -> Self {
        let base = Self::standard();
        Self {
            name: "hepa".to_string(),
            resistance: ResistanceParameters {
                filter_area_m2: 1.0,
                media_permeability: 1.5e-7,
                ..base.resistance
            },
            filter: FilterConfig::hepa(),
            economics: EconomicParameters {
                filter_replacement_cost: 60.0,
                ..base.economics
            },
            ..base
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_hours(mut self, hours: usize) -> Self {
        self.time_grid.hours = hours;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Derived particle bins, with rated efficiencies where given.
    pub fn particle_bins(&self) -> Vec<ParticleBin> {
        self.bins
            .iter()
            .map(|b| {
                let bin = ParticleBin::new(b.diameter_um, &self.filter.media);
                match b.filter_efficiency {
                    Some(eff) => bin.with_filter_efficiency(eff),
                    None => bin,
                }
            })
            .collect()
    }

    /// Clamps out-of-range values to usable ones, logging each change.
    /// Returns the number of corrections.
    pub fn sanitize(&mut self) -> usize {
        let mut fixes = 0;
        let f = &mut fixes;

        let hd = HouseConfig::default();
        let h = &mut self.house;
        check(&mut h.volume_m3, positive, hd.volume_m3, "house volume", f);
        check(&mut h.indoor_temp_c, f64::is_finite, hd.indoor_temp_c, "indoor temperature", f);
        check(&mut h.max_pressure_step_pa, positive, hd.max_pressure_step_pa, "pressure rate limit", f);
        check(&mut h.pressure_limit_pa, positive, hd.pressure_limit_pa, "pressure limit", f);
        let limit = h.pressure_limit_pa;
        let within_limit = move |p: f64| p.is_finite() && p.abs() <= limit;
        let p0 = if h.initial_pressure_pa.is_finite() {
            h.initial_pressure_pa.clamp(-limit, limit)
        } else {
            0.0
        };
        check(&mut h.initial_pressure_pa, within_limit, p0, "initial pressure", f);
        for c in h.initial_indoor_pm.iter_mut() {
            check(c, non_negative, 0.0, "initial indoor PM", f);
        }
        let m = &mut h.mixing;
        check(&mut m.forced_convection, non_negative, 0.0, "forced mixing rate", f);
        check(&mut m.buoyancy_per_k, non_negative, 0.0, "buoyant mixing rate", f);
        check(&mut m.diffusion, non_negative, 0.0, "diffusion rate", f);

        let rd = ResistanceParameters::default();
        let r = &mut self.resistance;
        check(&mut r.duct_length_m, non_negative, rd.duct_length_m, "duct length", f);
        check(&mut r.duct_diameter_m, positive, rd.duct_diameter_m, "duct diameter", f);
        check(&mut r.leakage_coefficient, positive, rd.leakage_coefficient, "leakage coefficient", f);
        let n = if r.leakage_exponent.is_finite() {
            r.leakage_exponent.clamp(0.3, 1.0)
        } else {
            rd.leakage_exponent
        };
        check(
            &mut r.leakage_exponent,
            |v| v.is_finite() && (0.3..=1.0).contains(&v),
            n,
            "leakage exponent",
            f,
        );
        check(&mut r.media_permeability, positive, rd.media_permeability, "media permeability", f);
        check(&mut r.cake_permeability, positive, rd.cake_permeability, "cake permeability", f);
        check(&mut r.cake_density, positive, rd.cake_density, "cake density", f);
        check(&mut r.filter_area_m2, positive, rd.filter_area_m2, "filter area", f);

        let fd = FilterConfig::default();
        let fl = &mut self.filter;
        check(&mut fl.capacity_g, positive, fd.capacity_g, "filter capacity", f);
        check(&mut fl.clog_fraction, open_fraction, fd.clog_fraction, "clog fraction", f);

        for bin in self.bins.iter_mut() {
            check(&mut bin.diameter_um, positive, 2.5, "bin diameter", f);
            if let Some(eff) = bin.filter_efficiency.as_mut() {
                let clamped = if eff.is_finite() { eff.clamp(0.0, 1.0) } else { 0.0 };
                check(eff, fraction, clamped, "bin filter efficiency", f);
            }
        }

        let cd = ControllerConfig::default();
        let c = &mut self.controller;
        check(&mut c.target_pressure_pa, within_limit, cd.target_pressure_pa, "target pressure", f);
        check(&mut c.kp, non_negative, cd.kp, "proportional gain", f);
        check(&mut c.ki, non_negative, cd.ki, "integral gain", f);
        check(&mut c.integral_limit, non_negative, cd.integral_limit, "integral limit", f);
        check(&mut c.damping, open_fraction, cd.damping, "controller damping", f);
        check(&mut c.bias, f64::is_finite, 0.0, "controller bias", f);
        check(&mut c.min_drive, fraction, cd.min_drive, "minimum drive", f);
        let min_drive = c.min_drive;
        check(
            &mut c.max_drive,
            |v| fraction(v) && v >= min_drive,
            cd.max_drive,
            "maximum drive",
            f,
        );
        check(&mut c.warmup_secs, non_negative, cd.warmup_secs, "warm-up time", f);
        check(&mut c.warmup_drive, fraction, cd.warmup_drive, "warm-up drive", f);
        check(&mut c.settle_tolerance_pa, non_negative, cd.settle_tolerance_pa, "settle tolerance", f);
        let warmup_secs = c.warmup_secs;
        check(
            &mut c.max_warmup_secs,
            |v| v.is_finite() && v >= warmup_secs,
            cd.max_warmup_secs.max(warmup_secs),
            "warm-up cap",
            f,
        );

        let ed = EconomicParameters::default();
        let e = &mut self.economics;
        check(&mut e.on_peak_rate, non_negative, ed.on_peak_rate, "on-peak rate", f);
        check(&mut e.off_peak_rate, non_negative, ed.off_peak_rate, "off-peak rate", f);
        check(&mut e.gas_efficiency, open_fraction, ed.gas_efficiency, "furnace efficiency", f);
        check(&mut e.gas_price_per_therm, non_negative, ed.gas_price_per_therm, "gas price", f);
        check(&mut e.cooling_cop, positive, ed.cooling_cop, "cooling COP", f);
        check(
            &mut e.filter_replacement_cost,
            non_negative,
            ed.filter_replacement_cost,
            "filter cost",
            f,
        );
        check(&mut e.blower_efficiency, open_fraction, ed.blower_efficiency, "blower efficiency", f);
        check(&mut e.heating_setpoint_c, f64::is_finite, ed.heating_setpoint_c, "heating setpoint", f);
        check(&mut e.cooling_setpoint_c, f64::is_finite, ed.cooling_setpoint_c, "cooling setpoint", f);
        if e.on_peak_start_hour > 23 || e.on_peak_end_hour > 24 {
            warn!(
                "On-peak window {}-{} outside the day, wrapping",
                e.on_peak_start_hour, e.on_peak_end_hour
            );
            e.on_peak_start_hour %= 24;
            e.on_peak_end_hour %= 24;
            *f += 1;
        }

        let s = &mut self.stack;
        check(&mut s.height_m, non_negative, 0.0, "stack height", f);
        check(&mut s.flow_fraction, fraction, 0.0, "stack flow fraction", f);

        for event in self.exhaust_events.iter_mut() {
            check(&mut event.flow_cfm, non_negative, 0.0, "exhaust flow", f);
        }

        let dd = DamperConfig::default();
        let d = &mut self.damper;
        check(&mut d.full_travel_secs, positive, dd.full_travel_secs, "damper travel time", f);
        check(&mut d.reset_secs, non_negative, dd.reset_secs, "damper reset time", f);

        let g = &mut self.drive_scale;
        let scale_ok = g.levels > 0
            && fraction(g.max_duty)
            && g.min_duty.is_finite()
            && (0.0..=g.max_duty).contains(&g.min_duty);
        if !scale_ok {
            warn!("Invalid drive scale {:?}, using defaults", g);
            *g = DriveScale::default();
            *f += 1;
        }

        fixes
    }

    /// Structural checks that cannot be repaired by clamping.
    pub fn validate(&self) -> Result<(), SimError> {
        self.time_grid.validate()?;
        FanCurve::new(&self.fan_curve)?;
        if self.bins.is_empty() {
            return Err(SimError::InvalidConfig {
                component: "particle bins",
                detail: "at least one bin is required".to_string(),
            });
        }
        if self.house.initial_indoor_pm.len() > self.bins.len() {
            return Err(SimError::InvalidConfig {
                component: "house",
                detail: format!(
                    "{} initial PM values for {} bin(s)",
                    self.house.initial_indoor_pm.len(),
                    self.bins.len()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_grid_validation() {
        assert!(TimeGrid::new(1.0, 3600.0, 24).is_ok());
        assert!(TimeGrid::new(0.5, 3600.0, 1).is_ok());
        assert!(TimeGrid::new(7.0, 3600.0, 24).is_err());
        assert!(TimeGrid::new(0.0, 3600.0, 24).is_err());
        assert!(TimeGrid::new(f64::NAN, 3600.0, 24).is_err());
        assert!(TimeGrid::new(10.0, 5.0, 24).is_err());
        assert!(TimeGrid::new(1.0, 3600.0, 0).is_err());

        let grid = TimeGrid::new(0.5, 3600.0, 48).unwrap();
        assert_eq!(grid.ticks_per_step(), 7200);
        assert_eq!(grid.total_ticks(), 7200 * 48);
        assert_eq!(grid.hour_of_day(25), 1);
    }

    #[test]
    fn test_sub_hourly_environment_step() {
        let grid = TimeGrid::new(1.0, 900.0, 8).unwrap();
        assert_eq!(grid.ticks_per_step(), 900);
        assert_eq!(grid.hour_of_day(3), 0);
        assert_eq!(grid.hour_of_day(4), 1);
    }

    #[test]
    fn test_presets_are_valid() {
        for config in [ScenarioConfig::standard(), ScenarioConfig::hepa()] {
            config.validate().unwrap();
            let mut copy = config.clone();
            assert_eq!(copy.sanitize(), 0);
            assert_eq!(copy, config);
        }
        let hepa = ScenarioConfig::hepa();
        assert!(hepa.particle_bins()[0].filter_efficiency > 0.999);
        assert!(ScenarioConfig::standard().particle_bins()[0].filter_efficiency < 0.9);
    }

    #[test]
    fn test_sanitize_clamps_and_counts() {
        let mut config = ScenarioConfig::standard();
        config.house.volume_m3 = -5.0;
        config.resistance.leakage_exponent = 2.0;
        config.controller.kp = f64::NAN;
        config.economics.on_peak_rate = -0.3;
        config.bins[0].filter_efficiency = Some(1.5);
        config.exhaust_events[0].flow_cfm = -10.0;
        assert_eq!(config.sanitize(), 6);
        assert_eq!(config.house.volume_m3, 400.0);
        assert_eq!(config.resistance.leakage_exponent, 1.0);
        assert_eq!(config.controller.kp, 0.01);
        assert_eq!(config.economics.on_peak_rate, 0.30);
        assert_eq!(config.bins[0].filter_efficiency, Some(1.0));
        assert_eq!(config.exhaust_events[0].flow_cfm, 0.0);
    }

    #[test]
    fn test_structural_errors() {
        let mut config = ScenarioConfig::standard();
        config.fan_curve = vec![FanPoint::new(0.0, 200.0)];
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfig {
                component: "fan curve",
                ..
            })
        ));

        let mut config = ScenarioConfig::standard();
        config.bins.clear();
        assert_eq!(config.validate().unwrap_err().component(), "particle bins");

        let mut config = ScenarioConfig::standard();
        config.time_grid.control_step_secs = 7.0;
        assert_eq!(config.validate().unwrap_err().component(), "time grid");
    }

    #[test]
    fn test_json_round_trip_with_partial_input() {
        let json = r#"{
            "name": "tight house",
            "time_grid": { "hours": 48 },
            "house": { "volume_m3": 300.0 },
            "bins": [ { "diameter_um": 1.0, "filter_efficiency": 0.8 } ],
            "features": { "damper": true }
        }"#;
        let config = ScenarioConfig::from_json_str(json).unwrap();
        assert_eq!(config.name, "tight house");
        assert_eq!(config.time_grid.hours, 48);
        assert_eq!(config.time_grid.control_step_secs, 1.0);
        assert_eq!(config.house.volume_m3, 300.0);
        assert_eq!(config.house.pressure_limit_pa, 30.0);
        assert_eq!(config.bins.len(), 1);
        assert!(config.features.damper);
        assert!(config.features.stack_effect);

        let back = ScenarioConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);

        assert!(matches!(
            ScenarioConfig::from_json_str("{ not json"),
            Err(SimError::Parse(_))
        ));
    }
}
