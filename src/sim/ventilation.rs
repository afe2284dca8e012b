//! Uncontrolled air movement: buoyancy-driven stack flow and scheduled exhaust
//! fans (kitchen hood, bath fans, dryer).

use serde::{Deserialize, Serialize};

use crate::physics::units::{celsius_to_kelvin, finite_or};
use crate::sim::schedule::DailySchedule;

/// Stack-effect coefficient (Pa·K/m): `g·P_atm/R_air`.
pub const STACK_COEFFICIENT: f64 = 3463.0;

/// Buoyancy-driven flow through the envelope.
///
/// `ΔP_stack = 3463·h·(1/T_out − 1/T_in)` with temperatures in kelvin. A share
/// `flow_fraction` of the envelope leakage area is assumed to see the full
/// stack pressure, so `Q_stack = sign(ΔP)·fraction·C·|ΔP|^n` (CFM, positive
/// into the house).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackEffect {
    /// Height of the neutral-plane column (m)
    pub height_m: f64,
    /// Fraction of the envelope leakage exposed to the stack pressure
    pub flow_fraction: f64,
}

impl Default for StackEffect {
    fn default() -> Self {
        Self {
            height_m: 3.0,
            flow_fraction: 0.05,
        }
    }
}

impl StackEffect {
    pub fn new(height_m: f64, flow_fraction: f64) -> Self {
        Self {
            height_m,
            flow_fraction,
        }
    }

    /// Stack pressure (Pa). Positive when the house is warmer than outside.
    pub fn pressure(&self, indoor_temp_c: f64, outdoor_temp_c: f64) -> f64 {
        let t_in = celsius_to_kelvin(indoor_temp_c);
        let t_out = celsius_to_kelvin(outdoor_temp_c);
        if !(t_in > 0.0 && t_out > 0.0) || !self.height_m.is_finite() {
            return 0.0;
        }
        finite_or(STACK_COEFFICIENT * self.height_m.max(0.0) * (1.0 / t_out - 1.0 / t_in), 0.0)
    }

    /// Stack flow (CFM) for an envelope with leakage `C·ΔP^n`.
    pub fn flow(
        &self,
        indoor_temp_c: f64,
        outdoor_temp_c: f64,
        leakage_coefficient: f64,
        leakage_exponent: f64,
    ) -> f64 {
        let dp = self.pressure(indoor_temp_c, outdoor_temp_c);
        let fraction = finite_or(self.flow_fraction, 0.0).clamp(0.0, 1.0);
        let q = fraction * leakage_coefficient.max(0.0) * dp.abs().powf(leakage_exponent);
        if q.is_finite() {
            q.copysign(dp)
        } else {
            0.0
        }
    }
}

/// A named exhaust fan running over `[start_hour, end_hour)` every day.
///
/// `start_hour > end_hour` wraps midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustEvent {
    pub name: String,
    pub start_hour: usize,
    pub end_hour: usize,
    /// Extracted flow (CFM)
    pub flow_cfm: f64,
}

impl ExhaustEvent {
    pub fn new(name: impl Into<String>, start_hour: usize, end_hour: usize, flow_cfm: f64) -> Self {
        Self {
            name: name.into(),
            start_hour,
            end_hour,
            flow_cfm,
        }
    }
}

/// Hourly exhaust flow from a set of overlapping events.
#[derive(Debug, Clone, PartialEq)]
pub struct ExhaustSchedule {
    events: Vec<ExhaustEvent>,
    schedule: DailySchedule,
}

impl ExhaustSchedule {
    /// Sums the events into one daily profile. Non-finite or negative flows
    /// contribute nothing.
    pub fn new(events: Vec<ExhaustEvent>) -> Self {
        let mut schedule = DailySchedule::new("exhaust");
        for event in &events {
            if event.flow_cfm.is_finite() && event.flow_cfm > 0.0 {
                schedule.add_range(event.start_hour, event.end_hour, event.flow_cfm);
            }
        }
        Self { events, schedule }
    }

    /// No exhaust at any hour.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Kitchen hood at dinner time and a morning bath fan.
    pub fn typical() -> Self {
        Self::new(vec![
            ExhaustEvent::new("bath fan", 7, 8, 50.0),
            ExhaustEvent::new("kitchen hood", 17, 19, 100.0),
        ])
    }

    pub fn events(&self) -> &[ExhaustEvent] {
        &self.events
    }

    /// Total exhaust flow (CFM) at `hour_of_day`.
    pub fn flow_at(&self, hour_of_day: usize) -> f64 {
        self.schedule.value(hour_of_day)
    }

    /// Names of the events running at `hour_of_day`.
    pub fn active(&self, hour_of_day: usize) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.flow_cfm.is_finite() && e.flow_cfm > 0.0)
            .filter(|e| {
                DailySchedule::hours_in_range(e.start_hour, e.end_hour).contains(&(hour_of_day % 24))
            })
            .map(|e| e.name.as_str())
            .collect()
    }
}

impl Default for ExhaustSchedule {
    fn default() -> Self {
        Self::none()
    }
}
