//! Operating cost: blower electricity, supply-air conditioning and filters.
//!
//! Energy is gathered per tick into the state's [`EnergyTally`] and priced
//! when the hour closes, so the time-of-use rate is looked up once per hour.
//!
//! [`EnergyTally`]: crate::sim::state::EnergyTally

use log::warn;
use serde::{Deserialize, Serialize};

use crate::physics::units::{cfm_to_m3s, AIR_CP, AIR_DENSITY, J_PER_KWH, KWH_PER_THERM};
use crate::sim::schedule::DailySchedule;
use crate::sim::state::SimulationState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicParameters {
    /// Electricity rate inside the on-peak window ($/kWh)
    pub on_peak_rate: f64,
    /// Electricity rate outside the on-peak window ($/kWh)
    pub off_peak_rate: f64,
    /// First on-peak hour of the day
    pub on_peak_start_hour: usize,
    /// First off-peak hour after the window; may be earlier than the start
    pub on_peak_end_hour: usize,
    /// Furnace efficiency (0–1)
    pub gas_efficiency: f64,
    /// Gas price ($/therm)
    pub gas_price_per_therm: f64,
    pub cooling_cop: f64,
    /// Price of one replacement filter ($)
    pub filter_replacement_cost: f64,
    /// Blower wire-to-air efficiency (0–1)
    pub blower_efficiency: f64,
    /// Supply air is heated when outdoors is colder than this (°C)
    pub heating_setpoint_c: f64,
    /// Supply air is cooled when outdoors is warmer than this (°C)
    pub cooling_setpoint_c: f64,
}

impl Default for EconomicParameters {
    fn default() -> Self {
        Self {
            on_peak_rate: 0.30,
            off_peak_rate: 0.12,
            on_peak_start_hour: 12,
            on_peak_end_hour: 20,
            gas_efficiency: 0.92,
            gas_price_per_therm: 1.20,
            cooling_cop: 3.0,
            filter_replacement_cost: 15.0,
            blower_efficiency: 0.3,
            heating_setpoint_c: 18.0,
            cooling_setpoint_c: 24.0,
        }
    }
}

/// How outdoor supply air is conditioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditioningMode {
    Heating,
    Cooling,
    Off,
}

/// Cost of one closed hour, by component ($).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourCost {
    pub blower: f64,
    pub heating: f64,
    pub cooling: f64,
    pub filters: f64,
}

impl HourCost {
    pub fn total(&self) -> f64 {
        self.blower + self.heating + self.cooling + self.filters
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostAccumulator {
    params: EconomicParameters,
    on_peak: DailySchedule,
}

/// Replaces NaN/negative amounts with zero.
fn sanitize(component: &str, amount: f64) -> f64 {
    if amount.is_finite() && amount >= 0.0 {
        amount
    } else {
        warn!("Discarding invalid {} {}", component, amount);
        0.0
    }
}

impl CostAccumulator {
    pub fn new(params: EconomicParameters) -> Self {
        let mut on_peak = DailySchedule::new("on-peak");
        on_peak.fill_range(params.on_peak_start_hour, params.on_peak_end_hour, 1.0);
        Self { params, on_peak }
    }

    pub fn params(&self) -> &EconomicParameters {
        &self.params
    }

    pub fn is_on_peak(&self, hour_of_day: usize) -> bool {
        self.on_peak.value(hour_of_day) > 0.0
    }

    /// Electricity rate ($/kWh) at `hour_of_day`.
    pub fn electricity_rate(&self, hour_of_day: usize) -> f64 {
        if self.is_on_peak(hour_of_day) {
            self.params.on_peak_rate
        } else {
            self.params.off_peak_rate
        }
    }

    /// Gas price per delivered kWh of heat.
    pub fn gas_rate_per_kwh(&self) -> f64 {
        self.params.gas_price_per_therm / KWH_PER_THERM / self.params.gas_efficiency
    }

    pub fn conditioning_mode(&self, outdoor_temp_c: f64) -> ConditioningMode {
        if outdoor_temp_c < self.params.heating_setpoint_c {
            ConditioningMode::Heating
        } else if outdoor_temp_c > self.params.cooling_setpoint_c {
            ConditioningMode::Cooling
        } else {
            ConditioningMode::Off
        }
    }

    /// Blower electrical power (W) at an operating point.
    pub fn blower_power(&self, flow_cfm: f64, pressure_pa: f64) -> f64 {
        cfm_to_m3s(flow_cfm.max(0.0)) * pressure_pa.max(0.0) / self.params.blower_efficiency
    }

    /// Adds one tick of blower and conditioning energy to the hourly tally.
    pub fn add_tick(
        &self,
        state: &mut SimulationState,
        flow_cfm: f64,
        pressure_pa: f64,
        indoor_temp_c: f64,
        outdoor_temp_c: f64,
        dt: f64,
    ) {
        let blower_j = sanitize("blower energy", self.blower_power(flow_cfm, pressure_pa) * dt);
        state.energy.blower_j += blower_j;

        let thermal_j = sanitize(
            "conditioning energy",
            AIR_DENSITY * AIR_CP * cfm_to_m3s(flow_cfm.max(0.0)) * (indoor_temp_c - outdoor_temp_c).abs() * dt,
        );
        match self.conditioning_mode(outdoor_temp_c) {
            ConditioningMode::Heating => state.energy.heating_j += thermal_j,
            ConditioningMode::Cooling => state.energy.cooling_j += thermal_j,
            ConditioningMode::Off => {}
        }
    }

    /// Schedules a filter charge for the current hour.
    pub fn charge_filter(&self, state: &mut SimulationState) {
        state.energy.filter_changes += 1;
    }

    /// Prices the tally at `hour_of_day`, adds it to the running total and
    /// clears the tally.
    pub fn close_hour(&self, state: &mut SimulationState, hour_of_day: usize) -> HourCost {
        let rate = self.electricity_rate(hour_of_day);
        let tally = state.energy;

        let cost = HourCost {
            blower: sanitize("blower cost", tally.blower_j / J_PER_KWH * rate),
            heating: sanitize("heating cost", tally.heating_j / J_PER_KWH * self.gas_rate_per_kwh()),
            cooling: sanitize(
                "cooling cost",
                tally.cooling_j / J_PER_KWH / self.params.cooling_cop * rate,
            ),
            filters: sanitize(
                "filter cost",
                tally.filter_changes as f64 * self.params.filter_replacement_cost,
            ),
        };

        state.cumulative_cost += cost.total();
        state.energy.clear();
        cost
    }
}
