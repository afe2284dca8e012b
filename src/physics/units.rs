//! Unit conversions and physical constants shared by the physics models.
//!
//! Airflow is carried in CFM at the fan/duct boundary (that is how blower curves
//! and blower-door leakage coefficients are published) and in m³/s inside the
//! mass balances.

/// Cubic metres per second in one cubic foot per minute.
pub const M3S_PER_CFM: f64 = 4.719_474_432e-4;

/// Dynamic viscosity of air at ~20 °C (Pa·s).
pub const AIR_VISCOSITY: f64 = 1.81e-5;

/// Air density (kg/m³).
pub const AIR_DENSITY: f64 = 1.2;

/// Specific heat capacity of air (J/kg·K).
pub const AIR_CP: f64 = 1005.0;

/// Standard atmospheric pressure (Pa).
pub const ATMOSPHERIC_PRESSURE: f64 = 101_325.0;

/// Ratio of specific heats for air.
pub const AIR_GAMMA: f64 = 1.4;

/// Joules per kilowatt-hour.
pub const J_PER_KWH: f64 = 3.6e6;

/// Kilowatt-hours per therm of natural gas.
pub const KWH_PER_THERM: f64 = 29.3071;

/// Convert CFM to m³/s.
pub fn cfm_to_m3s(cfm: f64) -> f64 {
    cfm * M3S_PER_CFM
}

/// Convert m³/s to CFM.
pub fn m3s_to_cfm(m3s: f64) -> f64 {
    m3s / M3S_PER_CFM
}

/// Convert °C to K.
pub fn celsius_to_kelvin(t: f64) -> f64 {
    t + 273.15
}

/// Replace a non-finite value by `fallback`.
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
