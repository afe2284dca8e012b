//! PI house-pressure controller.
//!
//! ```text
//! e        = P_target − P
//! I        = clamp(I + e·Δt, ±I_max)
//! raw      = bias + kp·e + ki·I
//! drive   += damping · (raw − drive)
//! drive    = clamp(drive, min, max)
//! ```
//!
//! Warm-up holds the drive at `warmup_drive` with the integral frozen until
//! `warmup_secs` have passed and the pressure has settled under that drive
//! (or `max_warmup_secs` runs out). Control then engages bumplessly: the
//! integral is seeded so the first PI output equals the held drive.

use serde::{Deserialize, Serialize};

use crate::physics::units::finite_or;
use crate::sim::state::SimulationState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Pressure setpoint (Pa)
    pub target_pressure_pa: f64,
    pub kp: f64,
    pub ki: f64,
    /// Bound on the accumulated error (Pa·s)
    pub integral_limit: f64,
    /// Fraction of the step toward the new output taken each tick (0–1]
    pub damping: f64,
    /// Feed-forward drive
    pub bias: f64,
    pub min_drive: f64,
    pub max_drive: f64,
    /// Shortest warm-up hold (s); zero disables warm-up
    pub warmup_secs: f64,
    /// Soft-start drive held during warm-up
    pub warmup_drive: f64,
    /// Pressure drift (Pa/s) below which the held operating point counts as settled
    pub settle_tolerance_pa: f64,
    /// Warm-up ends here even if the pressure is still moving (s)
    pub max_warmup_secs: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_pressure_pa: 1.0,
            kp: 0.01,
            ki: 0.002,
            integral_limit: 100.0,
            damping: 0.2,
            bias: 0.0,
            min_drive: 0.0,
            max_drive: 1.0,
            warmup_secs: 5.0,
            warmup_drive: 0.1,
            settle_tolerance_pa: 0.01,
            max_warmup_secs: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PressureController {
    config: ControllerConfig,
}

impl PressureController {
    pub fn new(config: ControllerConfig) -> Self {
        let (min_drive, max_drive) = if config.min_drive <= config.max_drive {
            (config.min_drive, config.max_drive)
        } else {
            (config.max_drive, config.min_drive)
        };
        Self {
            config: ControllerConfig {
                integral_limit: config.integral_limit.abs(),
                damping: config.damping.clamp(f64::EPSILON, 1.0),
                min_drive,
                max_drive,
                settle_tolerance_pa: finite_or(config.settle_tolerance_pa, 0.0).abs(),
                max_warmup_secs: finite_or(config.max_warmup_secs, 0.0).max(config.warmup_secs),
                ..config
            },
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn target(&self) -> f64 {
        self.config.target_pressure_pa
    }

    pub fn in_warmup(&self, state: &SimulationState) -> bool {
        !state.controller_engaged
    }

    /// Drive before the first control tick.
    pub fn initial_drive(&self) -> f64 {
        if self.config.warmup_secs > 0.0 {
            self.config
                .warmup_drive
                .clamp(self.config.min_drive, self.config.max_drive)
        } else {
            self.config.min_drive
        }
    }

    /// Updates `state.drive` from `state.pressure_pa` and returns it.
    pub fn update(&self, state: &mut SimulationState, dt: f64) -> f64 {
        let c = &self.config;
        let dt = finite_or(dt, 0.0).max(0.0);
        let error = if state.pressure_pa.is_finite() {
            c.target_pressure_pa - state.pressure_pa
        } else {
            0.0
        };

        let elapsed = state.controller_elapsed_secs;
        state.controller_elapsed_secs += dt;
        if !state.controller_engaged {
            if c.warmup_secs > 0.0 {
                let settled = state
                    .warmup_reference_pa
                    .is_some_and(|p| (state.pressure_pa - p).abs() <= c.settle_tolerance_pa * dt);
                state.warmup_reference_pa = Some(state.pressure_pa);
                if (elapsed < c.warmup_secs || !settled) && elapsed < c.max_warmup_secs {
                    state.drive = self.initial_drive();
                    return state.drive;
                }
                self.seed_integral(state, error);
            }
            state.controller_engaged = true;
        }

        state.controller_integral =
            (state.controller_integral + error * dt).clamp(-c.integral_limit, c.integral_limit);

        let raw = c.bias + c.kp * error + c.ki * state.controller_integral;
        let previous = finite_or(state.drive, c.min_drive);
        let next = previous + c.damping * (raw - previous);
        state.drive = finite_or(next, previous).clamp(c.min_drive, c.max_drive);
        state.drive
    }

    /// Integral that makes the PI output equal the held drive at `error`.
    fn seed_integral(&self, state: &mut SimulationState, error: f64) {
        let c = &self.config;
        let seed = (state.drive - c.bias - c.kp * error) / c.ki;
        if seed.is_finite() {
            state.controller_integral = seed.clamp(-c.integral_limit, c.integral_limit);
        }
    }
}
