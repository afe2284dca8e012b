//! Motorised supply damper.
//!
//! The actuator is a constant-speed motor with no position feedback: the
//! angle is dead-reckoned from run time. Open-loop drift is bounded by
//! re-homing (driving fully closed for longer than a full stroke) after a
//! fixed number of adjustments.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Smallest opening fraction used for the duct-loss multiplier.
pub const MIN_OPEN_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamperConfig {
    /// Fully open angle (degrees); 0 is closed
    pub max_angle_deg: f64,
    /// Time to sweep from closed to fully open (s)
    pub full_travel_secs: f64,
    /// Time spent driving closed when re-homing (s)
    pub reset_secs: f64,
    /// Completed adjustments before a re-home
    pub rehome_after: u32,
    /// Angle at the start of the run
    pub initial_angle_deg: f64,
}

impl Default for DamperConfig {
    fn default() -> Self {
        Self {
            max_angle_deg: 90.0,
            full_travel_secs: 55.0,
            reset_secs: 57.0,
            rehome_after: 20,
            initial_angle_deg: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamperMotion {
    Idle,
    Moving,
    /// Driving closed to re-establish the zero reference.
    Rehoming,
}

/// Dead-reckoned damper position.
#[derive(Debug, Clone, PartialEq)]
pub struct DamperActuator {
    config: DamperConfig,
    angle: f64,
    target: f64,
    motion: DamperMotion,
    adjustments: u32,
    rehome_remaining: f64,
    rehomes: u32,
}

impl DamperActuator {
    pub fn new(config: DamperConfig) -> Self {
        let max = if config.max_angle_deg.is_finite() && config.max_angle_deg > 0.0 {
            config.max_angle_deg
        } else {
            90.0
        };
        let angle = if config.initial_angle_deg.is_finite() {
            config.initial_angle_deg.clamp(0.0, max)
        } else {
            0.0
        };
        Self {
            config: DamperConfig {
                max_angle_deg: max,
                ..config
            },
            angle,
            target: angle,
            motion: DamperMotion::Idle,
            adjustments: 0,
            rehome_remaining: 0.0,
            rehomes: 0,
        }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn motion(&self) -> DamperMotion {
        self.motion
    }

    pub fn adjustments(&self) -> u32 {
        self.adjustments
    }

    /// Number of re-homing cycles started so far.
    pub fn rehomes(&self) -> u32 {
        self.rehomes
    }

    /// Opening fraction in [0, 1].
    pub fn open_fraction(&self) -> f64 {
        (self.angle / self.config.max_angle_deg).clamp(0.0, 1.0)
    }

    /// Duct-loss multiplier `1/max(f, 0.05)²`; 1 when fully open.
    pub fn duct_multiplier(&self) -> f64 {
        let f = self.open_fraction().max(MIN_OPEN_FRACTION);
        1.0 / (f * f)
    }

    /// Commands a new target angle. Out-of-range commands are clamped.
    pub fn command(&mut self, angle_deg: f64) {
        let max = self.config.max_angle_deg;
        let target = if !angle_deg.is_finite() {
            warn!("Damper command {} is not a number, holding {}°", angle_deg, self.target);
            self.target
        } else if !(0.0..=max).contains(&angle_deg) {
            let clamped = angle_deg.clamp(0.0, max);
            warn!("Damper command {}° outside [0, {}]°, using {}°", angle_deg, max, clamped);
            clamped
        } else {
            angle_deg
        };

        if target == self.target {
            return;
        }
        self.target = target;
        if self.motion != DamperMotion::Rehoming {
            self.motion = if target == self.angle {
                DamperMotion::Idle
            } else {
                DamperMotion::Moving
            };
        }
    }

    /// Advances the motor by `dt` seconds. Returns `true` when a re-home
    /// started during this step.
    pub fn advance(&mut self, dt: f64) -> bool {
        if !(dt.is_finite() && dt > 0.0) {
            return false;
        }
        match self.motion {
            DamperMotion::Idle => false,
            DamperMotion::Moving => self.advance_move(dt),
            DamperMotion::Rehoming => {
                let close_rate = self.config.max_angle_deg / self.config.reset_secs.max(f64::EPSILON);
                self.angle = (self.angle - close_rate * dt).max(0.0);
                self.rehome_remaining -= dt;
                if self.rehome_remaining <= 0.0 {
                    self.angle = 0.0;
                    self.adjustments = 0;
                    self.rehome_remaining = 0.0;
                    self.motion = if self.target > 0.0 {
                        DamperMotion::Moving
                    } else {
                        DamperMotion::Idle
                    };
                    debug!("Damper re-homed, resuming toward {}°", self.target);
                }
                false
            }
        }
    }

    fn advance_move(&mut self, dt: f64) -> bool {
        let rate = self.config.max_angle_deg / self.config.full_travel_secs.max(f64::EPSILON);
        let delta = self.target - self.angle;
        let travel = rate * dt;
        if delta.abs() > travel {
            self.angle += travel.copysign(delta);
            return false;
        }

        self.angle = self.target;
        self.adjustments += 1;
        if self.adjustments >= self.config.rehome_after.max(1) {
            self.motion = DamperMotion::Rehoming;
            self.rehome_remaining = self.config.reset_secs.max(0.0);
            self.rehomes += 1;
            true
        } else {
            self.motion = DamperMotion::Idle;
            false
        }
    }
}
