//! Discrete blower drive.
//!
//! Triac/PWM blower boards expose a handful of power levels rather than a
//! continuous drive: level `1..=levels` maps linearly onto
//! `[min_duty, max_duty]` and level 0 is off. When the discrete-drive feature
//! is on, the controller keeps its continuous drive and the fan sees the
//! nearest achievable duty.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveScale {
    /// Number of selectable power levels
    pub levels: usize,
    /// Duty at level 1 (fraction of full drive)
    pub min_duty: f64,
    /// Duty at the top level
    pub max_duty: f64,
}

impl Default for DriveScale {
    fn default() -> Self {
        Self {
            levels: 10,
            min_duty: 0.5,
            max_duty: 1.0,
        }
    }
}

impl DriveScale {
    pub fn new(levels: usize, min_duty: f64, max_duty: f64) -> Self {
        let max_duty = if max_duty.is_finite() {
            max_duty.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let min_duty = if min_duty.is_finite() {
            min_duty.clamp(0.0, max_duty)
        } else {
            max_duty
        };
        Self {
            levels: levels.max(1),
            min_duty,
            max_duty,
        }
    }

    /// Duty fraction at `level`. Level 0 is off; levels past the top saturate.
    pub fn duty_for_level(&self, level: usize) -> f64 {
        let levels = self.levels.max(1);
        match level {
            0 => 0.0,
            l if l >= levels => self.max_duty,
            l => {
                let step = (self.max_duty - self.min_duty) / (levels - 1) as f64;
                self.min_duty + (l - 1) as f64 * step
            }
        }
    }

    /// Nearest level for a continuous drive fraction.
    ///
    /// Anything below half of `min_duty` is off; anything between that and
    /// `min_duty` runs at level 1.
    pub fn level_for(&self, fraction: f64) -> usize {
        let levels = self.levels.max(1);
        if !fraction.is_finite() || fraction < 0.5 * self.min_duty || fraction <= 0.0 {
            return 0;
        }
        if fraction <= self.min_duty || levels == 1 {
            return 1;
        }
        let span = self.max_duty - self.min_duty;
        if span <= 0.0 {
            return levels;
        }
        let position = (fraction - self.min_duty) / span * (levels - 1) as f64;
        (position.round() as usize + 1).min(levels)
    }

    /// Snaps a continuous drive to the nearest achievable duty.
    pub fn quantize(&self, fraction: f64) -> f64 {
        self.duty_for_level(self.level_for(fraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_table() {
        let scale = DriveScale::default();
        assert_eq!(scale.duty_for_level(0), 0.0);
        assert_relative_eq!(scale.duty_for_level(1), 0.5);
        assert_relative_eq!(scale.duty_for_level(10), 1.0);
        assert_relative_eq!(scale.duty_for_level(4), 0.5 + 3.0 * 0.5 / 9.0);
        assert_relative_eq!(scale.duty_for_level(42), 1.0);
    }

    #[test]
    fn test_quantize() {
        let scale = DriveScale::default();
        assert_eq!(scale.quantize(0.0), 0.0);
        assert_eq!(scale.quantize(0.2), 0.0);
        assert_relative_eq!(scale.quantize(0.3), 0.5);
        assert_relative_eq!(scale.quantize(1.0), 1.0);
        assert_relative_eq!(scale.quantize(1.5), 1.0);
        assert_eq!(scale.quantize(f64::NAN), 0.0);

        // Every quantised duty is one of the table entries.
        for i in 0..=100 {
            let duty = scale.quantize(i as f64 / 100.0);
            assert!((0..=10).any(|l| (scale.duty_for_level(l) - duty).abs() < 1e-12));
        }
    }

    #[test]
    fn test_quantize_is_monotone() {
        let scale = DriveScale::new(5, 0.3, 0.9);
        let mut last = 0.0;
        for i in 0..=200 {
            let duty = scale.quantize(i as f64 / 200.0);
            assert!(duty >= last);
            last = duty;
        }
    }
}
