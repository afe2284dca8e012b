//! Blower pressure-delivery curve.
//!
//! The curve is sampled at full drive and scaled linearly by the drive
//! fraction, so a blower at half drive delivers half the static pressure at
//! every flow.

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::physics::units::finite_or;

/// One (flow, pressure) sample of a blower curve at full drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanPoint {
    /// Volumetric flow (CFM)
    pub flow_cfm: f64,
    /// Static pressure delivered (Pa)
    pub pressure_pa: f64,
}

impl FanPoint {
    pub const fn new(flow_cfm: f64, pressure_pa: f64) -> Self {
        Self {
            flow_cfm,
            pressure_pa,
        }
    }
}

/// Typical residential PSC blower curve.
pub const DEFAULT_FAN_CURVE: [FanPoint; 6] = [
    FanPoint::new(0.0, 250.0),
    FanPoint::new(400.0, 235.0),
    FanPoint::new(800.0, 200.0),
    FanPoint::new(1200.0, 145.0),
    FanPoint::new(1600.0, 70.0),
    FanPoint::new(1800.0, 0.0),
];

/// Monotone, sorted blower curve.
#[derive(Debug, Clone, PartialEq)]
pub struct FanCurve {
    points: Vec<FanPoint>,
}

impl FanCurve {
    /// Builds a curve from raw samples.
    ///
    /// Samples are sorted by flow, duplicate flows collapse to the first
    /// sample, and any pressure that rises with flow is pulled down to the
    /// running minimum so the curve is non-increasing.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if fewer than two distinct finite
    /// samples remain.
    pub fn new(samples: &[FanPoint]) -> Result<Self, SimError> {
        let mut points: Vec<FanPoint> = samples
            .iter()
            .copied()
            .filter(|p| p.flow_cfm.is_finite() && p.pressure_pa.is_finite())
            .map(|p| FanPoint::new(p.flow_cfm.max(0.0), p.pressure_pa.max(0.0)))
            .collect();
        points.sort_by(|a, b| a.flow_cfm.total_cmp(&b.flow_cfm));
        points.dedup_by(|later, earlier| later.flow_cfm == earlier.flow_cfm);

        if points.len() < 2 {
            return Err(SimError::InvalidConfig {
                component: "fan curve",
                detail: format!(
                    "need at least two distinct finite samples, got {}",
                    points.len()
                ),
            });
        }

        let mut running_min = f64::INFINITY;
        let mut corrected = 0usize;
        for p in &mut points {
            if p.pressure_pa > running_min {
                p.pressure_pa = running_min;
                corrected += 1;
            }
            running_min = running_min.min(p.pressure_pa);
        }
        if corrected > 0 {
            log::warn!(
                "fan curve: {} sample(s) rose with flow and were flattened",
                corrected
            );
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[FanPoint] {
        &self.points
    }

    /// Largest sampled flow (CFM); upper bound of the operating-point search.
    pub fn max_flow(&self) -> f64 {
        self.points[self.points.len() - 1].flow_cfm
    }

    /// Shut-off pressure at zero flow and full drive (Pa).
    pub fn shutoff_pressure(&self) -> f64 {
        self.full_drive_pressure(0.0)
    }

    fn full_drive_pressure(&self, flow_cfm: f64) -> f64 {
        let pts = &self.points;
        let last = pts.len() - 1;
        // Segment index: end segments double as extrapolation segments.
        let i = if flow_cfm <= pts[0].flow_cfm {
            0
        } else if flow_cfm >= pts[last].flow_cfm {
            last - 1
        } else {
            pts.partition_point(|p| p.flow_cfm <= flow_cfm) - 1
        };
        let (a, b) = (pts[i], pts[i + 1]);
        let slope = (b.pressure_pa - a.pressure_pa) / (b.flow_cfm - a.flow_cfm);
        finite_or(a.pressure_pa + slope * (flow_cfm - a.flow_cfm), 0.0).max(0.0)
    }

    /// Pressure delivered at `flow_cfm` and drive fraction `drive` (Pa).
    ///
    /// Exactly zero at zero drive; finite and non-negative everywhere.
    pub fn pressure_at(&self, flow_cfm: f64, drive: f64) -> f64 {
        if !drive.is_finite() || drive <= 0.0 {
            return 0.0;
        }
        let q = finite_or(flow_cfm, 0.0).max(0.0);
        self.full_drive_pressure(q) * drive.min(1.0)
    }
}

impl Default for FanCurve {
    fn default() -> Self {
        Self {
            points: DEFAULT_FAN_CURVE.to_vec(),
        }
    }
}
