//! Blower operating-point solver.
//!
//! The operating point is the positive root of
//!
//! ```text
//! g(Q) = FanPressure(Q, drive) − SystemResistance(Q, dust, damper)
//! ```
//!
//! `g` is non-increasing in `Q` (the fan curve falls, every resistance term
//! rises), so a root is unique when it exists. The search is confined to
//! `[0, fan.max_flow()]`, bracketed around the previous tick's solution and
//! refined with Brent's method under a hard iteration cap.

use crate::physics::fan::FanCurve;
use crate::physics::resistance::{ResistanceConditions, ResistanceModel};

/// How an operating point was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Brent's method converged inside the bracket.
    Converged,
    /// Drive at or near zero: flow is zero by definition.
    ShortCircuit,
    /// No crossing inside the domain (or a non-finite objective); flow forced to zero.
    NoRoot,
}

/// Resolved operating point for one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSolution {
    /// Operating flow (CFM)
    pub flow_cfm: f64,
    /// Static pressure at the operating point (Pa)
    pub pressure_pa: f64,
    /// Objective evaluations spent
    pub iterations: usize,
    pub status: SolveStatus,
}

impl FlowSolution {
    fn zero(status: SolveStatus, iterations: usize) -> Self {
        Self {
            flow_cfm: 0.0,
            pressure_pa: 0.0,
            iterations,
            status,
        }
    }

    /// True when the tick fell back to zero flow.
    pub fn is_degraded(&self) -> bool {
        self.status == SolveStatus::NoRoot
    }
}

/// Root-finder configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowBalanceSolver {
    /// Brent iteration cap
    pub max_iterations: usize,
    /// Flow tolerance (CFM)
    pub tolerance: f64,
    /// Drives below this short-circuit to zero flow
    pub min_drive: f64,
    /// Initial bracket half-width as a fraction of the domain
    pub seed_window: f64,
    /// Bracket expansions before giving up
    pub max_expansions: usize,
}

impl Default for FlowBalanceSolver {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-7,
            min_drive: 1e-6,
            seed_window: 0.05,
            max_expansions: 12,
        }
    }
}

/// The scalar objective `g(Q)`.
pub fn objective(
    fan: &FanCurve,
    resistance: &ResistanceModel,
    drive: f64,
    conditions: &ResistanceConditions,
    flow_cfm: f64,
) -> f64 {
    fan.pressure_at(flow_cfm, drive) - resistance.total(flow_cfm, conditions)
}

impl FlowBalanceSolver {
    /// Finds the operating flow for `drive`, starting near `seed_cfm`.
    pub fn solve(
        &self,
        fan: &FanCurve,
        resistance: &ResistanceModel,
        drive: f64,
        conditions: &ResistanceConditions,
        seed_cfm: f64,
    ) -> FlowSolution {
        if !drive.is_finite() || drive < self.min_drive {
            return FlowSolution::zero(SolveStatus::ShortCircuit, 0);
        }

        let q_max = fan.max_flow();
        let mut evaluations = 0usize;
        let mut g = |q: f64| {
            evaluations += 1;
            objective(fan, resistance, drive, conditions, q)
        };

        let Some((lo, glo, hi, ghi)) = self.bracket(&mut g, seed_cfm, q_max) else {
            drop(g);
            return FlowSolution::zero(SolveStatus::NoRoot, evaluations);
        };

        let root = if glo == 0.0 {
            Some(lo)
        } else if ghi == 0.0 {
            Some(hi)
        } else {
            self.brent(&mut g, lo, glo, hi, ghi)
        };
        drop(g);

        match root {
            Some(q) if q.is_finite() && q >= 0.0 => FlowSolution {
                flow_cfm: q,
                pressure_pa: resistance.total(q, conditions),
                iterations: evaluations,
                status: SolveStatus::Converged,
            },
            _ => FlowSolution::zero(SolveStatus::NoRoot, evaluations),
        }
    }

    /// Expands a window around the seed until `g` changes sign.
    ///
    /// Returns `(lo, g(lo), hi, g(hi))` with `g(lo) >= 0 >= g(hi)`.
    fn bracket<G>(&self, g: &mut G, seed_cfm: f64, q_max: f64) -> Option<(f64, f64, f64, f64)>
    where
        G: FnMut(f64) -> f64,
    {
        let seed = if seed_cfm.is_finite() {
            seed_cfm.clamp(0.0, q_max)
        } else {
            0.0
        };
        let mut width = (self.seed_window * q_max).max(self.tolerance);
        let mut lo = (seed - width).max(0.0);
        let mut hi = (seed + width).min(q_max);
        let mut glo = g(lo);
        let mut ghi = g(hi);

        for _ in 0..=self.max_expansions {
            if !glo.is_finite() || !ghi.is_finite() {
                return None;
            }
            if glo >= 0.0 && ghi <= 0.0 {
                return Some((lo, glo, hi, ghi));
            }
            width *= 2.0;
            if glo > 0.0 && ghi > 0.0 {
                // Root lies above the window.
                if hi >= q_max {
                    return None;
                }
                lo = hi;
                glo = ghi;
                hi = (hi + width).min(q_max);
                ghi = g(hi);
            } else {
                // Root lies below the window.
                if lo <= 0.0 {
                    return None;
                }
                hi = lo;
                ghi = glo;
                lo = (lo - width).max(0.0);
                glo = g(lo);
            }
        }
        None
    }

    /// Brent's method on a valid bracket.
    fn brent<G>(&self, g: &mut G, lo: f64, glo: f64, hi: f64, ghi: f64) -> Option<f64>
    where
        G: FnMut(f64) -> f64,
    {
        let (mut a, mut fa) = (lo, glo);
        let (mut b, mut fb) = (hi, ghi);
        let (mut c, mut fc) = (b, fb);
        let mut d = b - a;
        let mut e = d;

        for _ in 0..self.max_iterations {
            if (fb > 0.0 && fc > 0.0) || (fb < 0.0 && fc < 0.0) {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * self.tolerance;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol || fb == 0.0 {
                return Some(b);
            }

            if e.abs() >= tol && fa.abs() > fb.abs() {
                // Inverse quadratic interpolation, or secant when only two points differ.
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    (2.0 * xm * s, 1.0 - s)
                } else {
                    let qa = fa / fc;
                    let r = fb / fc;
                    (
                        s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0)),
                        (qa - 1.0) * (r - 1.0) * (s - 1.0),
                    )
                };
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol { d } else { tol.copysign(xm) };
            fb = g(b);
            if !fb.is_finite() {
                return None;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::resistance::{ResistanceParameters, ResistanceToggles};

    fn setup() -> (FanCurve, ResistanceModel) {
        (
            FanCurve::default(),
            ResistanceModel::new(ResistanceParameters::default(), ResistanceToggles::default()),
        )
    }

    #[test]
    fn test_zero_drive_short_circuits() {
        let (fan, res) = setup();
        let sol = FlowBalanceSolver::default().solve(&fan, &res, 0.0, &ResistanceConditions::new(0.0), 500.0);
        assert_eq!(sol.status, SolveStatus::ShortCircuit);
        assert_eq!(sol.flow_cfm, 0.0);
        assert_eq!(sol.iterations, 0);
    }

    #[test]
    fn test_converges_to_crossing() {
        let (fan, res) = setup();
        let solver = FlowBalanceSolver::default();
        for drive in [0.02, 0.1, 0.5, 1.0] {
            for dust in [0.0, 60.0, 200.0] {
                let cond = ResistanceConditions::new(dust);
                let sol = solver.solve(&fan, &res, drive, &cond, 0.0);
                assert_eq!(sol.status, SolveStatus::Converged);
                let residual = objective(&fan, &res, drive, &cond, sol.flow_cfm);
                assert!(residual.abs() < 1e-6, "drive={drive} dust={dust} r={residual}");
                assert!(sol.flow_cfm > 0.0 && sol.flow_cfm <= fan.max_flow());
            }
        }
    }

    #[test]
    fn test_seed_does_not_change_answer() {
        let (fan, res) = setup();
        let solver = FlowBalanceSolver::default();
        let cond = ResistanceConditions::new(20.0);
        let a = solver.solve(&fan, &res, 0.6, &cond, 0.0);
        let b = solver.solve(&fan, &res, 0.6, &cond, 1800.0);
        let c = solver.solve(&fan, &res, 0.6, &cond, a.flow_cfm);
        assert!((a.flow_cfm - b.flow_cfm).abs() < 1e-5);
        assert!((a.flow_cfm - c.flow_cfm).abs() < 1e-5);
        // A seed at the answer needs far fewer evaluations than a cold start.
        assert!(c.iterations <= a.iterations);
    }

    #[test]
    fn test_more_dust_means_less_flow() {
        let (fan, res) = setup();
        let solver = FlowBalanceSolver::default();
        let clean = solver.solve(&fan, &res, 0.8, &ResistanceConditions::new(0.0), 0.0);
        let dirty = solver.solve(&fan, &res, 0.8, &ResistanceConditions::new(150.0), 0.0);
        assert!(dirty.flow_cfm < clean.flow_cfm);
    }

    #[test]
    fn test_no_crossing_reports_no_root() {
        // Fan still delivers pressure at the end of its curve while the system
        // has no resistance at all: g > 0 over the whole domain.
        let fan = FanCurve::new(&[
            crate::physics::fan::FanPoint::new(0.0, 100.0),
            crate::physics::fan::FanPoint::new(1000.0, 50.0),
        ])
        .expect("valid curve");
        let toggles = ResistanceToggles {
            duct: false,
            envelope: false,
            filter: false,
        };
        let res = ResistanceModel::new(ResistanceParameters::default(), toggles);
        let sol = FlowBalanceSolver::default().solve(&fan, &res, 1.0, &ResistanceConditions::new(0.0), 10.0);
        assert_eq!(sol.status, SolveStatus::NoRoot);
        assert!(sol.is_degraded());
        assert_eq!(sol.flow_cfm, 0.0);
    }
}
