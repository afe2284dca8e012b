//! Bounded-iteration backward-Euler stepping.
//!
//! Both house-level state updates are implicit:
//!
//! - indoor pressure, where envelope leakage depends nonlinearly on the
//!   still-unknown new pressure ([`BackwardEuler::step`]);
//! - per-bin PM concentration, whose rate is linear in the unknown and has a
//!   closed-form backward step ([`BackwardEuler::step_linear`]).
//!
//! The nonlinear step requires `rate(x)` to be non-increasing in `x`, which
//! makes the residual `x − x_old − Δt·rate(x)` strictly increasing. The root is
//! then bracketed by the admissible band and refined with a bounded Illinois
//! (modified regula falsi) iteration, re-evaluating the rate at every guess.

/// Result of a nonlinear backward-Euler step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImplicitOutcome {
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Configuration of the implicit solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackwardEuler {
    /// Hard cap on rate evaluations per step
    pub max_iterations: usize,
    /// Stop when successive guesses (or the residual) fall below this
    pub tolerance: f64,
}

impl Default for BackwardEuler {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
        }
    }
}

impl BackwardEuler {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            tolerance: tolerance.abs().max(f64::EPSILON),
        }
    }

    /// Solves `x = x_old + dt · rate(x)` for `x ∈ [lower, upper]`.
    ///
    /// If the root lies outside the band the nearer bound is returned (and
    /// reported as converged: the band is the admissible domain). A non-finite
    /// residual stops the iteration and returns the best bracketed guess with
    /// `converged == false`.
    pub fn step<F>(&self, x_old: f64, dt: f64, lower: f64, upper: f64, mut rate: F) -> ImplicitOutcome
    where
        F: FnMut(f64) -> f64,
    {
        let (lower, upper) = if lower <= upper {
            (lower, upper)
        } else {
            (upper, lower)
        };
        let x_old = if x_old.is_finite() {
            x_old.clamp(lower, upper)
        } else {
            0.0_f64.clamp(lower, upper)
        };
        let mut residual = |x: f64| x - x_old - dt * rate(x);

        let mut a = lower;
        let mut fa = residual(a);
        let mut b = upper;
        let mut fb = residual(b);
        let mut iterations = 2;

        if !fa.is_finite() || !fb.is_finite() {
            return ImplicitOutcome {
                value: x_old,
                iterations,
                converged: false,
            };
        }
        if fa >= 0.0 {
            return ImplicitOutcome {
                value: lower,
                iterations,
                converged: true,
            };
        }
        if fb <= 0.0 {
            return ImplicitOutcome {
                value: upper,
                iterations,
                converged: true,
            };
        }

        let mut guess = x_old;
        let mut side = 0i8;
        while iterations < self.max_iterations {
            let c = (a * fb - b * fa) / (fb - fa);
            let c = if c.is_finite() && c > a && c < b {
                c
            } else {
                0.5 * (a + b)
            };
            let fc = residual(c);
            iterations += 1;
            if !fc.is_finite() {
                return ImplicitOutcome {
                    value: guess,
                    iterations,
                    converged: false,
                };
            }

            let moved = (c - guess).abs();
            guess = c;
            if fc.abs() < self.tolerance || moved < self.tolerance || (b - a) < self.tolerance {
                return ImplicitOutcome {
                    value: c,
                    iterations,
                    converged: true,
                };
            }

            if fc < 0.0 {
                a = c;
                fa = fc;
                if side == -1 {
                    fb *= 0.5;
                }
                side = -1;
            } else {
                b = c;
                fb = fc;
                if side == 1 {
                    fa *= 0.5;
                }
                side = 1;
            }
        }

        ImplicitOutcome {
            value: guess,
            iterations,
            converged: false,
        }
    }

    /// Closed-form backward step for `dx/dt = source − sink_rate · x`.
    ///
    /// `x_new = (x_old + dt·source) / (1 + dt·sink_rate)`. With a non-negative
    /// sink the denominator is at least one, so the step cannot amplify or
    /// oscillate regardless of `dt`. Non-finite results fall back to `x_old`.
    pub fn step_linear(&self, x_old: f64, dt: f64, source: f64, sink_rate: f64) -> f64 {
        let sink = if sink_rate.is_finite() {
            sink_rate.max(0.0)
        } else {
            0.0
        };
        let next = (x_old + dt * source) / (1.0 + dt * sink);
        if next.is_finite() {
            next
        } else {
            x_old
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_rate_matches_closed_form() {
        let solver = BackwardEuler::default();
        // dx/dt = 2 - 0.5 x
        let out = solver.step(1.0, 0.1, -100.0, 100.0, |x| 2.0 - 0.5 * x);
        assert!(out.converged);
        let exact = solver.step_linear(1.0, 0.1, 2.0, 0.5);
        assert_relative_eq!(out.value, exact, epsilon = 1e-6);
    }

    #[test]
    fn test_stiff_power_law_converges() {
        // Pressure-like relaxation with a sqrt-law leak and a huge stiffness.
        let solver = BackwardEuler::default();
        let stiffness = 350.0;
        let out = solver.step(0.0, 1.0, -30.0, 30.0, |p| {
            stiffness * (0.05 - 0.0557 * p.abs().powf(0.65) * p.signum())
        });
        assert!(out.converged);
        assert!(out.iterations <= solver.max_iterations);
        let r = out.value - stiffness * (0.05 - 0.0557 * out.value.powf(0.65));
        assert!(r.abs() < 1e-3, "residual {r}");
    }

    #[test]
    fn test_root_outside_band_returns_bound() {
        let solver = BackwardEuler::default();
        let out = solver.step(0.0, 1.0, -30.0, 30.0, |_| 1e6);
        assert_eq!(out.value, 30.0);
        let out = solver.step(0.0, 1.0, -30.0, 30.0, |_| -1e6);
        assert_eq!(out.value, -30.0);
    }

    #[test]
    fn test_non_finite_rate_is_contained() {
        let solver = BackwardEuler::default();
        let out = solver.step(3.0, 1.0, -30.0, 30.0, |_| f64::NAN);
        assert!(!out.converged);
        assert_eq!(out.value, 3.0);
        assert_eq!(solver.step_linear(2.0, 1.0, f64::INFINITY, 0.0), 2.0);
    }

    #[test]
    fn test_linear_step_never_amplifies() {
        let solver = BackwardEuler::default();
        for dt in [1e-3, 1.0, 1e3, 1e9] {
            let next = solver.step_linear(10.0, dt, 0.0, 0.3);
            assert!((0.0..=10.0).contains(&next));
        }
    }
}
