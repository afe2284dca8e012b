//! Scenario-fatal errors.
//!
//! Input-validity and numerical faults never surface here: they are clamped or
//! replaced by fallbacks where they occur. What remains aborts a single
//! scenario and carries enough context to say which component failed on what
//! inputs.

use thiserror::Error;

use crate::weather::WeatherError;

#[derive(Debug, Error)]
pub enum SimError {
    /// The dual-rate clock cannot be built from these steps.
    #[error(
        "invalid time grid (control step {control_step_secs} s, environment step {env_step_secs} s, {hours} h): {reason}"
    )]
    InvalidTimeGrid {
        control_step_secs: f64,
        env_step_secs: f64,
        hours: usize,
        reason: &'static str,
    },

    /// A parameter bundle is structurally unusable.
    #[error("invalid {component} configuration: {detail}")]
    InvalidConfig {
        component: &'static str,
        detail: String,
    },

    /// The weather source could not provide a required hour.
    #[error("weather input failed at hour {hour}: {source}")]
    Weather {
        hour: usize,
        #[source]
        source: WeatherError,
    },

    /// The weather table and the scenario disagree on particle bins.
    #[error("weather hour {hour} carries {found} PM bin(s), scenario expects {expected}")]
    BinMismatch {
        hour: usize,
        expected: usize,
        found: usize,
    },

    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SimError {
    /// Name of the component that raised the error.
    pub fn component(&self) -> &'static str {
        match self {
            SimError::InvalidTimeGrid { .. } => "time grid",
            SimError::InvalidConfig { component, .. } => component,
            SimError::Weather { .. } | SimError::BinMismatch { .. } => "weather",
            SimError::Io(_) | SimError::Parse(_) => "scenario loader",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_inputs() {
        let err = SimError::InvalidTimeGrid {
            control_step_secs: 7.0,
            env_step_secs: 3600.0,
            hours: 24,
            reason: "environment step is not a multiple of the control step",
        };
        let msg = err.to_string();
        assert!(msg.contains("7 s"));
        assert!(msg.contains("multiple"));
        assert_eq!(err.component(), "time grid");

        let err = SimError::BinMismatch {
            hour: 3,
            expected: 2,
            found: 1,
        };
        assert!(err.to_string().contains("hour 3"));
        assert_eq!(err.component(), "weather");
    }

    #[test]
    fn test_weather_source_chain() {
        use std::error::Error as _;
        let err = SimError::Weather {
            hour: 10,
            source: WeatherError::InvalidHour(10),
        };
        assert!(err.source().is_some());
    }
}
