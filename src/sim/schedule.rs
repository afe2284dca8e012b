//! Hour-of-day schedules.
//!
//! A [`DailySchedule`] holds one value per hour of a repeating 24-hour day. It
//! drives the scheduled exhaust flow and the commanded damper angle.

use serde::{Deserialize, Serialize};

/// Type of schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleType {
    /// Constant value for all hours.
    Constant,
    /// 24-hour repeating daily cycle.
    DailyCycle,
}

/// A schedule with hourly resolution for a 24-hour period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    /// Schedule name or identifier.
    pub name: String,
    /// Schedule type.
    pub schedule_type: ScheduleType,
    /// Hourly values.
    pub values: [f64; 24],
}

impl DailySchedule {
    /// Creates a new schedule with all values at zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule_type: ScheduleType::DailyCycle,
            values: [0.0; 24],
        }
    }

    /// Creates a constant schedule for all 24 hours.
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        let mut schedule = Self::new(name);
        schedule.schedule_type = ScheduleType::Constant;
        schedule.values = [value; 24];
        schedule
    }

    /// Sets the value for a specific hour. Hours past 23 are ignored.
    pub fn set_hour(&mut self, hour: usize, value: f64) {
        if hour < 24 {
            self.values[hour] = value;
            self.schedule_type = ScheduleType::DailyCycle;
        }
    }

    /// Hours covered by `[start_hour, end_hour)`, wrapping midnight if start > end.
    ///
    /// `start_hour == end_hour` covers no hours.
    pub fn hours_in_range(start_hour: usize, end_hour: usize) -> Vec<usize> {
        let (start, end) = (start_hour % 24, end_hour.min(24));
        if start == end {
            Vec::new()
        } else if start < end {
            (start..end).collect()
        } else {
            (start..24).chain(0..end).collect()
        }
    }

    /// Fills a range of hours with a value.
    pub fn fill_range(&mut self, start_hour: usize, end_hour: usize, value: f64) {
        for hour in Self::hours_in_range(start_hour, end_hour) {
            self.set_hour(hour, value);
        }
    }

    /// Adds a value to a range of hours.
    pub fn add_range(&mut self, start_hour: usize, end_hour: usize, value: f64) {
        for hour in Self::hours_in_range(start_hour, end_hour) {
            let current = self.values[hour];
            self.set_hour(hour, current + value);
        }
    }

    /// Returns the value for a given hour (modulo 24).
    pub fn value(&self, hour: usize) -> f64 {
        self.values[hour % 24]
    }

    /// Largest scheduled value.
    pub fn peak(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self::new("Default Schedule")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_range_wraps_midnight() {
        let mut s = DailySchedule::new("night");
        s.fill_range(22, 2, 1.0);
        let on: Vec<usize> = (0..24).filter(|&h| s.value(h) > 0.0).collect();
        assert_eq!(on, vec![0, 1, 22, 23]);
    }

    #[test]
    fn test_empty_range() {
        let mut s = DailySchedule::new("none");
        s.fill_range(5, 5, 1.0);
        assert_eq!(s.peak(), 0.0);
    }

    #[test]
    fn test_add_range_accumulates() {
        let mut s = DailySchedule::new("exhaust");
        s.add_range(17, 19, 100.0);
        s.add_range(18, 20, 50.0);
        assert_eq!(s.value(17), 100.0);
        assert_eq!(s.value(18), 150.0);
        assert_eq!(s.value(19), 50.0);
        assert_eq!(s.value(18 + 24), 150.0);
        assert_eq!(s.schedule_type, ScheduleType::DailyCycle);
    }

    #[test]
    fn test_constant() {
        let s = DailySchedule::constant("open", 90.0);
        assert_eq!(s.schedule_type, ScheduleType::Constant);
        assert!((0..24).all(|h| s.value(h) == 90.0));
    }
}
