//! Hourly outdoor boundary conditions.
//!
//! The simulation kernel consumes one record per environment step: dry-bulb
//! temperature, relative humidity and the outdoor PM concentration of every
//! particle-size bin. Where those records come from is not the kernel's
//! concern.
//!
//! # Overview
//!
//! - [`HourlyWeatherData`]: one hour of outdoor conditions
//! - [`WeatherSource`]: hour-indexed access to a weather series
//! - [`WeatherError`]: failures while building or reading a series
//!
//! # Sources
//!
//! - **Tables**: measured or exported series via [`table::WeatherTable`]
//! - **Synthetic**: deterministic seasonal/diurnal generator via [`synthetic::SyntheticWeather`]

pub mod synthetic;
pub mod table;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hours in a non-leap year.
pub const HOURS_PER_YEAR: usize = 8760;

/// Outdoor conditions for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyWeatherData {
    /// Dry bulb temperature (°C)
    pub dry_bulb_temp: f64,

    /// Relative humidity (%)
    pub humidity: f64,

    /// Outdoor PM mass concentration per particle-size bin (µg/m³)
    pub outdoor_pm: Vec<f64>,

    /// Zero-based hour index within the series
    pub hour_of_year: usize,
}

impl HourlyWeatherData {
    /// Creates a new [`HourlyWeatherData`] record.
    ///
    /// # Example
    ///
    /// ```
    /// use airtwin::weather::HourlyWeatherData;
    ///
    /// let weather = HourlyWeatherData::new(
    ///     -3.0,             // °C
    ///     65.0,             // % RH
    ///     vec![12.0, 30.0], // PM2.5, PM10 (µg/m³)
    ///     100,              // hour 100 of the series
    /// );
    /// assert_eq!(weather.num_bins(), 2);
    /// ```
    pub fn new(dry_bulb_temp: f64, humidity: f64, outdoor_pm: Vec<f64>, hour_of_year: usize) -> Self {
        HourlyWeatherData {
            dry_bulb_temp,
            humidity,
            outdoor_pm,
            hour_of_year,
        }
    }

    /// Number of PM bins in this record.
    pub fn num_bins(&self) -> usize {
        self.outdoor_pm.len()
    }

    /// Outdoor concentration of `bin`, zero for missing, negative or non-finite entries.
    pub fn pm(&self, bin: usize) -> f64 {
        match self.outdoor_pm.get(bin) {
            Some(&c) if c.is_finite() && c > 0.0 => c,
            _ => 0.0,
        }
    }

    /// Returns the hour of day (0-23).
    ///
    /// # Example
    ///
    /// ```
    /// use airtwin::weather::HourlyWeatherData;
    ///
    /// let weather = HourlyWeatherData::new(20.0, 50.0, vec![10.0], 25);
    /// assert_eq!(weather.hour_of_day(), 1); // Hour 25 is 1 AM
    /// ```
    pub fn hour_of_day(&self) -> usize {
        self.hour_of_year % 24
    }

    /// Returns the day of year (0-364).
    pub fn day_of_year(&self) -> usize {
        self.hour_of_year / 24
    }

    /// Returns the month (1-12), using non-leap month lengths.
    ///
    /// # Example
    ///
    /// ```
    /// use airtwin::weather::HourlyWeatherData;
    ///
    /// let weather = HourlyWeatherData::new(20.0, 50.0, vec![], 744);
    /// assert_eq!(weather.month(), 2); // Hour 744 is in February
    /// ```
    pub fn month(&self) -> usize {
        let cumulative_days = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
        let day = self.day_of_year() % 365;

        for (month_idx, &cumulative) in cumulative_days.iter().enumerate() {
            if day < cumulative {
                return month_idx;
            }
        }
        12
    }
}

/// Error types for weather data operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    /// Hour index outside the series.
    #[error("invalid hour index: {0}")]
    InvalidHour(usize),

    /// A required column is absent from a tabular source.
    #[error("missing required weather column: {0}")]
    MissingColumn(String),

    /// Weather data is incomplete or inconsistent.
    #[error("incomplete weather data: {0}")]
    IncompleteData(String),

    /// A field could not be parsed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Input/output error reading weather data.
    #[error("IO error: {0}")]
    IoError(String),
}

/// Hour-indexed access to a weather series.
///
/// # Example
///
/// ```
/// use airtwin::weather::{HourlyWeatherData, WeatherError, WeatherSource};
///
/// struct Still;
/// impl WeatherSource for Still {
///     fn location(&self) -> Option<String> { None }
///     fn num_hours(&self) -> usize { 48 }
///     fn num_bins(&self) -> usize { 1 }
///     fn get_hourly_data(&self, hour: usize) -> Result<HourlyWeatherData, WeatherError> {
///         if hour >= 48 {
///             return Err(WeatherError::InvalidHour(hour));
///         }
///         Ok(HourlyWeatherData::new(20.0, 50.0, vec![8.0], hour))
///     }
/// }
///
/// let total: f64 = Still.iter_hours().map(|h| h.unwrap().pm(0)).sum();
/// assert_eq!(total, 48.0 * 8.0);
/// ```
pub trait WeatherSource {
    /// Location description if available.
    fn location(&self) -> Option<String>;

    /// Number of hourly records available.
    fn num_hours(&self) -> usize;

    /// Number of PM bins carried by every record.
    fn num_bins(&self) -> usize;

    /// Retrieves the record for `hour`.
    ///
    /// # Errors
    ///
    /// [`WeatherError::InvalidHour`] when `hour >= num_hours()`.
    fn get_hourly_data(&self, hour: usize) -> Result<HourlyWeatherData, WeatherError>;

    /// Iterates over every hour of the series.
    fn iter_hours(&self) -> WeatherIterator<'_, Self>
    where
        Self: Sized,
    {
        WeatherIterator {
            source: self,
            current_hour: 0,
        }
    }
}

/// Iterator created by [`WeatherSource::iter_hours()`].
pub struct WeatherIterator<'a, T: WeatherSource> {
    source: &'a T,
    current_hour: usize,
}

impl<'a, T: WeatherSource> Iterator for WeatherIterator<'a, T> {
    type Item = Result<HourlyWeatherData, WeatherError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_hour < self.source.num_hours() {
            let hour = self.current_hour;
            self.current_hour += 1;
            Some(self.source.get_hourly_data(hour))
        } else {
            None
        }
    }
}
