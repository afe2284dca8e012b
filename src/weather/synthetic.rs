//! Deterministic synthetic weather and outdoor PM.
//!
//! A drop-in [`WeatherSource`] for runs without measured data. Conditions are
//! built from smooth periodic terms so that a given configuration always
//! produces the same series:
//!
//! - Seasonal temperature swing (coldest around mid-January)
//! - Daily temperature cycle (coldest ~4am, warmest ~3pm)
//! - Relative humidity anti-correlated with the daily temperature
//! - Outdoor PM with morning and evening traffic peaks and a winter
//!   inversion boost, scaled per bin from a base concentration

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::weather::{HourlyWeatherData, WeatherError, WeatherSource, HOURS_PER_YEAR};

/// Parameters of the synthetic climate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticWeather {
    pub location: String,
    /// Annual mean dry-bulb temperature (°C)
    pub mean_temp: f64,
    /// Half peak-to-peak seasonal swing (°C)
    pub seasonal_amplitude: f64,
    /// Half peak-to-peak daily swing (°C)
    pub daily_amplitude: f64,
    /// Annual mean relative humidity (%)
    pub mean_humidity: f64,
    /// Baseline outdoor concentration per bin (µg/m³)
    pub base_pm: Vec<f64>,
    /// Relative height of the traffic peaks over the baseline
    pub traffic_peak: f64,
    /// Relative winter boost of PM
    pub winter_boost: f64,
    /// Length of the series (hours)
    pub hours: usize,
}

impl Default for SyntheticWeather {
    fn default() -> Self {
        Self {
            location: "Synthetic mid-latitude".to_string(),
            mean_temp: 11.0,
            seasonal_amplitude: 13.0,
            daily_amplitude: 5.0,
            mean_humidity: 55.0,
            base_pm: vec![8.0, 15.0],
            traffic_peak: 0.6,
            winter_boost: 0.3,
            hours: HOURS_PER_YEAR,
        }
    }
}

impl SyntheticWeather {
    /// Synthetic climate with the given bin baselines and length.
    pub fn new(base_pm: Vec<f64>, hours: usize) -> Self {
        Self {
            base_pm,
            hours,
            ..Self::default()
        }
    }

    fn generate_hourly_data(&self, hour: usize) -> HourlyWeatherData {
        let day_of_year = (hour / 24) % 365;
        let hour_of_day = hour % 24;

        // Seasonal angle, zero on Jan 1
        let day_angle = (day_of_year as f64 / 365.0) * 2.0 * PI;
        // Zero at solar noon
        let hour_angle = ((hour_of_day as f64 - 12.0) / 24.0) * 2.0 * PI;

        // Coldest in mid-January, warmest mid-July.
        let seasonal_temp = self.mean_temp - self.seasonal_amplitude * (day_angle - 0.26).cos();
        // Peak at 3pm.
        let daily_temp = self.daily_amplitude * (hour_angle - PI / 4.0).cos();
        let temp_noise = ((hour as f64 * 0.1).sin() * 0.5).clamp(-2.0, 2.0);
        let dry_bulb_temp = seasonal_temp + daily_temp + temp_noise;

        let humidity = (self.mean_humidity + 10.0 * day_angle.cos()
            - 8.0 * (hour_angle - PI / 4.0).cos())
        .clamp(10.0, 95.0);

        // Traffic peaks around 8am and 6pm.
        let morning = (-((hour_of_day as f64 - 8.0).powi(2)) / 4.0).exp();
        let evening = (-((hour_of_day as f64 - 18.0).powi(2)) / 6.0).exp();
        let winter = 0.5 * (1.0 + day_angle.cos());
        let pm_factor = 1.0 + self.traffic_peak * (morning + evening) + self.winter_boost * winter;
        let pm_noise = 1.0 + 0.1 * (hour as f64 * 0.37).sin();

        let outdoor_pm = self
            .base_pm
            .iter()
            .map(|&base| (base.max(0.0) * pm_factor * pm_noise).max(0.0))
            .collect();

        HourlyWeatherData::new(dry_bulb_temp, humidity, outdoor_pm, hour)
    }
}

impl WeatherSource for SyntheticWeather {
    fn location(&self) -> Option<String> {
        Some(self.location.clone())
    }

    fn num_hours(&self) -> usize {
        self.hours
    }

    fn num_bins(&self) -> usize {
        self.base_pm.len()
    }

    fn get_hourly_data(&self, hour: usize) -> Result<HourlyWeatherData, WeatherError> {
        if hour >= self.hours {
            return Err(WeatherError::InvalidHour(hour));
        }
        Ok(self.generate_hourly_data(hour))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let weather = SyntheticWeather::default();
        assert_eq!(
            weather.get_hourly_data(1234).unwrap(),
            weather.get_hourly_data(1234).unwrap()
        );
        assert_eq!(weather.num_bins(), 2);
        assert!(weather.get_hourly_data(HOURS_PER_YEAR).is_err());
    }

    #[test]
    fn test_seasons_and_days() {
        let weather = SyntheticWeather::default();
        let jan_3pm = weather.get_hourly_data(15 * 24 + 15).unwrap().dry_bulb_temp;
        let jul_3pm = weather.get_hourly_data(196 * 24 + 15).unwrap().dry_bulb_temp;
        assert!(jul_3pm > jan_3pm + 15.0);

        let jul_4am = weather.get_hourly_data(196 * 24 + 4).unwrap().dry_bulb_temp;
        assert!(jul_3pm > jul_4am);
    }

    #[test]
    fn test_pm_is_positive_and_peaks_with_traffic() {
        let weather = SyntheticWeather::new(vec![10.0], 48);
        let night = weather.get_hourly_data(3).unwrap().pm(0);
        let rush = weather.get_hourly_data(8).unwrap().pm(0);
        assert!(night > 0.0);
        assert!(rush > night);
        for h in weather.iter_hours() {
            let h = h.unwrap();
            assert!((10.0..=95.0).contains(&h.humidity));
            assert!(h.outdoor_pm.iter().all(|&c| c >= 0.0));
        }
    }
}
