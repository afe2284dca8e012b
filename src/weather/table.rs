//! In-memory hourly weather table.
//!
//! A [`WeatherTable`] is a validated, hour-ordered series of
//! [`HourlyWeatherData`]. It can be assembled from records or read from a
//! delimited text table with a header row:
//!
//! ```text
//! # comment lines start with '#'
//! temp_c,rh,pm_0.3,pm_2.5,pm_10
//! -2.5,71,4.1,12.0,21.3
//! ...
//! ```
//!
//! `temp_c` and `rh` are required, plus one or more `pm_<label>` columns (one per
//! particle bin, in bin order). Other columns are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::weather::{HourlyWeatherData, WeatherError, WeatherSource};

/// Validated hourly weather series.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherTable {
    location: Option<String>,
    bin_labels: Vec<String>,
    hourly_data: Vec<HourlyWeatherData>,
}

/// Column positions resolved from a header row.
struct Columns {
    temp: usize,
    rh: usize,
    pm: Vec<usize>,
    labels: Vec<String>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, WeatherError> {
        let names: Vec<String> = header
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| WeatherError::MissingColumn(name.to_string()))
        };
        let temp = find("temp_c")?;
        let rh = find("rh")?;

        let mut pm = Vec::new();
        let mut labels = Vec::new();
        for (i, n) in names.iter().enumerate() {
            if let Some(label) = n.strip_prefix("pm_") {
                pm.push(i);
                labels.push(label.to_string());
            }
        }
        if pm.is_empty() {
            return Err(WeatherError::MissingColumn("pm_<bin>".to_string()));
        }
        Ok(Self {
            temp,
            rh,
            pm,
            labels,
        })
    }

    fn width(&self) -> usize {
        self.pm
            .iter()
            .copied()
            .chain([self.temp, self.rh])
            .max()
            .unwrap_or(0)
            + 1
    }
}

fn parse_field(field: &str, name: &str, line_no: usize) -> Result<f64, WeatherError> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::IncompleteData(format!(
            "missing {} on line {}",
            name, line_no
        )));
    }
    trimmed.parse::<f64>().map_err(|_| {
        WeatherError::ParseError(format!(
            "invalid {} value '{}' on line {}",
            name, trimmed, line_no
        ))
    })
}

impl WeatherTable {
    /// Builds a table from records, re-indexing hours from zero.
    ///
    /// # Errors
    ///
    /// [`WeatherError::IncompleteData`] for an empty series, records with
    /// differing bin counts, or a non-finite temperature.
    pub fn from_records(records: Vec<HourlyWeatherData>) -> Result<Self, WeatherError> {
        let Some(first) = records.first() else {
            return Err(WeatherError::IncompleteData("no hourly records".to_string()));
        };
        let bins = first.num_bins();
        let mut hourly_data = Vec::with_capacity(records.len());
        for (hour, mut record) in records.into_iter().enumerate() {
            if record.num_bins() != bins {
                return Err(WeatherError::IncompleteData(format!(
                    "hour {} has {} PM bins, expected {}",
                    hour,
                    record.num_bins(),
                    bins
                )));
            }
            if !record.dry_bulb_temp.is_finite() {
                return Err(WeatherError::IncompleteData(format!(
                    "hour {} has a non-finite temperature",
                    hour
                )));
            }
            record.hour_of_year = hour;
            hourly_data.push(record);
        }
        Ok(Self {
            location: None,
            bin_labels: (0..bins).map(|i| format!("bin{}", i)).collect(),
            hourly_data,
        })
    }

    /// Constant conditions for `hours` hours.
    pub fn constant(hours: usize, dry_bulb_temp: f64, humidity: f64, outdoor_pm: Vec<f64>) -> Self {
        let bins = outdoor_pm.len();
        Self {
            location: None,
            bin_labels: (0..bins).map(|i| format!("bin{}", i)).collect(),
            hourly_data: (0..hours)
                .map(|h| HourlyWeatherData::new(dry_bulb_temp, humidity, outdoor_pm.clone(), h))
                .collect(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Reads a delimited table from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WeatherError> {
        let file = File::open(path.as_ref()).map_err(|e| WeatherError::IoError(e.to_string()))?;
        let mut table = Self::parse(BufReader::new(file))?;
        if table.location.is_none() {
            table.location = path
                .as_ref()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned());
        }
        Ok(table)
    }

    /// Parses a delimited table from a reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, WeatherError> {
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| match l {
                Ok(text) => {
                    let t = text.trim();
                    !t.is_empty() && !t.starts_with('#')
                }
                Err(_) => true,
            });

        let (_, header) = lines
            .next()
            .ok_or_else(|| WeatherError::IncompleteData("missing header row".to_string()))?;
        let header = header.map_err(|e| WeatherError::IoError(e.to_string()))?;
        let columns = Columns::from_header(&header)?;
        let width = columns.width();

        let mut hourly_data = Vec::new();
        for (line_no, line) in lines {
            let line = line.map_err(|e| WeatherError::IoError(e.to_string()))?;
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < width {
                return Err(WeatherError::ParseError(format!(
                    "expected at least {} fields, found {} on line {}",
                    width,
                    fields.len(),
                    line_no
                )));
            }
            let dry_bulb_temp = parse_field(fields[columns.temp], "temp_c", line_no)?;
            let humidity = parse_field(fields[columns.rh], "rh", line_no)?;
            let outdoor_pm = columns
                .pm
                .iter()
                .zip(&columns.labels)
                .map(|(&i, label)| parse_field(fields[i], &format!("pm_{}", label), line_no))
                .collect::<Result<Vec<f64>, _>>()?;
            let hour = hourly_data.len();
            hourly_data.push(HourlyWeatherData::new(dry_bulb_temp, humidity, outdoor_pm, hour));
        }

        let mut table = Self::from_records(hourly_data)?;
        table.bin_labels = columns.labels;
        Ok(table)
    }

    /// Labels of the PM columns, in bin order.
    pub fn bin_labels(&self) -> &[String] {
        &self.bin_labels
    }

    pub fn records(&self) -> &[HourlyWeatherData] {
        &self.hourly_data
    }

    /// Mean outdoor concentration of `bin` over the series.
    pub fn mean_pm(&self, bin: usize) -> f64 {
        if self.hourly_data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.hourly_data.iter().map(|d| d.pm(bin)).sum();
        sum / self.hourly_data.len() as f64
    }
}

impl WeatherSource for WeatherTable {
    fn location(&self) -> Option<String> {
        self.location.clone()
    }

    fn num_hours(&self) -> usize {
        self.hourly_data.len()
    }

    fn num_bins(&self) -> usize {
        self.bin_labels.len()
    }

    fn get_hourly_data(&self, hour: usize) -> Result<HourlyWeatherData, WeatherError> {
        self.hourly_data
            .get(hour)
            .cloned()
            .ok_or(WeatherError::InvalidHour(hour))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
# two bins
hour,temp_c,rh,pm_2.5,pm_10
0,-2.0,70,12.5,20.0

1,-2.5,72,13.0,21.0
";

    #[test]
    fn test_parse_sample() {
        let table = WeatherTable::parse(Cursor::new(SAMPLE)).expect("valid table");
        assert_eq!(table.num_hours(), 2);
        assert_eq!(table.num_bins(), 2);
        assert_eq!(table.bin_labels(), &["2.5".to_string(), "10".to_string()]);
        let h1 = table.get_hourly_data(1).unwrap();
        assert_eq!(h1.dry_bulb_temp, -2.5);
        assert_eq!(h1.outdoor_pm, vec![13.0, 21.0]);
        assert_eq!(h1.hour_of_year, 1);
        assert_eq!(table.get_hourly_data(2), Err(WeatherError::InvalidHour(2)));
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let err = WeatherTable::parse(Cursor::new("temp_c,pm_2.5\n1,2\n")).unwrap_err();
        assert_eq!(err, WeatherError::MissingColumn("rh".to_string()));

        let err = WeatherTable::parse(Cursor::new("temp_c,rh\n1,2\n")).unwrap_err();
        assert!(matches!(err, WeatherError::MissingColumn(_)));
    }

    #[test]
    fn test_malformed_rows() {
        let err = WeatherTable::parse(Cursor::new("temp_c,rh,pm_1\n1,2\n")).unwrap_err();
        assert!(matches!(err, WeatherError::ParseError(_)));

        let err = WeatherTable::parse(Cursor::new("temp_c,rh,pm_1\n1,x,3\n")).unwrap_err();
        assert!(matches!(err, WeatherError::ParseError(_)));

        let err = WeatherTable::parse(Cursor::new("temp_c,rh,pm_1\n")).unwrap_err();
        assert!(matches!(err, WeatherError::IncompleteData(_)));
    }

    #[test]
    fn test_from_records_rejects_ragged_bins() {
        let records = vec![
            HourlyWeatherData::new(1.0, 50.0, vec![1.0, 2.0], 0),
            HourlyWeatherData::new(1.0, 50.0, vec![1.0], 1),
        ];
        assert!(WeatherTable::from_records(records).is_err());
    }

    #[test]
    fn test_constant_table() {
        let table = WeatherTable::constant(24, 5.0, 60.0, vec![50.0]).with_location("Lab");
        assert_eq!(table.num_hours(), 24);
        assert_eq!(table.location(), Some("Lab".to_string()));
        assert_eq!(table.mean_pm(0), 50.0);
    }
}
