//! Time-domain digital twin of a residential forced-air HVAC system.
//!
//! Every control tick resolves the blower operating point against the
//! duct + envelope + filter resistance curve, loads the filter with captured
//! dust, advances house pressure and indoor PM, and lets a PI loop retune the
//! blower drive to hold a target pressure. Hourly weather drives the outer
//! loop; energy and filter costs close each hour.
//!
//! ```
//! use airtwin::{NullSink, ScenarioConfig, SimulationDriver, SyntheticWeather};
//!
//! let weather = SyntheticWeather::new(vec![15.0, 25.0], 24);
//! let driver = SimulationDriver::new(ScenarioConfig::standard()).unwrap();
//! let output = driver.run(&weather, &mut NullSink).unwrap();
//! assert_eq!(output.snapshots.len(), 24);
//! ```

pub mod error;
pub mod physics;
pub mod report;
pub mod sim;
pub mod weather;

pub use error::SimError;
pub use report::{ComparisonReport, ScenarioSummary};
pub use sim::batch::run_parallel;
pub use sim::config::{FeatureToggles, ScenarioConfig, TimeGrid};
pub use sim::engine::{HourlySnapshot, ScenarioOutput, SimulationDriver};
pub use sim::events::{LogSink, MemorySink, NullSink, SimEvent, SimulationSink};
pub use sim::state::SimulationState;
pub use weather::synthetic::SyntheticWeather;
pub use weather::table::WeatherTable;
pub use weather::{HourlyWeatherData, WeatherError, WeatherSource};
