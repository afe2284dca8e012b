//! Parallel scenario batches.
//!
//! Scenarios share nothing but the read-only weather series, so a batch is a
//! plain rayon map: one driver and one state per scenario, results in input
//! order.

use rayon::prelude::*;

use crate::error::SimError;
use crate::sim::config::ScenarioConfig;
use crate::sim::engine::{ScenarioOutput, SimulationDriver};
use crate::sim::events::{NullSink, SimulationSink};
use crate::weather::WeatherSource;

/// Runs every scenario against `weather` in parallel, discarding events.
pub fn run_parallel(
    configs: &[ScenarioConfig],
    weather: &(dyn WeatherSource + Sync),
) -> Vec<Result<ScenarioOutput, SimError>> {
    run_parallel_with(configs, weather, || NullSink)
        .into_iter()
        .map(|r| r.map(|(output, _)| output))
        .collect()
}

/// Like [`run_parallel`], giving each scenario its own sink from `make_sink`.
///
/// The sink is returned alongside the output so collected events survive the
/// batch.
pub fn run_parallel_with<S, F>(
    configs: &[ScenarioConfig],
    weather: &(dyn WeatherSource + Sync),
    make_sink: F,
) -> Vec<Result<(ScenarioOutput, S), SimError>>
where
    S: SimulationSink + Send,
    F: Fn() -> S + Sync,
{
    configs
        .par_iter()
        .map(|config| {
            let driver = SimulationDriver::new(config.clone())?;
            let mut sink = make_sink();
            let output = driver.run(weather, &mut sink)?;
            Ok((output, sink))
        })
        .collect()
}
