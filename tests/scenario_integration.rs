//! End-to-end scenarios through the public driver API.

use std::io::Cursor;

use airtwin::sim::config::BinConfig;
use airtwin::{
    run_parallel, ComparisonReport, HourlyWeatherData, MemorySink, NullSink, ScenarioConfig, SimEvent,
    SimulationDriver, SyntheticWeather, WeatherTable,
};

fn single_bin(mut config: ScenarioConfig, bin: BinConfig) -> ScenarioConfig {
    config.bins = vec![bin];
    config
}

#[test]
fn hepa_day_cleans_indoor_air() {
    let config = single_bin(ScenarioConfig::hepa(), BinConfig::with_efficiency(2.5, 0.9999)).with_hours(24);
    let weather = WeatherTable::constant(24, 21.0, 50.0, vec![50.0]);
    let mut sink = MemorySink::new();

    let output = SimulationDriver::new(config)
        .unwrap()
        .run(&weather, &mut sink)
        .unwrap();

    assert_eq!(output.snapshots.len(), 24);
    let indoor = output.indoor_pm_series(0);
    assert!(*indoor.last().unwrap() < 5.0, "indoor PM {:?}", indoor.last());
    assert!(indoor.iter().all(|c| c.is_finite() && *c >= 0.0));

    let cost = output.total_cost();
    assert!(cost.is_finite() && cost > 0.0);
    assert_eq!(sink.degradations(), 0);
    assert!(output.final_state.is_consistent(30.0));

    // Pressure held near the 1 Pa target at the close of every hour.
    for p in output.pressure_series() {
        assert!((p - 1.0).abs() < 0.5, "pressure {}", p);
    }
}

#[test]
fn hepa_never_worse_than_standard() {
    let records = (0..24)
        .map(|h| {
            let pm = 30.0 + 20.0 * ((h as f64) * 0.4).sin();
            let temp = 12.0 + 8.0 * ((h as f64 - 15.0) * std::f64::consts::PI / 12.0).cos();
            HourlyWeatherData::new(temp, 50.0, vec![pm], h)
        })
        .collect();
    let weather = WeatherTable::from_records(records).unwrap();

    let bin = BinConfig::new(2.5);
    let configs = vec![
        single_bin(ScenarioConfig::standard(), bin).with_hours(24),
        single_bin(ScenarioConfig::hepa(), bin).with_hours(24),
    ];
    let results = run_parallel(&configs, &weather);
    let standard = results[0].as_ref().unwrap();
    let hepa = results[1].as_ref().unwrap();

    for (hour, (s, h)) in standard
        .indoor_pm_series(0)
        .iter()
        .zip(hepa.indoor_pm_series(0))
        .enumerate()
    {
        assert!(h <= *s, "hour {}: hepa {} > standard {}", hour, h, s);
    }

    let mut report = ComparisonReport::new();
    report.add(standard.summary());
    report.add(hepa.summary());
    assert!(report.to_markdown().contains("Baseline: standard"));
    assert!(report.summaries[1].mean_indoor_pm[0] <= report.summaries[0].mean_indoor_pm[0]);
}

#[test]
fn filter_replacement_is_charged() {
    let mut config = ScenarioConfig::standard().with_hours(6);
    config.filter.capacity_g = 0.02;
    let weather = WeatherTable::constant(6, 21.0, 50.0, vec![400.0, 800.0]);
    let mut sink = MemorySink::new();

    let output = SimulationDriver::new(config.clone())
        .unwrap()
        .run(&weather, &mut sink)
        .unwrap();

    let clogs = sink
        .events
        .iter()
        .filter(|e| matches!(e, SimEvent::FilterClogged { replaced: true, .. }))
        .count();
    assert!(clogs >= 1);
    assert_eq!(output.replacements() as usize, clogs);

    let filter_cost: f64 = output.snapshots.iter().map(|s| s.cost.filters).sum();
    let expected = clogs as f64 * config.economics.filter_replacement_cost;
    assert!((filter_cost - expected).abs() < 1e-9);
}

#[test]
fn week_with_coarse_ticks_stays_bounded() {
    let mut config = ScenarioConfig::standard().with_hours(24 * 7);
    config.time_grid.control_step_secs = 60.0;
    config.features.damper = true;
    config.features.discrete_drive = true;
    config.damper_schedule.fill_range(22, 6, 45.0);
    let weather = SyntheticWeather::new(vec![10.0, 18.0], 24 * 7);

    let output = SimulationDriver::new(config)
        .unwrap()
        .run(&weather, &mut NullSink)
        .unwrap();

    assert_eq!(output.snapshots.len(), 24 * 7);
    for s in &output.snapshots {
        assert!(s.pressure_pa.is_finite() && s.pressure_pa.abs() <= 30.0);
        assert!((0.0..=1.0).contains(&s.drive));
        assert!((0.0..=100.0).contains(&s.filter_life_pct));
        assert!(s.indoor_pm.iter().all(|c| c.is_finite() && *c >= 0.0));
    }
    let costs = output.cumulative_cost_series();
    assert!(costs.windows(2).all(|w| w[1] >= w[0]));
    assert!(output.final_state.is_consistent(30.0));
}

#[test]
fn scenario_file_and_weather_table_round_trip() {
    let config = ScenarioConfig::hepa().with_name("attic test").with_hours(3);
    let parsed = ScenarioConfig::from_json_str(&config.to_json().unwrap()).unwrap();
    assert_eq!(parsed, config);

    let csv = "# exported\ntemp_c,rh,pm_2.5,pm_10\n5.0,60,12.0,20.0\n6.0,58,14.0,22.0\n7.5,55,11.0,19.0\n";
    let weather = WeatherTable::parse(Cursor::new(csv)).unwrap();
    assert_eq!(weather.bin_labels(), ["2.5", "10"]);

    let output = SimulationDriver::new(parsed)
        .unwrap()
        .run(&weather, &mut NullSink)
        .unwrap();
    assert_eq!(output.name, "attic test");
    assert_eq!(output.snapshots.len(), 3);
    assert_eq!(output.snapshots[2].outdoor_pm, vec![11.0, 19.0]);

    let json: serde_json::Value = serde_json::from_str(&output.summary().to_json().unwrap()).unwrap();
    assert_eq!(json["hours"], 3);
}
