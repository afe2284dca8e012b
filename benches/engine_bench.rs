use airtwin::physics::fan::FanCurve;
use airtwin::physics::flow_balance::FlowBalanceSolver;
use airtwin::physics::resistance::{ResistanceConditions, ResistanceModel, ResistanceParameters, ResistanceToggles};
use airtwin::{run_parallel, NullSink, ScenarioConfig, SimulationDriver, SyntheticWeather};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_flow_balance(c: &mut Criterion) {
    let fan = FanCurve::default();
    let resistance = ResistanceModel::new(ResistanceParameters::default(), ResistanceToggles::default());
    let solver = FlowBalanceSolver::default();
    let conditions = ResistanceConditions::new(40.0);

    c.bench_function("flow_balance_warm_seed", |b| {
        b.iter(|| solver.solve(&fan, &resistance, black_box(0.35), &conditions, black_box(420.0)))
    });
    c.bench_function("flow_balance_cold_seed", |b| {
        b.iter(|| solver.solve(&fan, &resistance, black_box(0.35), &conditions, black_box(0.0)))
    });
}

fn bench_scenarios(c: &mut Criterion) {
    // One day at 1 s control ticks
    let day = SyntheticWeather::new(vec![10.0, 18.0], 24);
    let driver = SimulationDriver::new(ScenarioConfig::standard().with_hours(24)).unwrap();
    c.bench_function("scenario_1day_1s_ticks", |b| {
        b.iter(|| driver.run(&day, &mut NullSink).unwrap())
    });

    // One year at 60 s control ticks
    let year = SyntheticWeather::new(vec![10.0, 18.0], 8760);
    let mut config = ScenarioConfig::standard().with_hours(8760);
    config.time_grid.control_step_secs = 60.0;
    let driver = SimulationDriver::new(config).unwrap();
    let mut group = c.benchmark_group("long_runs");
    group.sample_size(10);
    group.bench_function("scenario_1year_60s_ticks", |b| {
        b.iter(|| driver.run(&year, &mut NullSink).unwrap())
    });

    let configs: Vec<_> = [ScenarioConfig::standard(), ScenarioConfig::hepa()]
        .into_iter()
        .map(|c| c.with_hours(24))
        .collect();
    group.bench_function("batch_standard_vs_hepa_1day", |b| {
        b.iter(|| run_parallel(&configs, &day))
    });
    group.finish();
}

criterion_group!(benches, bench_flow_balance, bench_scenarios);
criterion_main!(benches);
