use serde::Serialize;

use crate::error::SimError;
use crate::physics::fan::FanCurve;
use crate::physics::flow_balance::{FlowBalanceSolver, FlowSolution};
use crate::physics::particles::ParticleBin;
use crate::physics::resistance::{ResistanceConditions, ResistanceModel};
use crate::report::ScenarioSummary;
use crate::sim::config::{ScenarioConfig, TimeGrid};
use crate::sim::controller::PressureController;
use crate::sim::cost::{CostAccumulator, HourCost};
use crate::sim::damper::DamperActuator;
use crate::sim::drive::DriveScale;
use crate::sim::events::{SimEvent, SimulationSink};
use crate::sim::filter::{FilterLoadingTracker, FilterOutcome, FilterPhase};
use crate::sim::house::{HouseInputs, HouseIntegrator};
use crate::sim::state::SimulationState;
use crate::sim::ventilation::ExhaustSchedule;
use crate::weather::{HourlyWeatherData, WeatherSource};

/// System state at the close of one environment step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlySnapshot {
    /// Environment step index
    pub hour: usize,
    pub hour_of_day: usize,
    pub outdoor_temp_c: f64,
    /// Pressure at the end of the step (Pa)
    pub pressure_pa: f64,
    pub mean_pressure_pa: f64,
    /// Controller drive at the end of the step
    pub drive: f64,
    pub mean_drive: f64,
    /// Whether closed-loop control had taken over from the warm-up hold
    pub controller_engaged: bool,
    /// Blower flow at the end of the step (CFM)
    pub flow_cfm: f64,
    pub mean_flow_cfm: f64,
    pub exhaust_cfm: f64,
    pub stack_cfm: f64,
    pub mean_infiltration_cfm: f64,
    pub damper_angle_deg: Option<f64>,
    /// Indoor PM per bin at the end of the step (µg/m³)
    pub indoor_pm: Vec<f64>,
    pub outdoor_pm: Vec<f64>,
    pub total_dust_g: f64,
    pub filter_life_pct: f64,
    pub filter_phase: FilterPhase,
    pub replacements: u32,
    pub cost: HourCost,
    pub cumulative_cost: f64,
    /// Degraded ticks within this step
    pub degraded_ticks: u64,
}

/// Everything a finished scenario produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutput {
    pub name: String,
    pub snapshots: Vec<HourlySnapshot>,
    pub final_state: SimulationState,
}

impl ScenarioOutput {
    fn series(&self, f: impl Fn(&HourlySnapshot) -> f64) -> Vec<f64> {
        self.snapshots.iter().map(f).collect()
    }

    pub fn pressure_series(&self) -> Vec<f64> {
        self.series(|s| s.pressure_pa)
    }

    pub fn drive_series(&self) -> Vec<f64> {
        self.series(|s| s.drive)
    }

    pub fn flow_series(&self) -> Vec<f64> {
        self.series(|s| s.flow_cfm)
    }

    pub fn filter_life_series(&self) -> Vec<f64> {
        self.series(|s| s.filter_life_pct)
    }

    pub fn dust_series(&self) -> Vec<f64> {
        self.series(|s| s.total_dust_g)
    }

    pub fn cumulative_cost_series(&self) -> Vec<f64> {
        self.series(|s| s.cumulative_cost)
    }

    /// Indoor concentration of `bin` per hour; zeros if the bin does not exist.
    pub fn indoor_pm_series(&self, bin: usize) -> Vec<f64> {
        self.series(|s| s.indoor_pm.get(bin).copied().unwrap_or(0.0))
    }

    pub fn total_cost(&self) -> f64 {
        self.final_state.cumulative_cost
    }

    pub fn replacements(&self) -> u32 {
        self.final_state.replacements
    }

    pub fn degraded_ticks(&self) -> u64 {
        self.final_state.degraded_ticks
    }

    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary::from_output(self)
    }
}

/// Running sums over the ticks of one environment step.
#[derive(Default)]
struct StepTotals {
    pressure: f64,
    drive: f64,
    flow: f64,
    infiltration: f64,
    degraded: u64,
}

/// Dual-rate simulation kernel.
///
/// Owns the read-only model components of one scenario. Each call to
/// [`run`](Self::run) starts a fresh [`SimulationState`] and advances it:
///
/// - outer loop over environment steps (weather lookup, schedules);
/// - inner loop over control ticks: damper → flow balance → filter loading →
///   house pressure/PM → controller → energy;
/// - step close: cost, snapshot, sink.
///
/// # Example
///
/// ```
/// use airtwin::sim::config::ScenarioConfig;
/// use airtwin::sim::engine::SimulationDriver;
/// use airtwin::sim::events::NullSink;
/// use airtwin::weather::table::WeatherTable;
///
/// let config = ScenarioConfig::hepa().with_hours(2);
/// let weather = WeatherTable::constant(2, 21.0, 50.0, vec![20.0, 30.0]);
/// let driver = SimulationDriver::new(config).unwrap();
/// let output = driver.run(&weather, &mut NullSink).unwrap();
/// assert_eq!(output.snapshots.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationDriver {
    config: ScenarioConfig,
    grid: TimeGrid,
    bins: Vec<ParticleBin>,
    fan: FanCurve,
    resistance: ResistanceModel,
    solver: FlowBalanceSolver,
    filter: FilterLoadingTracker,
    house: HouseIntegrator,
    controller: PressureController,
    cost: CostAccumulator,
    exhaust: ExhaustSchedule,
    damper: Option<DamperActuator>,
    drive_scale: Option<DriveScale>,
}

impl SimulationDriver {
    /// Sanitises and validates `config`, then builds every component.
    ///
    /// # Errors
    ///
    /// Scenario-fatal configuration faults: a time grid that cannot nest, a
    /// fan curve with fewer than two usable points, no particle bins.
    pub fn new(mut config: ScenarioConfig) -> Result<Self, SimError> {
        config.sanitize();
        config.validate()?;

        let fan = FanCurve::new(&config.fan_curve)?;
        let resistance = ResistanceModel::new(config.resistance, config.features.resistance_toggles());
        let house = HouseIntegrator::new(&config.house, resistance.clone());
        let exhaust = if config.features.exhaust {
            ExhaustSchedule::new(config.exhaust_events.clone())
        } else {
            ExhaustSchedule::none()
        };

        Ok(Self {
            grid: config.time_grid,
            bins: config.particle_bins(),
            fan,
            resistance,
            solver: FlowBalanceSolver::default(),
            filter: FilterLoadingTracker::new(&config.filter),
            house,
            controller: PressureController::new(config.controller),
            cost: CostAccumulator::new(config.economics),
            exhaust,
            damper: config
                .features
                .damper
                .then(|| DamperActuator::new(config.damper)),
            drive_scale: config.features.discrete_drive.then_some(config.drive_scale),
            config,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn bins(&self) -> &[ParticleBin] {
        &self.bins
    }

    pub fn fan(&self) -> &FanCurve {
        &self.fan
    }

    pub fn resistance(&self) -> &ResistanceModel {
        &self.resistance
    }

    /// State at t = 0.
    pub fn initial_state(&self) -> SimulationState {
        let mut state = SimulationState::new(
            self.bins.len(),
            &self.config.house.initial_indoor_pm,
            self.config.house.initial_pressure_pa,
        );
        state.drive = self.controller.initial_drive();
        state
    }

    /// Runs the scenario over `weather`.
    ///
    /// # Arguments
    /// * `weather` - One record per environment step, with one PM value per bin
    /// * `sink` - Receives lifecycle events, fallbacks and closed steps
    ///
    /// # Errors
    ///
    /// [`SimError::Weather`] if a step has no record and
    /// [`SimError::BinMismatch`] if a record carries the wrong number of bins.
    /// Numerical trouble inside a tick is never an error: it is counted as a
    /// degraded tick and reported to `sink`.
    pub fn run(
        &self,
        weather: &dyn WeatherSource,
        sink: &mut dyn SimulationSink,
    ) -> Result<ScenarioOutput, SimError> {
        let hours = self.grid.hours;
        if weather.num_bins() != self.bins.len() {
            return Err(SimError::BinMismatch {
                hour: 0,
                expected: self.bins.len(),
                found: weather.num_bins(),
            });
        }

        sink.on_event(&SimEvent::ScenarioStarted {
            name: self.config.name.clone(),
            hours,
        });

        let mut state = self.initial_state();
        let mut damper = self.damper.clone();
        let mut snapshots = Vec::with_capacity(hours);

        for hour in 0..hours {
            let record = weather
                .get_hourly_data(hour)
                .map_err(|source| SimError::Weather { hour, source })?;
            if record.num_bins() != self.bins.len() {
                return Err(SimError::BinMismatch {
                    hour,
                    expected: self.bins.len(),
                    found: record.num_bins(),
                });
            }
            let snapshot = self.run_step(hour, &record, &mut state, damper.as_mut(), sink);
            sink.on_hour(&snapshot);
            snapshots.push(snapshot);
        }

        sink.on_event(&SimEvent::ScenarioFinished {
            name: self.config.name.clone(),
            total_cost: state.cumulative_cost,
            degraded_ticks: state.degraded_ticks,
        });

        Ok(ScenarioOutput {
            name: self.config.name.clone(),
            snapshots,
            final_state: state,
        })
    }

    /// Advances one environment step and closes it.
    fn run_step(
        &self,
        hour: usize,
        record: &HourlyWeatherData,
        state: &mut SimulationState,
        mut damper: Option<&mut DamperActuator>,
        sink: &mut dyn SimulationSink,
    ) -> HourlySnapshot {
        let dt = self.grid.control_step_secs;
        let ticks = self.grid.ticks_per_step();
        let hour_of_day = self.grid.hour_of_day(hour);
        let indoor_temp = self.house.indoor_temp_c();
        let outdoor_temp = record.dry_bulb_temp;
        let outdoor_pm: Vec<f64> = (0..self.bins.len()).map(|i| record.pm(i)).collect();

        let exhaust_cfm = self.exhaust.flow_at(hour_of_day);
        let stack_cfm = if self.config.features.stack_effect {
            self.config.stack.flow(
                indoor_temp,
                outdoor_temp,
                self.resistance.leakage_coefficient(),
                self.resistance.leakage_exponent(),
            )
        } else {
            0.0
        };
        if let Some(d) = damper.as_deref_mut() {
            d.command(self.config.damper_schedule.value(hour_of_day));
        }

        let mut totals = StepTotals::default();
        for tick in 0..ticks {
            let damper_multiplier = match damper.as_deref_mut() {
                Some(d) => {
                    if d.advance(dt) {
                        sink.on_event(&SimEvent::DamperRehomed { hour });
                    }
                    d.duct_multiplier()
                }
                None => 1.0,
            };

            // Operating point
            state.applied_drive = match &self.drive_scale {
                Some(scale) => scale.quantize(state.drive),
                None => state.drive,
            };
            let conditions = ResistanceConditions::new(state.total_dust_g).with_damper(damper_multiplier);
            let solution: FlowSolution = self.solver.solve(
                &self.fan,
                &self.resistance,
                state.applied_drive,
                &conditions,
                state.flow_cfm,
            );
            if solution.is_degraded() {
                sink.on_event(&SimEvent::FlowSolveFailed {
                    hour,
                    tick,
                    drive: state.applied_drive,
                });
            }
            state.flow_cfm = solution.flow_cfm;
            state.fan_pressure_pa = solution.pressure_pa;

            // Filter loading
            if let FilterOutcome::Clogged { dust_g, replaced } =
                self.filter
                    .accumulate(state, solution.flow_cfm, &outdoor_pm, &self.bins, dt)
            {
                self.cost.charge_filter(state);
                sink.on_event(&SimEvent::FilterClogged {
                    hour,
                    dust_g,
                    replaced,
                });
            }

            // House pressure and PM
            let inputs = HouseInputs {
                blower_cfm: solution.flow_cfm,
                exhaust_cfm,
                stack_cfm,
                max_blower_cfm: self.fan.max_flow(),
                outdoor_temp_c: outdoor_temp,
                outdoor_pm: &outdoor_pm,
            };
            let house = self.house.step(state, &inputs, &self.bins, dt);
            if !house.pressure_converged {
                sink.on_event(&SimEvent::PressureSolveFailed { hour, tick });
            }
            if house.degraded_bins > 0 {
                sink.on_event(&SimEvent::ConcentrationFallback {
                    hour,
                    bins: house.degraded_bins,
                });
            }

            // Control
            self.controller.update(state, dt);

            // Energy
            self.cost.add_tick(
                state,
                solution.flow_cfm,
                solution.pressure_pa,
                indoor_temp,
                outdoor_temp,
                dt,
            );

            if solution.is_degraded() || house.is_degraded() {
                state.degraded_ticks += 1;
                totals.degraded += 1;
            }
            state.elapsed_secs += dt;
            totals.pressure += state.pressure_pa;
            totals.drive += state.drive;
            totals.flow += solution.flow_cfm;
            totals.infiltration += house.infiltration_cfm;
        }

        let cost = self.cost.close_hour(state, hour_of_day);
        let n = ticks as f64;
        HourlySnapshot {
            hour,
            hour_of_day,
            outdoor_temp_c: outdoor_temp,
            pressure_pa: state.pressure_pa,
            mean_pressure_pa: totals.pressure / n,
            drive: state.drive,
            mean_drive: totals.drive / n,
            controller_engaged: state.controller_engaged,
            flow_cfm: state.flow_cfm,
            mean_flow_cfm: totals.flow / n,
            exhaust_cfm,
            stack_cfm,
            mean_infiltration_cfm: totals.infiltration / n,
            damper_angle_deg: damper.as_deref().map(DamperActuator::angle),
            indoor_pm: state.indoor_pm.clone(),
            outdoor_pm,
            total_dust_g: state.total_dust_g,
            filter_life_pct: state.filter_life_pct,
            filter_phase: state.filter_phase,
            replacements: state.replacements,
            cost,
            cumulative_cost: state.cumulative_cost,
            degraded_ticks: totals.degraded,
        }
    }
}
