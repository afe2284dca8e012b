use std::path::PathBuf;

use airtwin::sim::batch::run_parallel_with;
use airtwin::sim::config::BinConfig;
use airtwin::sim::engine::ScenarioOutput;
use airtwin::{
    ComparisonReport, LogSink, NullSink, ScenarioConfig, SimulationDriver, SimulationSink, SyntheticWeather,
    WeatherSource, WeatherTable,
};
use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

#[derive(Parser)]
#[command(name = "airtwin")]
#[command(about = "Residential HVAC pressure and filtration digital twin", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Standard,
    Hepa,
}

impl Preset {
    fn config(self) -> ScenarioConfig {
        match self {
            Preset::Standard => ScenarioConfig::standard(),
            Preset::Hepa => ScenarioConfig::hepa(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Json,
    Csv,
}

#[derive(clap::Args)]
struct WeatherArgs {
    /// Weather table (temp_c, rh, pm_<bin> columns); synthetic weather when absent
    #[arg(short, long)]
    weather: Option<PathBuf>,

    /// Baseline outdoor PM per bin for synthetic weather (µg/m³)
    #[arg(long, value_delimiter = ',')]
    pm: Option<Vec<f64>>,

    /// Simulated hours (defaults to the scenario, or the table length)
    #[arg(long)]
    hours: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a single scenario
    Run {
        /// Built-in scenario
        #[arg(short, long, value_enum, default_value = "standard")]
        preset: Preset,

        /// JSON scenario file (overrides the preset)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        weather: WeatherArgs,

        /// Log every event and closed hour
        #[arg(long)]
        trace: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: Format,

        /// Output file path
        #[arg(short, long)]
        output_file: Option<PathBuf>,
    },
    /// Runs the standard and HEPA presets side by side
    Compare {
        #[command(flatten)]
        weather: WeatherArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: Format,

        /// Output file path
        #[arg(short, long)]
        output_file: Option<PathBuf>,
    },
    /// Prints a preset as JSON, as a starting point for a scenario file
    Preset {
        #[arg(value_enum)]
        preset: Preset,
    },
}

/// Particle bins named by a weather table's `pm_<diameter>` columns.
fn bins_from_labels(labels: &[String]) -> anyhow::Result<Vec<BinConfig>> {
    labels
        .iter()
        .map(|label| match label.parse::<f64>() {
            Ok(d) if d.is_finite() && d > 0.0 => Ok(BinConfig::new(d)),
            _ => bail!(
                "weather column pm_{} does not name a particle diameter in µm; \
                 use a scenario file whose bins match the table",
                label
            ),
        })
        .collect()
}

/// Resolves the weather series and aligns the scenario length and bins with it.
fn load_weather(
    args: &WeatherArgs,
    config: &mut ScenarioConfig,
) -> anyhow::Result<Box<dyn WeatherSource + Sync>> {
    match &args.weather {
        Some(path) => {
            let table = WeatherTable::from_file(path)?;
            config.time_grid.hours = args.hours.unwrap_or_else(|| table.num_hours());
            if table.num_bins() != config.bins.len() {
                config.bins = bins_from_labels(table.bin_labels())?;
                info!(
                    "Scenario bins taken from the weather table: {}",
                    table.bin_labels().join(", ")
                );
            }
            info!(
                "Loaded {} hours, {} PM bin(s) from {}",
                table.num_hours(),
                table.num_bins(),
                path.display()
            );
            Ok(Box::new(table))
        }
        None => {
            if let Some(hours) = args.hours {
                config.time_grid.hours = hours;
            }
            let base_pm = match &args.pm {
                Some(pm) if pm.len() != config.bins.len() => bail!(
                    "--pm gives {} value(s) but the scenario has {} particle bin(s)",
                    pm.len(),
                    config.bins.len()
                ),
                Some(pm) => pm.clone(),
                None => vec![12.0; config.bins.len()],
            };
            Ok(Box::new(SyntheticWeather::new(base_pm, config.time_grid.hours)))
        }
    }
}

fn hourly_csv(output: &ScenarioOutput) -> String {
    let bins = output.final_state.num_bins();
    let mut csv = String::from("hour,pressure_pa,drive,flow_cfm,filter_life_pct,replacements,hour_cost,cumulative_cost");
    for i in 0..bins {
        csv.push_str(&format!(",indoor_pm_{}", i));
    }
    csv.push('\n');
    for s in &output.snapshots {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}",
            s.hour,
            s.pressure_pa,
            s.drive,
            s.flow_cfm,
            s.filter_life_pct,
            s.replacements,
            s.cost.total(),
            s.cumulative_cost
        ));
        for pm in &s.indoor_pm {
            csv.push_str(&format!(",{}", pm));
        }
        csv.push('\n');
    }
    csv
}

fn emit(output: String, output_file: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(path) = output_file {
        std::fs::write(&path, output)?;
        println!("Report saved to {:?}", path);
    } else {
        println!("{}", output);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            preset,
            config,
            weather,
            trace,
            format,
            output_file,
        } => {
            let mut scenario = match config {
                Some(path) => ScenarioConfig::from_file(path)?,
                None => preset.config(),
            };
            let source = load_weather(&weather, &mut scenario)?;
            let driver = SimulationDriver::new(scenario)?;

            let mut log_sink = LogSink;
            let mut null_sink = NullSink;
            let sink: &mut dyn SimulationSink = if trace { &mut log_sink } else { &mut null_sink };
            let output = driver.run(source.as_ref(), sink)?;

            let rendered = match format {
                Format::Markdown => output.summary().to_markdown(),
                Format::Json => output.summary().to_json()?,
                Format::Csv => hourly_csv(&output),
            };
            emit(rendered, output_file)?;
        }
        Commands::Compare {
            weather,
            format,
            output_file,
        } => {
            let mut base = ScenarioConfig::standard();
            let source = load_weather(&weather, &mut base)?;
            let mut hepa = ScenarioConfig::hepa().with_hours(base.time_grid.hours);
            hepa.bins = base.bins.clone();
            let configs = [base, hepa];

            let mut report = ComparisonReport::new();
            for result in run_parallel_with(&configs, source.as_ref(), || LogSink) {
                let (output, _) = result?;
                report.add(output.summary());
            }

            let rendered = match format {
                Format::Markdown => report.to_markdown(),
                Format::Json => report.to_json()?,
                Format::Csv => report.to_csv(),
            };
            emit(rendered, output_file)?;
        }
        Commands::Preset { preset } => {
            println!("{}", preset.config().to_json()?);
        }
    }

    Ok(())
}
