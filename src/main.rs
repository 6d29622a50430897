use platesim::{ScenarioConfig, Scenario, TableWriter};
use platesim::{write_series_table, write_settlement_svg};
use platesim::{bench_collider, bench_step};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(about = "DEM plate load test on a sphere packing")]
struct Args {
    /// Scenario file, looked up in `scenarios/` unless the path exists as given
    #[arg(short, default_value = "bearing_granular.yaml")]
    file_name: String,

    /// Directory for the result table and plot
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Run the collider and step benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let direct = PathBuf::from(file_name);
    let config_path = if direct.exists() {
        direct
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };
    let file = File::open(&config_path)
        .with_context(|| format!("opening scenario {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("parsing scenario {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn export(out_dir: &Path, scenario: &str, series: &platesim::Series) {
    let table = out_dir.join("bearing_capacity_results.txt");
    if let Err(e) = write_series_table(&table, series) {
        warn!("could not write {}: {e}", table.display());
    }
    let plot = out_dir.join("bearing_capacity_plot.svg");
    if let Err(e) = write_settlement_svg(&plot, series, &format!("Settlement, {scenario}")) {
        warn!("could not write {}: {e}", plot.display());
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.bench {
        bench_collider();
        bench_step();
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let scenario = Scenario::prepare(&scenario_cfg)?;
    let live = TableWriter::new(args.output_dir.join("bearing_capacity_live.txt"));
    let mut sim = scenario.into_simulation().with_sink(live);

    // instability and configuration errors end the run, but whatever was
    // sampled before the abort is still exported
    let outcome = sim.run();
    export(&args.output_dir, &args.file_name, sim.series());

    let state = outcome?;
    match sim.series().last() {
        Some(last) => info!(
            "{state:?}: final settlement {:.6e} m at step {}",
            last.displacement, last.step
        ),
        None => info!("{state:?}: no samples recorded"),
    }

    Ok(())
}
