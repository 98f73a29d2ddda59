//! Balance control simulation CLI.
//!
//! Provides two modes of operation:
//! - `simulate`: Run one plant/controller scenario and optionally export CSV
//! - `analyze`: Print open-loop and closed-loop diagnostics for the plants

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

use balance_control::config::default_poles;
use balance_control::placement::real_poles;
use balance_control::{
    Ackermann, AnalysisReport, ControllerConfig, ControllerKind, LqrConfig, SignFunctionCare,
};
use balance_core::config::SimConfig;
use balance_core::error::{BalanceError, ConfigError};
use balance_sim::{PlantConfig, PlantKind, Scenario, Trajectory};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Closed-loop control of balancing plants.
#[derive(Parser)]
#[command(name = "balance", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print a summary.
    Simulate(SimulateArgs),

    /// Print eigenvalues and controllability of the linearized plants.
    Analyze {
        /// Plant to analyze; both when omitted.
        #[arg(short, long)]
        plant: Option<PlantKind>,
    },
}

#[derive(Args)]
struct SimulateArgs {
    /// Scenario TOML file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plant to simulate (cart_pendulum or robot).
    #[arg(short, long)]
    plant: Option<PlantKind>,

    /// Controller (pid, pole_placement, lqr, finite_horizon, mpc).
    #[arg(long)]
    controller: Option<ControllerKind>,

    /// Number of frames to simulate.
    #[arg(short, long)]
    frames: Option<usize>,

    /// Desired cart position (m).
    #[arg(short, long)]
    desired_position: Option<f64>,

    /// Stop at the first bounds violation and report the reward.
    #[arg(long)]
    episode: bool,

    /// Write the trajectory as CSV.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn load_scenario(args: &SimulateArgs) -> Result<Scenario, BalanceError> {
    let mut scenario = match &args.config {
        Some(path) => Scenario::from_file(path)?,
        None => Scenario::default(),
    };

    if let Some(kind) = args.plant {
        if kind != scenario.plant.kind {
            scenario.plant = PlantConfig::new(kind);
        }
    }
    if let Some(kind) = args.controller {
        if scenario.controller.as_ref().is_none_or(|c| c.kind != kind) {
            scenario.controller = Some(ControllerConfig::new(kind));
        }
    }
    if let Some(position) = args.desired_position {
        if let Some(config) = &mut scenario.controller {
            config.desired_position = position;
        }
    }
    if let Some(frames) = args.frames {
        scenario.sim.frames = frames;
    }
    scenario.validate()?;
    Ok(scenario)
}

fn run_simulate(args: &SimulateArgs) -> Result<(), BalanceError> {
    let scenario = load_scenario(args)?;
    let mut sim = scenario.build()?;

    let (trajectory, episode) = if args.episode {
        let result = sim.run_episode();
        (result.trajectory, Some((result.reward, result.terminated)))
    } else {
        (sim.run(), None)
    };

    println!(
        "plant={}, controller={}, frames={}, dt={}s",
        sim.plant().name(),
        sim.controller().map_or("none", |c| c.name()),
        trajectory.len(),
        sim.plant().dt()
    );
    if let Some(state) = trajectory.final_state() {
        let labels = &trajectory.labels;
        let values: Vec<String> = labels
            .iter()
            .zip(state.iter())
            .map(|(label, v)| format!("{label}={v:.4}"))
            .collect();
        println!("final state: {}", values.join(", "));
    }
    if let Some((reward, terminated)) = episode {
        println!("episode: reward={reward:.1}, terminated={terminated}");
    }

    let stats = sim.stats();
    if stats.ticks > 0 {
        println!(
            "controller: ticks={}, overruns={}, fallbacks={}, mean={:?}, max={:?}",
            stats.ticks,
            stats.overruns,
            stats.solver_fallbacks,
            stats.mean_compute().unwrap_or_default(),
            stats.max_compute
        );
    }

    if let Some(path) = &args.output {
        write_csv(&trajectory, path)?;
        println!("trajectory written to {}", path.display());
    }
    Ok(())
}

fn write_csv(trajectory: &Trajectory, path: &Path) -> Result<(), BalanceError> {
    trajectory
        .write_csv(path)
        .map_err(|err| BalanceError::Config(ConfigError::Io(err)))
}

fn run_analyze(plant: Option<PlantKind>) -> Result<(), BalanceError> {
    let kinds = plant.map_or(PlantKind::ALL.to_vec(), |kind| vec![kind]);
    let sim = SimConfig::default();

    for (i, kind) in kinds.into_iter().enumerate() {
        let plant = PlantConfig::new(kind).build(&sim)?;
        let model = plant.model();
        let lqr = LqrConfig::for_layout(model.layout());
        let report = AnalysisReport::build(
            plant.name(),
            model,
            &real_poles(&default_poles(model.layout())),
            &Ackermann,
            &lqr.q_matrix(model.state_dim())?,
            &lqr.r_matrix()?,
            &SignFunctionCare::default(),
        );
        if i > 0 {
            println!();
        }
        print!("{report}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Simulate(args) => run_simulate(&args),
        Commands::Analyze { plant } => run_analyze(plant),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
