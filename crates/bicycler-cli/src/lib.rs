//! Bicycler CLI - command line front end for the bicycle stability simulator.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bicycler_core::{
    parse_override, BicycleModel, BicycleParams, BicycleState, Controller, COLUMN_NAMES,
    DEFAULT_PID_WINDOW,
};
use bicycler_sim::{
    run_sweep, BikeAnimation, RunConfiguration, Simulation, SimulationStatus, SweepSpec,
    SweepTarget, TracingObserver, Trajectory,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Parse `args` (including the program name) and run the selected command.
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let cli = Cli::parse_from(args);
    run(cli)
}

#[derive(Parser, Debug)]
#[command(name = "bicycler")]
#[command(about = "Numeric simulation of bicycle (self-)stability")]
#[command(version)]
pub struct Cli {
    /// Print debug information
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate the bicycle model and save the trajectory
    Simulate(SimulateArgs),
    /// Summarize a saved trajectory
    Info(InfoArgs),
    /// Convert a saved trajectory to CSV or JSON
    Export(ExportArgs),
    /// Run one simulation per value of a parameter or the velocity
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Timestep for the simulation in s
    #[arg(short, long, default_value_t = 0.01)]
    pub timestep: f64,

    /// Number of steps for the simulation
    #[arg(short, long, default_value_t = 500)]
    pub stepcount: usize,

    /// Velocity of the bicycle in m/s
    #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
    pub velocity: f64,

    /// Initial roll angle in degrees
    #[arg(short, long, default_value_t = 5.0, allow_negative_numbers = true)]
    pub roll: f64,

    /// Initial steering angle in degrees
    #[arg(short = 'd', long, default_value_t = -2.0, allow_negative_numbers = true)]
    pub steer: f64,

    /// Controller to use for the simulation
    #[arg(short, long, value_enum, default_value = "none")]
    pub controller: ControllerKind,

    /// Gain of the roll and roll-rate feedback controllers
    #[arg(long, default_value_t = 50.0, allow_negative_numbers = true)]
    pub gain: f64,

    // ── PID gains ─────────────────────────────────────────────
    #[arg(long, default_value_t = 30.0, allow_negative_numbers = true)]
    pub kp: f64,

    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub ki: f64,

    #[arg(long, default_value_t = 3.0, allow_negative_numbers = true)]
    pub kd: f64,

    /// Number of recent errors the windowed PID integrates
    #[arg(long, default_value_t = DEFAULT_PID_WINDOW)]
    pub window: usize,

    // ── Model parameters ──────────────────────────────────────
    /// Vary parameter values of the bicycle model, as NAME=VALUE pairs
    #[arg(long, value_name = "NAME=VALUE", num_args = 1..)]
    pub model_parameters: Vec<String>,

    /// JSON object of parameter values, applied before --model-parameters
    #[arg(long)]
    pub params_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ControllerKind {
    None,
    Roll,
    Rollrate,
    Pid,
    PidWindowed,
    Pd,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Output file for simulation results
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Saved trajectory
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value = "text")]
    pub format: InfoFormat,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Saved trajectory
    #[arg(short, long)]
    pub input: PathBuf,

    /// Destination file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output file format
    #[arg(short, long, value_enum, default_value = "csv")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Parameter to vary: a model parameter name or `velocity`
    #[arg(long)]
    pub param: String,

    #[arg(long, allow_negative_numbers = true)]
    pub from: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub to: f64,

    #[arg(long, default_value_t = 5)]
    pub steps: usize,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InfoFormat {
    Text,
    Json,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Simulate(args) => run_simulate(&args),
        Commands::Info(args) => run_info(&args),
        Commands::Export(args) => run_export(&args),
        Commands::Sweep(args) => run_sweep_command(&args),
    }
}

// ---------------------------------------------------------------------------
// Simulate
// ---------------------------------------------------------------------------
fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let config = build_run_config(&args.run)?;
    tracing::info!(output = %args.output.display(), "simulating bicycle model");

    let mut simulation = Simulation::new(&config).with_observer(TracingObserver);
    let status = simulation.run()?;
    let trajectory = simulation.into_result()?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            tracing::debug!(dir = %parent.display(), "creating output directory");
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    trajectory
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    print_run_stats(&trajectory, status);
    println!("Trajectory written to {:?}", args.output);
    Ok(())
}

fn print_run_stats(trajectory: &Trajectory, status: SimulationStatus) {
    let max_roll = trajectory
        .rows()
        .iter()
        .map(|s| s.roll.abs())
        .fold(0.0, f64::max);
    let final_heading = trajectory.final_state().map_or(0.0, |s| s.heading);

    println!("\nSimulation Stats:");
    println!("  Steps:         {}", trajectory.frame_count());
    println!("  Duration:      {:.2} s", trajectory.duration());
    match status {
        SimulationStatus::Aborted { at_step } => {
            println!("  Outcome:       fell over at step {at_step}")
        }
        _ => println!("  Outcome:       upright"),
    }
    println!("  Max |roll|:    {:.2}°", max_roll.to_degrees());
    println!("  Final heading: {:.2}°", final_heading.to_degrees());
    println!("-----------------------------");
}

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------
fn run_info(args: &InfoArgs) -> Result<()> {
    let trajectory = load(&args.input)?;
    let fall_frame = trajectory.fall_frame();
    let final_state = trajectory.final_state().copied().unwrap_or_default();

    match args.format {
        InfoFormat::Json => {
            let summary = serde_json::json!({
                "frames": trajectory.frame_count(),
                "timestep": trajectory.timestep(),
                "frame_delay_ms": trajectory.frame_delay_ms(),
                "fell_over": fall_frame.is_some(),
                "fall_frame": fall_frame,
                "final_state": final_state,
                "metadata": trajectory.metadata(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        InfoFormat::Text => {
            println!("Trajectory {:?}", args.input);
            println!("  Frames:      {}", trajectory.frame_count());
            println!("  Timestep:    {} ms", trajectory.timestep() * 1000.0);
            match fall_frame {
                Some(frame) => println!("  Fell over:   yes, at frame {frame}"),
                None => println!("  Fell over:   no"),
            }
            println!(
                "  Final state: roll {:.2}°, steer {:.2}°, heading {:.2}°",
                final_state.roll.to_degrees(),
                final_state.steer.to_degrees(),
                final_state.heading.to_degrees()
            );
            println!("Metadata:");
            for (key, value) in trajectory.metadata() {
                println!("  {key}: {value}");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------
fn run_export(args: &ExportArgs) -> Result<()> {
    let trajectory = load(&args.input)?;
    match args.format {
        OutputFormat::Csv => write_csv(&trajectory, &args.output)?,
        OutputFormat::Json => write_json(&trajectory, &args.output)?,
    }
    println!("Data written to {:?}", args.output);
    Ok(())
}

fn write_csv(trajectory: &Trajectory, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["time"];
    header.extend(COLUMN_NAMES);
    wtr.write_record(&header)?;

    let dt = trajectory.timestep();
    for (i, state) in trajectory.rows().iter().enumerate() {
        let mut record = vec![format!("{:.4}", i as f64 * dt)];
        record.extend(state.to_row().iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn write_json(trajectory: &Trajectory, path: &Path) -> Result<()> {
    let document = serde_json::json!({
        "timestep": trajectory.timestep(),
        "frame_delay_ms": trajectory.frame_delay_ms(),
        "metadata": trajectory.metadata(),
        "frames": trajectory.rows(),
    });
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &document)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------
fn run_sweep_command(args: &SweepArgs) -> Result<()> {
    let base = build_run_config(&args.run)?;
    let target = SweepTarget::parse(&args.param)?;
    let spec = SweepSpec::new(target, args.from, args.to, args.steps)?;
    println!("Sweeping {target} from {} to {} in {} runs", args.from, args.to, args.steps);

    let outcomes = run_sweep(&base, &spec)?;

    let path = args.output_dir.join("sweep_summary.csv");
    std::fs::create_dir_all(&args.output_dir)?;
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record([
        target.to_string().as_str(),
        "fell",
        "fall_step",
        "final_roll",
        "final_steer",
        "final_heading",
    ])?;
    for (i, outcome) in outcomes.iter().enumerate() {
        println!(
            "Run {}/{} | {target}: {:.4} -> {}",
            i + 1,
            outcomes.len(),
            outcome.value,
            match outcome.fell_at {
                Some(step) => format!("fell at step {step}"),
                None => "upright".to_string(),
            }
        );
        wtr.write_record(&[
            outcome.value.to_string(),
            outcome.fell().to_string(),
            outcome.fell_at.map(|s| s.to_string()).unwrap_or_default(),
            format!("{:.6}", outcome.final_state.roll),
            format!("{:.6}", outcome.final_state.steer),
            format!("{:.6}", outcome.final_state.heading),
        ])?;
    }
    wtr.flush()?;

    println!("\nSweep complete. Summary at {:?}", path);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load(path: &Path) -> Result<Trajectory> {
    Trajectory::load(path).with_context(|| format!("loading trajectory {}", path.display()))
}

/// Bicycle parameters from the optional JSON file plus command line overrides.
pub fn build_params(args: &RunArgs) -> Result<BicycleParams> {
    let mut params = match &args.params_file {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading parameter file {}", path.display()))?;
            BicycleParams::from_json_str(&json)
                .with_context(|| format!("parsing parameter file {}", path.display()))?
        }
        None => BicycleParams::default(),
    };

    let overrides = args
        .model_parameters
        .iter()
        .map(|spec| parse_override(spec))
        .collect::<Result<Vec<_>, _>>()?;
    params.apply_overrides(overrides)?;
    Ok(params)
}

pub fn build_controller(args: &RunArgs) -> Result<Controller> {
    let controller = match args.controller {
        ControllerKind::None => Controller::none(),
        ControllerKind::Roll => Controller::roll(args.gain),
        ControllerKind::Rollrate => Controller::roll_rate(args.gain),
        ControllerKind::Pid => Controller::pid(args.kp, args.ki, args.kd),
        ControllerKind::PidWindowed => {
            match Controller::pid_windowed(args.kp, args.ki, args.kd, args.window) {
                Some(controller) => controller,
                None => bail!("--window must be at least 1"),
            }
        }
        ControllerKind::Pd => Controller::pd(args.kp, args.kd),
    };
    Ok(controller)
}

pub fn build_run_config(args: &RunArgs) -> Result<RunConfiguration> {
    let model = BicycleModel::new(build_params(args)?)?;
    let initial_state = BicycleState::from_degrees(args.roll, args.steer);
    let config = RunConfiguration::new(
        model,
        initial_state,
        args.velocity,
        build_controller(args)?,
        args.timestep,
        args.stepcount,
    )?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn simulate_args(cli: Cli) -> SimulateArgs {
        match cli.command {
            Commands::Simulate(args) => args,
            other => panic!("expected simulate, got {other:?}"),
        }
    }

    #[test]
    fn test_simulate_defaults() {
        let args = simulate_args(parse(&["bicycler", "simulate", "-o", "out/run.bin"]));
        assert_eq!(args.output, PathBuf::from("out/run.bin"));
        assert_eq!(args.run.timestep, 0.01);
        assert_eq!(args.run.stepcount, 500);
        assert_eq!(args.run.velocity, 5.0);
        assert_eq!(args.run.roll, 5.0);
        assert_eq!(args.run.steer, -2.0);
        assert_eq!(args.run.controller, ControllerKind::None);
        assert_eq!(args.run.window, DEFAULT_PID_WINDOW);

        let config = build_run_config(&args.run).unwrap();
        assert_eq!(config.description()["initial_state"], "roll: 5.0°, steer: -2.0°");
        assert!(config.model().is_default());
    }

    #[test]
    fn test_controller_choices() {
        let cases = [
            ("none", "NoControlController"),
            ("roll", "RollFeedbackController"),
            ("rollrate", "RollRateFeedbackController"),
            ("pid", "RollPIDController"),
            ("pid-windowed", "RollPIDWindowedController"),
            ("pd", "RollPDController"),
        ];
        for (choice, name) in cases {
            let args = simulate_args(parse(&["bicycler", "simulate", "-o", "x", "-c", choice]));
            let controller = build_controller(&args.run).unwrap();
            assert_eq!(bicycler_core::ControlLaw::name(&controller), name);
        }
        assert!(Cli::try_parse_from(["bicycler", "simulate", "-o", "x", "-c", "lqr"]).is_err());
    }

    #[test]
    fn test_gain_reaches_controller() {
        let args = simulate_args(parse(&[
            "bicycler", "simulate", "-o", "x", "-c", "rollrate", "--gain", "12.5",
        ]));
        assert_eq!(build_controller(&args.run).unwrap(), Controller::roll_rate(12.5));

        let args = simulate_args(parse(&[
            "bicycler", "simulate", "-o", "x", "-c", "pid-windowed", "--window", "0",
        ]));
        assert!(build_controller(&args.run).is_err());
    }

    #[test]
    fn test_model_parameters() {
        let args = simulate_args(parse(&[
            "bicycler",
            "simulate",
            "-o",
            "x",
            "--model-parameters",
            "w=1.1",
            "c=0.1",
            "bogus=3",
        ]));
        assert_eq!(args.run.model_parameters.len(), 3);
        let params = build_params(&args.run).unwrap();
        assert_eq!(params.w, 1.1);
        assert_eq!(params.c, 0.1);
        assert_eq!(params.non_default_values().len(), 2);

        let args = simulate_args(parse(&[
            "bicycler",
            "simulate",
            "-o",
            "x",
            "--model-parameters",
            "w=1.1=2",
        ]));
        assert!(build_params(&args.run).is_err());
    }

    #[test]
    fn test_params_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("params.json");
        std::fs::write(&file, r#"{"mB": 72.0, "w": 1.05}"#).unwrap();

        let file_arg = file.to_str().unwrap();
        let args = simulate_args(parse(&[
            "bicycler",
            "simulate",
            "-o",
            "x",
            "--params-file",
            file_arg,
            "--model-parameters",
            "w=1.2",
        ]));
        let params = build_params(&args.run).unwrap();
        assert_eq!(params.m_b, 72.0);
        assert_eq!(params.w, 1.2);
    }

    #[test]
    fn test_negative_values_and_verbose() {
        let cli = parse(&[
            "bicycler", "-v", "simulate", "-o", "x", "-r", "-3", "-d", "4", "--velocity", "-1",
        ]);
        assert!(cli.verbose);
        let args = simulate_args(cli);
        assert_eq!(args.run.roll, -3.0);
        assert_eq!(args.run.steer, 4.0);
        assert_eq!(args.run.velocity, -1.0);
    }

    #[test]
    fn test_invalid_run_settings_are_rejected() {
        let args = simulate_args(parse(&["bicycler", "simulate", "-o", "x", "-s", "0"]));
        assert!(build_run_config(&args.run).is_err());
    }

    #[test]
    fn test_simulate_info_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("nested").join("run.bin");
        let run_arg = run.to_str().unwrap();
        run_cli_main(&[
            "bicycler", "simulate", "-o", run_arg, "-s", "50", "-c", "roll",
        ])
        .unwrap();
        assert!(run.exists());

        run_cli_main(&["bicycler", "info", "-i", run_arg, "--format", "json"]).unwrap();

        let csv_path = dir.path().join("run.csv");
        let csv_arg = csv_path.to_str().unwrap();
        run_cli_main(&["bicycler", "export", "-i", run_arg, "-o", csv_arg]).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("time,roll,steer,roll_rate,steer_rate,steer_torque,heading")
        );
        assert_eq!(lines.count(), 50);

        let json_path = dir.path().join("run.json");
        let json_arg = json_path.to_str().unwrap();
        run_cli_main(&["bicycler", "export", "-i", run_arg, "-o", json_arg, "-f", "json"])
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["frames"].as_array().unwrap().len(), 50);
        assert_eq!(value["metadata"]["stepcount"], "50");
    }

    #[test]
    fn test_sweep_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        run_cli_main(&[
            "bicycler", "sweep", "--param", "velocity", "--from", "1", "--to", "5", "--steps",
            "3", "-s", "200", "--output-dir", out,
        ])
        .unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join("sweep_summary.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "velocity");
        assert_eq!(&headers[1], "fell");
        assert_eq!(reader.records().count(), 3);

        assert!(run_cli_main(&[
            "bicycler", "sweep", "--param", "spokes", "--from", "1", "--to", "2",
        ])
        .is_err());
    }
}
