//! survival-tune CLI
//!
//! ```bash
//! # make a cohort to play with
//! survival-tune synth --out cohort.bin --samples 500 --features 6
//!
//! # tune on it
//! survival-tune tune --data cohort.bin --method sobol --nevals 32
//!
//! # everything from a config file, result saved as json
//! survival-tune tune --config tune.json --json-out result.json
//!
//! # keep the flags for a rerun
//! survival-tune tune --data cohort.bin --nfolds 5 --save-config tune.json
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use survival_tune::{save_dataset, synthetic_dataset, tune_from_file, SurvError, TuningConfig};

#[derive(Parser, Debug)]
#[command(
    name = "survival-tune",
    version,
    about = "Cross-validated hyperparameter search for deep Cox survival networks"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (per candidate and per fold)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search hyperparameters on a dataset file
    Tune(TuneArgs),
    /// Write a synthetic proportional-hazards dataset
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
struct TuneArgs {
    /// Dataset file: (features, outcomes), bincode or .json
    #[arg(long)]
    data: Option<PathBuf>,
    /// JSON tuning config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// grid search | random search | sobol | particle swarm
    #[arg(long)]
    method: Option<String>,
    #[arg(long)]
    nfolds: Option<usize>,
    #[arg(long)]
    nevals: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Save the full result (optimum, parameters, search log) as JSON
    #[arg(long, value_name = "PATH")]
    json_out: Option<PathBuf>,
    /// Write the resolved config (file + flags) for reruns
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SynthArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 500)]
    samples: usize,
    #[arg(long, default_value_t = 6)]
    features: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// config file first, then flags on top
fn resolve_config(args: &TuneArgs) -> Result<TuningConfig, SurvError> {
    let mut config = match &args.config {
        Some(path) => TuningConfig::from_file(path)?,
        None => TuningConfig::default(),
    };

    if let Some(data) = &args.data {
        config.data = Some(data.clone());
    }
    if let Some(method) = &args.method {
        config.method = method.clone();
    }
    if let Some(nfolds) = args.nfolds {
        config.nfolds = nfolds;
    }
    if let Some(nevals) = args.nevals {
        config.nevals = nevals;
    }
    if let Some(seed) = args.seed {
        config.settings.seed = seed;
    }
    // the cli always has cores to spare
    if args.config.is_none() {
        config.settings.parallel = true;
    }

    Ok(config)
}

fn cmd_tune(args: TuneArgs) -> Result<(), SurvError> {
    let config = resolve_config(&args)?;
    if let Some(path) = &args.save_config {
        config.to_file(path)?;
        info!(path = %path.display(), "wrote tuning config");
    }

    let data = config
        .data
        .clone()
        .ok_or_else(|| SurvError::invalid_parameter("data", "no dataset file given (--data or config)"))?;

    let result = tune_from_file(&data, &config)?;
    result.print();

    if let Some(path) = args.json_out {
        fs::write(&path, serde_json::to_string_pretty(&result)?)?;
        info!(path = %path.display(), "wrote tuning result");
    }
    Ok(())
}

fn cmd_synth(args: SynthArgs) -> Result<(), SurvError> {
    let (features, outcomes) = synthetic_dataset(args.samples, args.features, args.seed)?;
    save_dataset(&args.out, &features, &outcomes)?;
    info!(
        path = %args.out.display(),
        samples = args.samples,
        features = args.features,
        events = outcomes.column(1).sum(),
        "wrote synthetic dataset"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let outcome = match cli.command {
        Command::Tune(args) => cmd_tune(args),
        Command::Synth(args) => cmd_synth(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
