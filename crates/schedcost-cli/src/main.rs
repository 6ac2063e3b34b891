//! schedcost entry point.
//!
//! Parses the command line, resolves the benchmark configuration, runs the
//! selected experiment through `schedcost-harness`, and prints the report on
//! stdout. All diagnostics go to stderr so stdout stays machine-parseable.

mod report;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use schedcost_common::{BenchConfig, CorruptionPolicy, EvictorKind, ExperimentKind};
use schedcost_harness::experiments::{
    run_cache_fill, run_interference, run_migration, run_preemption,
};
use schedcost_harness::{validate_cores, PolynomialWorkload};
use tracing::{info, warn};

use crate::report::{format_interference_csv, format_preemption_trace, format_report};

/// schedcost command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "schedcost",
    about = "Micro-benchmarks for OS scheduler costs on real-time Linux",
    version,
    long_about = None
)]
struct Args {
    /// Path to a benchmark configuration file (TOML)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of trials per run (overrides the config file)
    #[arg(short = 'n', long)]
    trials: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    experiment: Option<Command>,
}

/// Experiment selection. Without a subcommand the configured experiment runs.
#[derive(Subcommand, Debug)]
enum Command {
    /// Voluntary-preemption latency between two cooperating threads
    Preemption {
        /// Core both measurement threads are pinned to
        #[arg(long)]
        core: Option<usize>,

        /// Print the full timestamp trace even when every trial is clean
        #[arg(long)]
        dump_trace: bool,
    },
    /// Latency of forcing one thread from one core onto another
    Migration {
        /// Core the thread starts each trial on
        #[arg(long)]
        initial_core: Option<usize>,

        /// Core the thread is forced onto mid-trial
        #[arg(long)]
        final_core: Option<usize>,
    },
    /// Refill cost of sweeping a half-L2 buffer after eviction
    CacheFill {
        /// Core the sweeping thread is pinned to
        #[arg(long)]
        core: Option<usize>,

        /// Eviction mechanism: flush or device
        #[arg(long)]
        evictor: Option<String>,

        /// Device node opened by the device evictor
        #[arg(long)]
        device_path: Option<String>,
    },
    /// Scheduler accounting around a CPU-bound workload
    Interference {
        /// Core the workload threads are pinned to
        #[arg(long)]
        core: Option<usize>,

        /// Workload iterations per thread
        #[arg(long)]
        iterations: Option<u64>,

        /// Run a second contending thread on the same core
        #[arg(long)]
        contended: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting schedcost");

    let mut config = load_config(&args)?;
    apply_overrides(&mut config, &args)?;
    config.validate().context("invalid configuration")?;
    validate_cores(&config).context("host cannot run the configured experiment")?;

    info!(
        experiment = %config.experiment,
        trials = config.trials,
        "Configuration resolved"
    );

    match config.experiment {
        ExperimentKind::Preemption => run_preemption_cmd(&config),
        ExperimentKind::Migration => run_migration_cmd(&config),
        ExperimentKind::CacheFill => run_cache_fill_cmd(&config),
        ExperimentKind::Interference => run_interference_cmd(&config),
    }
}

/// Initialize logging with the specified log level.
///
/// Diagnostics go to stderr. Stdout is reserved for the fixed-format report
/// so it can be redirected or parsed without filtering.
fn init_logging(level: &str) {
    let filter = format!(
        "schedcost_cli={},schedcost_harness={},schedcost_common={}",
        level, level, level
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `SCHEDCOST_CONFIG` environment variable
/// 3. `/etc/schedcost/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<BenchConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return BenchConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Ok(env_path) = std::env::var("SCHEDCOST_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from SCHEDCOST_CONFIG");
            return BenchConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from SCHEDCOST_CONFIG={env_path}")
            });
        }
        warn!(
            path = %env_path,
            "SCHEDCOST_CONFIG set but file does not exist, checking other locations"
        );
    }

    let system_path = PathBuf::from("/etc/schedcost/config.toml");
    if system_path.exists() {
        info!(config_path = %system_path.display(), "Loading config from system path");
        return BenchConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {}", system_path.display()));
    }

    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(config_path = %local_path.display(), "Loading config from local path");
        return BenchConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {}", local_path.display()));
    }

    info!("No config file found, using built-in defaults");
    Ok(BenchConfig::default())
}

/// Fold command-line overrides into the loaded configuration. A subcommand
/// also selects the experiment, replacing whatever the file configured.
fn apply_overrides(config: &mut BenchConfig, args: &Args) -> Result<()> {
    if let Some(trials) = args.trials {
        config.trials = trials;
    }

    match &args.experiment {
        None => {}
        Some(Command::Preemption { core, dump_trace }) => {
            config.experiment = ExperimentKind::Preemption;
            if let Some(core) = core {
                config.preemption.core = *core;
            }
            if *dump_trace {
                config.preemption.dump_trace = true;
            }
        }
        Some(Command::Migration {
            initial_core,
            final_core,
        }) => {
            config.experiment = ExperimentKind::Migration;
            if let Some(core) = initial_core {
                config.migration.initial_core = *core;
            }
            if let Some(core) = final_core {
                config.migration.final_core = *core;
            }
        }
        Some(Command::CacheFill {
            core,
            evictor,
            device_path,
        }) => {
            config.experiment = ExperimentKind::CacheFill;
            if let Some(core) = core {
                config.cache_fill.core = *core;
            }
            if let Some(evictor) = evictor {
                config.cache_fill.evictor = parse_evictor(evictor)?;
            }
            if let Some(path) = device_path {
                config.cache_fill.device_path = path.clone();
            }
        }
        Some(Command::Interference {
            core,
            iterations,
            contended,
        }) => {
            config.experiment = ExperimentKind::Interference;
            if let Some(core) = core {
                config.interference.core = *core;
            }
            if let Some(iterations) = iterations {
                config.interference.iterations = *iterations;
            }
            if *contended {
                config.interference.contended = true;
            }
        }
    }

    Ok(())
}

fn parse_evictor(raw: &str) -> Result<EvictorKind> {
    match raw {
        "flush" => Ok(EvictorKind::Flush),
        "device" => Ok(EvictorKind::Device),
        other => bail!("unknown evictor {other:?}, expected \"flush\" or \"device\""),
    }
}

fn run_preemption_cmd(config: &BenchConfig) -> Result<()> {
    let outcome = run_preemption(config).context("preemption experiment failed")?;
    let first_corrupt = outcome.corrupt_trials.first().copied();

    if let Some(first) = first_corrupt {
        if config.preemption.on_corruption == CorruptionPolicy::Abort {
            print!("{}", format_preemption_trace(&outcome.arena, Some(first)));
            bail!(
                "preemption trial {first} is corrupted: measurement timestamps \
                 contradict the yield protocol"
            );
        }
        warn!(
            count = outcome.corrupt_trials.len(),
            first, "statistics include corrupted trials"
        );
    }

    print!(
        "{}",
        format_report(ExperimentKind::Preemption, &outcome.report)
    );
    if config.preemption.dump_trace || first_corrupt.is_some() {
        print!("{}", format_preemption_trace(&outcome.arena, first_corrupt));
    }
    Ok(())
}

fn run_migration_cmd(config: &BenchConfig) -> Result<()> {
    let outcome = run_migration(config).context("migration experiment failed")?;
    print!(
        "{}",
        format_report(ExperimentKind::Migration, &outcome.report)
    );
    Ok(())
}

fn run_cache_fill_cmd(config: &BenchConfig) -> Result<()> {
    let outcome = run_cache_fill(config).context("cache-fill experiment failed")?;
    print!(
        "{}",
        format_report(ExperimentKind::CacheFill, &outcome.report)
    );
    Ok(())
}

fn run_interference_cmd(config: &BenchConfig) -> Result<()> {
    let workload = PolynomialWorkload::new();
    let outcome = run_interference(config, &workload).context("interference experiment failed")?;
    print!("{}", format_interference_csv(&outcome.usage));
    Ok(())
}
