//! streamprio CLI
//!
//! Runs the queue-priority harness scenarios against the in-process
//! simulated device and reports pass / skip / fail through the exit code.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use streamprio_harness::contract::{check_priority_values, negative_queue_creation};
use streamprio_harness::drivers::{run_all_levels, run_concurrent, run_multi_queue_timing, run_tier_timing};
use streamprio_harness::{HarnessConfig, SyncStrategy, classify, run_suite};
use streamprio_runtime::sim::SimDevice;
use streamprio_runtime::{ComputeBackend, QueueFlags};
use tracing::{debug, error};

mod exit;
mod output;

use output::{ContractSummary, OutputConfig, OutputFormat, RangeSummary};

/// streamprio - queue priority verification harness
#[derive(Parser)]
#[command(name = "streamprio")]
#[command(about = "Submit identical workloads to prioritised queues and verify data and fairness")]
#[command(long_about = r#"
Drives a prioritised asynchronous queue runtime with identical workloads on
queues of different priority, then checks every output element and compares
per-tier timings within a tolerance band.

Examples:
  # Show the simulated device and its priority range
  streamprio info

  # One queue per level plus the default queue, per-queue waits
  streamprio all-levels --flags non-blocking --sync per-queue

  # Low / normal / high tiers, averaged over five trials
  streamprio timing --trials 5

  # Everything, as JSON
  streamprio --format json suite

Exit codes: 0 pass, 1 failure, 2 skipped, 3 data mismatch, 4 fairness violation.
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, value_name = "PATH", global = true, env = "STREAMPRIO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_name = "LEVEL", global = true, default_value = "warn")]
    log_level: String,

    /// Log format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Result format (text, json)
    #[arg(long, value_name = "FORMAT", global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Least urgent priority of the simulated device
    #[arg(long, value_name = "N", global = true, allow_hyphen_values = true)]
    priority_low: Option<i32>,

    /// Most urgent priority of the simulated device
    #[arg(long, value_name = "N", global = true, allow_hyphen_values = true)]
    priority_high: Option<i32>,

    /// Compute-unit threads of the simulated device
    #[arg(long, value_name = "N", global = true)]
    compute_units: Option<usize>,

    /// Extra cost per work unit, in microseconds
    #[arg(long, value_name = "US", global = true)]
    unit_delay_us: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
    Compact,
}

#[derive(Subcommand)]
enum Commands {
    /// Show device properties
    Info,

    /// Show the priority range, its levels and the timing tiers
    Range,

    /// One queue per priority level plus the default queue, square kernel
    #[command(alias = "levels")]
    AllLevels {
        /// Queue flags (default, non-blocking)
        #[arg(long, default_value = "default")]
        flags: QueueFlags,
        /// Wait strategy (device, per-queue); defaults to the config value
        #[arg(long)]
        sync: Option<SyncStrategy>,
        /// Elements per queue
        #[arg(long)]
        elements: Option<usize>,
    },

    /// Low / normal / high tier timing with a fairness check
    Timing {
        /// Several queues per tier, data sanity only
        #[arg(long)]
        multi: bool,
        /// Trials averaged before the fairness check
        #[arg(long)]
        trials: Option<u32>,
        /// Fairness tolerance factor
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Worker threads sharing one pool of priority queues
    Concurrent {
        /// Queue flags (default, non-blocking)
        #[arg(long, default_value = "default")]
        flags: QueueFlags,
        /// Worker thread count
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Priority read-back and negative queue-creation checks
    Contract,

    /// Run every scenario
    Suite,

    /// Print the effective configuration as TOML
    Config,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            exit::for_error(&e)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    setup_logging(&cli.log_level, cli.log_format)?;
    let mut config = load_config(&cli)?;
    let out = OutputConfig { format: cli.format };

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config).context("failed to render configuration")?);
            return Ok(exit::EXIT_SUCCESS);
        }
        Commands::AllLevels { elements: Some(n), .. } => config.elements_per_queue = n,
        Commands::Timing { trials, tolerance, .. } => {
            config.fairness_trials = trials.unwrap_or(config.fairness_trials);
            config.fairness_tolerance = tolerance.unwrap_or(config.fairness_tolerance);
        }
        Commands::Concurrent { workers: Some(n), .. } => config.worker_threads = n,
        _ => {}
    }
    config.validate().context("invalid configuration")?;
    debug!(?config, "effective configuration");

    let device = SimDevice::new(config.device.clone()).context("failed to start simulated device")?;

    match cli.command {
        Commands::Info => {
            out.emit_result(&device.device_properties()?, output::print_device)?;
            Ok(exit::EXIT_SUCCESS)
        }
        Commands::Range => {
            let range = device.priority_range()?;
            let summary = RangeSummary {
                range,
                supported: range.is_supported(),
                level_count: range.level_count(),
                levels: range.levels().collect(),
                tiers: classify(range),
            };
            out.emit_result(&summary, output::print_range)?;
            Ok(exit::EXIT_SUCCESS)
        }
        Commands::AllLevels { flags, sync, .. } => {
            let sync = sync.unwrap_or(config.sync_strategy);
            let outcome = run_all_levels(&device, &config, flags, sync)?;
            out.emit_outcome(&outcome, output::print_all_levels)
        }
        Commands::Timing { multi: true, .. } => {
            out.emit_outcome(&run_multi_queue_timing(&device, &config)?, output::print_multi_queue_timing)
        }
        Commands::Timing { multi: false, .. } => {
            out.emit_outcome(&run_tier_timing(&device, &config)?, output::print_tier_timing)
        }
        Commands::Concurrent { flags, .. } => {
            out.emit_outcome(&run_concurrent(&device, &config, flags)?, output::print_concurrent)
        }
        Commands::Contract => {
            let summary = ContractSummary {
                priority_values: check_priority_values(&device)?,
                negative_create: negative_queue_creation(&device)?,
            };
            out.emit_result(&summary, output::print_contract)?;
            Ok(if summary.negative_create.is_skipped() { exit::EXIT_SKIPPED } else { exit::EXIT_SUCCESS })
        }
        Commands::Suite => {
            let report = run_suite(&device, &config)?;
            out.emit_result(&report, output::print_suite)?;
            Ok(match report.first_failure() {
                Some(failed) => failed.failure.map_or(exit::EXIT_GENERIC_FAIL, exit::for_failure),
                None if report.all_skipped() => exit::EXIT_SKIPPED,
                None => exit::EXIT_SUCCESS,
            })
        }
        Commands::Config => Ok(exit::EXIT_SUCCESS),
    }
}

/// File (if given) or defaults, then `STREAMPRIO_*` variables, then flags.
fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => HarnessConfig::from_env().context("failed to read STREAMPRIO_* environment")?,
    };
    if let Some(low) = cli.priority_low {
        config.device.priority_low = low;
    }
    if let Some(high) = cli.priority_high {
        config.device.priority_high = high;
    }
    if let Some(units) = cli.compute_units {
        config.device.compute_units = units;
    }
    if let Some(delay) = cli.unit_delay_us {
        config.device.unit_delay_us = delay;
    }
    Ok(config)
}

/// Logs go to stderr so JSON results on stdout stay parseable.
fn setup_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);

    match format {
        LogFormat::Json => subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).init(),
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Text => subscriber.init(),
    }
    Ok(())
}
