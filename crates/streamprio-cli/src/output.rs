//! Output rendering for CLI commands.
//!
//! `--format json` writes one pretty-printed JSON document to stdout;
//! `--format text` writes a short human summary. Logs always go to stderr.

use std::io::Write;

use serde::Serialize;
use streamprio_harness::contract::{NegativeCreationReport, PriorityReadbackReport};
use streamprio_harness::drivers::{AllLevelsReport, ConcurrentReport, MultiQueueTimingReport, TierTimingReport};
use streamprio_harness::{Outcome, ScenarioStatus, SuiteReport, TierDescriptor};
use streamprio_runtime::{DeviceProperties, PriorityRange};

use crate::exit::{EXIT_SKIPPED, EXIT_SUCCESS};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}'. Expected one of: text, json")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

impl OutputConfig {
    /// Emit a final result value. In JSON mode it is serialized to stdout;
    /// in text mode `text_fn` renders it.
    pub fn emit_result<T: Serialize>(&self, value: &T, text_fn: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value)?;
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{json}")?;
            }
            OutputFormat::Text => text_fn(value),
        }
        Ok(())
    }

    /// [`emit_result`](Self::emit_result) for a scenario outcome; returns the
    /// exit code (skips are distinguishable from passes).
    pub fn emit_outcome<T: Serialize>(&self, outcome: &Outcome<T>, text_fn: impl FnOnce(&T)) -> anyhow::Result<i32> {
        self.emit_result(outcome, |o| match o {
            Outcome::Completed(value) => text_fn(value),
            Outcome::Skipped(reason) => println!("SKIPPED: {reason}"),
        })?;
        Ok(if outcome.is_skipped() { EXIT_SKIPPED } else { EXIT_SUCCESS })
    }
}

pub fn print_device(p: &DeviceProperties) {
    println!("  Device:          {} (index {})", p.name, p.index);
    println!("  Compute units:   {}", p.compute_units);
    println!("  Max block size:  {}", p.max_threads_per_block);
    println!("  Priority range:  {}", p.priority_range);
}

#[derive(Debug, Serialize)]
pub struct RangeSummary {
    pub range: PriorityRange,
    pub supported: bool,
    pub level_count: usize,
    pub levels: Vec<i32>,
    pub tiers: Vec<TierDescriptor>,
}

pub fn print_range(r: &RangeSummary) {
    println!("  Range:     {}", r.range);
    println!("  Supported: {}", r.supported);
    println!("  Levels:    {} {:?}", r.level_count, r.levels);
    let tiers: Vec<String> = r.tiers.iter().map(ToString::to_string).collect();
    println!("  Tiers:     {}", tiers.join(" "));
}

pub fn print_all_levels(r: &AllLevelsReport) {
    println!("PASS all-levels flags={} sync={}", r.flags, r.sync);
    for s in &r.slots {
        let queue = s.queue.to_string();
        println!("  slot {:<2} {queue:<14} priority {:>4}  {} elements", s.slot, s.priority, s.elements);
    }
}

pub fn print_tier_timing(r: &TierTimingReport) {
    println!("PASS tier-timing ({} trial(s))", r.trials);
    for t in &r.tiers {
        println!("  {:<6} priority {:>4}  {:>10.3} ms", t.tier.to_string(), t.priority, t.elapsed_ms);
    }
    for v in &r.verdicts {
        println!(
            "  {} <= {} x {}: {:.3} <= {:.3}",
            v.higher,
            v.tolerance,
            v.lower,
            v.higher_ms,
            v.tolerance * v.lower_ms
        );
    }
}

pub fn print_multi_queue_timing(r: &MultiQueueTimingReport) {
    println!("PASS multi-queue-timing ({} queue(s) per tier)", r.queues_per_tier);
    for t in &r.queues {
        println!("  {:<6} {:<10} {:>10.3} ms", t.tier.to_string(), t.queue.to_string(), t.elapsed_ms);
    }
}

pub fn print_concurrent(r: &ConcurrentReport) {
    println!(
        "PASS concurrent flags={} workers={} queues={} elements/queue={}",
        r.flags,
        r.workers,
        r.queues.len(),
        r.elements_per_queue
    );
}

#[derive(Debug, Serialize)]
pub struct ContractSummary {
    pub priority_values: PriorityReadbackReport,
    pub negative_create: Outcome<NegativeCreationReport>,
}

pub fn print_contract(c: &ContractSummary) {
    println!(
        "PASS priority-values ({} case(s) on {} device(s))",
        c.priority_values.cases.len(),
        c.priority_values.devices
    );
    match &c.negative_create {
        Outcome::Completed(r) => {
            for check in &r.checks {
                println!("PASS {} -> {}", check.call, check.expected);
            }
        }
        Outcome::Skipped(reason) => println!("SKIPPED negative-create: {reason}"),
    }
}

pub fn print_suite(r: &SuiteReport) {
    print_device(&r.device);
    for s in &r.scenarios {
        let tag = match s.status {
            ScenarioStatus::Passed => "PASS",
            ScenarioStatus::Skipped => "SKIP",
            ScenarioStatus::Failed => "FAIL",
        };
        match &s.detail {
            Some(detail) => println!("{tag} {}: {detail}", s.name),
            None => println!("{tag} {}", s.name),
        }
    }
    println!(
        "{} passed, {} skipped, {} failed",
        r.count(ScenarioStatus::Passed),
        r.count(ScenarioStatus::Skipped),
        r.count(ScenarioStatus::Failed)
    );
}
