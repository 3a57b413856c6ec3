//! Tier timing: low / normal / high queues racing the same chunked copy.

use serde::Serialize;
use streamprio_runtime::{ComputeBackend, ElementOp, LaunchConfig, QueueFlags, QueueId};
use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::owned::{OwnedEvent, OwnedQueue};
use crate::resolver::supported_or_return;
use crate::tiers::{TierName, classify};
use crate::validator::{FairnessVerdict, check_fairness, fairness_verdicts};
use crate::workload::WorkloadBuffers;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueTiming {
    pub tier: TierName,
    pub priority: i32,
    pub queue: QueueId,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierTimingReport {
    /// Per tier, elapsed time averaged over `trials`.
    pub tiers: Vec<QueueTiming>,
    pub verdicts: Vec<FairnessVerdict>,
    pub trials: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiQueueTimingReport {
    pub queues_per_tier: usize,
    pub queues: Vec<QueueTiming>,
}

/// One timed queue with its buffers and start/end markers.
struct Lane<'b, B: ComputeBackend + ?Sized> {
    tier: TierName,
    queue: OwnedQueue<'b, B>,
    buffers: WorkloadBuffers,
    start: OwnedEvent<'b, B>,
    end: OwnedEvent<'b, B>,
}

impl<'b, B: ComputeBackend + ?Sized> Lane<'b, B> {
    fn new(backend: &'b B, tier: TierName, priority: i32, flags: QueueFlags, elements: usize) -> Result<Self> {
        Ok(Self {
            tier,
            queue: OwnedQueue::create(backend, flags, priority)?,
            buffers: WorkloadBuffers::indexed(backend, elements)?,
            start: OwnedEvent::create(backend)?,
            end: OwnedEvent::create(backend)?,
        })
    }

    fn label(&self) -> String {
        format!("{} tier ({})", self.tier, self.queue.id())
    }

    fn timing(&self, elapsed_ms: f64) -> QueueTiming {
        QueueTiming { tier: self.tier, priority: self.queue.priority(), queue: self.queue.id(), elapsed_ms }
    }

    fn destroy(self) -> Result<()> {
        self.queue.destroy()
    }
}

/// One timed window over every lane, returning elapsed milliseconds per lane.
///
/// Only the chunked kernels sit between the markers. Sources go to the
/// device with a blocking copy before any start marker, chunk `i` is queued
/// on every lane before chunk `i + 1` on any, and results come back only
/// after all elapsed times are read. Data is checked before the caller looks
/// at the timings.
fn run_window<B: ComputeBackend + ?Sized>(
    backend: &B,
    config: &HarnessConfig,
    lanes: &[Lane<'_, B>],
) -> Result<Vec<f64>> {
    let Some(first) = lanes.first() else {
        return Ok(Vec::new());
    };
    for lane in lanes {
        lane.buffers.upload(backend)?;
    }

    for lane in lanes {
        backend.record_event(lane.start.id(), lane.queue.id())?;
    }
    let launch = LaunchConfig::new(config.grid_size, config.block_size);
    for chunk in first.buffers.chunks(config.timing_chunk_elements) {
        for lane in lanes {
            lane.buffers.launch_chunk(backend, lane.queue.id(), ElementOp::Copy, chunk, launch)?;
        }
    }
    for lane in lanes {
        backend.record_event(lane.end.id(), lane.queue.id())?;
    }

    let mut elapsed = Vec::with_capacity(lanes.len());
    for lane in lanes {
        backend.synchronize_event(lane.end.id())?;
        let ms = f64::from(backend.elapsed_ms(lane.start.id(), lane.end.id())?);
        debug!(tier = %lane.tier, queue = %lane.queue.id(), elapsed_ms = ms, "lane finished");
        elapsed.push(ms);
    }

    for lane in lanes {
        lane.buffers.download(backend)?;
        lane.buffers.verify(&lane.label(), ElementOp::Copy)?;
    }
    Ok(elapsed)
}

/// Time the enabled tiers against each other and check fairness.
///
/// Each chunk is queued on the least urgent tier first, so any lead a more
/// urgent tier shows comes from scheduling. With `fairness_trials > 1` each tier's time
/// is the mean over the trials.
pub fn run_tier_timing<B: ComputeBackend + ?Sized>(
    backend: &B,
    config: &HarnessConfig,
) -> Result<Outcome<TierTimingReport>> {
    let resolved = supported_or_return!(backend, "tier-timing");
    let tiers = classify(resolved.range);
    info!(
        range = %resolved.range,
        tiers = %tiers.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "),
        trials = config.fairness_trials,
        "tier timing pass"
    );

    let lanes = tiers
        .iter()
        .filter(|t| t.enabled)
        .map(|t| Lane::new(backend, t.name, t.priority, config.queue_flags, config.timing_elements()))
        .collect::<Result<Vec<_>>>()?;

    let mut totals = vec![0.0f64; lanes.len()];
    for trial in 0..config.fairness_trials {
        let elapsed = run_window(backend, config, &lanes)?;
        debug!(trial, ?elapsed, "trial finished");
        for (total, ms) in totals.iter_mut().zip(elapsed) {
            *total += ms;
        }
    }

    let trials = f64::from(config.fairness_trials);
    let timings: Vec<QueueTiming> =
        lanes.iter().zip(&totals).map(|(lane, total)| lane.timing(total / trials)).collect();
    let verdicts = fairness_verdicts(
        &timings.iter().map(|t| (t.tier, t.elapsed_ms)).collect::<Vec<_>>(),
        config.fairness_tolerance,
    );
    for v in &verdicts {
        info!(
            lower = %v.lower,
            higher = %v.higher,
            lower_ms = v.lower_ms,
            higher_ms = v.higher_ms,
            passed = v.passed,
            "fairness"
        );
    }
    check_fairness(&verdicts)?;

    for lane in lanes {
        lane.destroy()?;
    }
    Ok(Outcome::Completed(TierTimingReport { tiers: timings, verdicts, trials: config.fairness_trials }))
}

/// `queues_per_tier` queues for every enabled tier, all racing at once.
/// Only data sanity is asserted; timings are reported.
pub fn run_multi_queue_timing<B: ComputeBackend + ?Sized>(
    backend: &B,
    config: &HarnessConfig,
) -> Result<Outcome<MultiQueueTimingReport>> {
    let resolved = supported_or_return!(backend, "multi-queue-timing");
    info!(range = %resolved.range, queues_per_tier = config.queues_per_tier, "multi-queue timing pass");

    let mut lanes = Vec::new();
    for tier in classify(resolved.range).into_iter().filter(|t| t.enabled) {
        for _ in 0..config.queues_per_tier {
            lanes.push(Lane::new(backend, tier.name, tier.priority, config.queue_flags, config.timing_elements())?);
        }
    }

    let elapsed = run_window(backend, config, &lanes)?;
    let queues = lanes.iter().zip(elapsed).map(|(lane, ms)| lane.timing(ms)).collect();

    for lane in lanes {
        lane.destroy()?;
    }
    Ok(Outcome::Completed(MultiQueueTimingReport { queues_per_tier: config.queues_per_tier, queues }))
}
