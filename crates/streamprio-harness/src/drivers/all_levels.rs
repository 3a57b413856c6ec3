//! One queue per supported priority level, plus the default queue.

use serde::Serialize;
use streamprio_runtime::{ComputeBackend, ElementOp, LaunchConfig, QueueFlags, QueueId};
use tracing::{debug, info};

use crate::config::{HarnessConfig, SyncStrategy};
use crate::error::Result;
use crate::outcome::Outcome;
use crate::owned::OwnedQueue;
use crate::resolver::supported_or_return;
use crate::workload::WorkloadBuffers;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub slot: usize,
    pub queue: QueueId,
    pub priority: i32,
    pub elements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllLevelsReport {
    pub flags: QueueFlags,
    pub sync: SyncStrategy,
    /// Slot 0 is the default queue; the rest run from most to least urgent.
    pub slots: Vec<SlotReport>,
}

/// Square `config.elements_per_queue` copies of `config.init_value` on every
/// priority level at once and check every output element.
///
/// Submissions to all slots go out before any wait. After the single wait
/// chosen by `sync`, slots are validated in order and the first mismatch
/// fails the scenario.
pub fn run_all_levels<B: ComputeBackend + ?Sized>(
    backend: &B,
    config: &HarnessConfig,
    flags: QueueFlags,
    sync: SyncStrategy,
) -> Result<Outcome<AllLevelsReport>> {
    let resolved = supported_or_return!(backend, "all-levels");
    info!(range = %resolved.range, slots = resolved.slot_count_with_default(), %flags, %sync, "all-levels pass");

    let queues = resolved
        .levels()
        .map(|priority| OwnedQueue::create(backend, flags, priority))
        .collect::<Result<Vec<_>>>()?;

    let mut slots = Vec::with_capacity(resolved.slot_count_with_default());
    slots.push((QueueId::DEFAULT, backend.queue_priority(QueueId::DEFAULT)?));
    slots.extend(queues.iter().map(|q| (q.id(), q.priority())));

    let buffers = slots
        .iter()
        .map(|_| WorkloadBuffers::filled(backend, config.elements_per_queue, config.init_value))
        .collect::<Result<Vec<_>>>()?;

    let launch = LaunchConfig::new(config.grid_size, config.block_size);
    for ((queue, _), bufs) in slots.iter().zip(&buffers) {
        bufs.submit_transform(backend, *queue, ElementOp::Square, launch)?;
    }
    debug!(slots = slots.len(), "all submissions queued");

    match sync {
        SyncStrategy::Device => backend.synchronize_device()?,
        SyncStrategy::PerQueue => {
            for (queue, _) in &slots {
                backend.synchronize_queue(*queue)?;
            }
        }
    }

    for (slot, ((queue, priority), bufs)) in slots.iter().zip(&buffers).enumerate() {
        bufs.verify(&format!("slot {slot} ({queue}, priority {priority})"), ElementOp::Square)?;
    }

    for queue in queues {
        queue.destroy()?;
    }

    let slots = slots
        .into_iter()
        .enumerate()
        .map(|(slot, (queue, priority))| SlotReport { slot, queue, priority, elements: config.elements_per_queue })
        .collect();
    Ok(Outcome::Completed(AllLevelsReport { flags, sync, slots }))
}
