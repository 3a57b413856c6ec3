//! Many OS threads submitting to one shared pool of priority queues.

use std::thread;

use serde::Serialize;
use streamprio_runtime::{ComputeBackend, Element, ElementOp, LaunchConfig, QueueFlags, QueueId};
use tracing::{debug, info, warn};

use crate::aggregate::AggregateResult;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::outcome::Outcome;
use crate::owned::OwnedQueue;
use crate::resolver::supported_or_return;
use crate::workload::WorkloadBuffers;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcurrentReport {
    pub flags: QueueFlags,
    pub workers: usize,
    /// `(queue, priority)` for every shared queue, most urgent first.
    pub queues: Vec<(QueueId, i32)>,
    pub elements_per_queue: usize,
}

/// Fill value for `worker`, distinct per worker so that results landing in
/// another worker's buffer are caught.
fn worker_value(config: &HarnessConfig, worker: usize) -> Element {
    config.init_value.wrapping_add(worker as Element)
}

/// One worker: own buffers on every shared queue, submit, wait, verify.
fn run_worker<B: ComputeBackend + ?Sized>(
    backend: &B,
    config: &HarnessConfig,
    worker: usize,
    queues: &[QueueId],
) -> Result<()> {
    let value = worker_value(config, worker);
    let buffers = queues
        .iter()
        .map(|_| WorkloadBuffers::filled(backend, config.concurrent_elements_per_queue, value))
        .collect::<Result<Vec<_>>>()?;

    let launch = LaunchConfig::new(config.grid_size, config.block_size);
    for (queue, bufs) in queues.iter().zip(&buffers) {
        bufs.submit_transform(backend, *queue, ElementOp::Square, launch)?;
    }
    for queue in queues {
        backend.synchronize_queue(*queue)?;
    }
    for (queue, bufs) in queues.iter().zip(&buffers) {
        bufs.verify(&format!("worker {worker} on {queue}"), ElementOp::Square)?;
    }
    debug!(worker, "worker passed");
    Ok(())
}

/// A worker that never started counts as a failed one.
fn record_spawn_failure(aggregate: &AggregateResult, worker: usize, error: &std::io::Error) -> usize {
    warn!(worker, %error, "failed to spawn worker");
    aggregate.record(false);
    1
}

/// Run `config.worker_threads` workers against one queue per supported level.
///
/// Workers are spawned for this call and joined before the aggregate is
/// read. A worker that errors or panics records `false`; any `false` fails
/// the scenario with [`HarnessError::ConcurrentFailure`].
pub fn run_concurrent<B: ComputeBackend + ?Sized>(
    backend: &B,
    config: &HarnessConfig,
    flags: QueueFlags,
) -> Result<Outcome<ConcurrentReport>> {
    let resolved = supported_or_return!(backend, "concurrent");
    let workers = config.worker_threads;
    info!(range = %resolved.range, workers, %flags, "concurrent submission pass");

    let owned = resolved
        .levels()
        .map(|priority| OwnedQueue::create(backend, flags, priority))
        .collect::<Result<Vec<_>>>()?;
    let queue_ids: Vec<QueueId> = owned.iter().map(OwnedQueue::id).collect();

    let aggregate = AggregateResult::new();
    let failed = thread::scope(|s| {
        let mut failed = 0;
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let worker_aggregate = aggregate.clone();
            let queue_ids = &queue_ids;
            let spawned = thread::Builder::new()
                .name(format!("streamprio-worker-{worker}"))
                .spawn_scoped(s, move || {
                    let passed = match run_worker(backend, config, worker, queue_ids) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(worker, error = %e, "worker failed");
                            false
                        }
                    };
                    worker_aggregate.record(passed);
                    passed
                });
            match spawned {
                Ok(handle) => handles.push((worker, handle)),
                Err(e) => failed += record_spawn_failure(&aggregate, worker, &e),
            }
        }
        for (worker, handle) in handles {
            match handle.join() {
                Ok(true) => {}
                Ok(false) => failed += 1,
                Err(_) => {
                    warn!(worker, "worker panicked");
                    aggregate.record(false);
                    failed += 1;
                }
            }
        }
        failed
    });

    if !aggregate.passed() {
        return Err(HarnessError::ConcurrentFailure { failed, workers });
    }

    let queues = owned.iter().map(|q| (q.id(), q.priority())).collect();
    for queue in owned {
        queue.destroy()?;
    }
    Ok(Outcome::Completed(ConcurrentReport {
        flags,
        workers,
        queues,
        elements_per_queue: config.concurrent_elements_per_queue,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_fails_the_aggregate() {
        let aggregate = AggregateResult::new();
        aggregate.record(true);
        let err = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
        assert_eq!(record_spawn_failure(&aggregate, 3, &err), 1);
        assert!(!aggregate.passed());
    }

    #[test]
    fn worker_values_differ_per_worker() {
        let config = HarnessConfig::default();
        assert_eq!(worker_value(&config, 0), config.init_value);
        assert_ne!(worker_value(&config, 1), worker_value(&config, 2));
    }
}
