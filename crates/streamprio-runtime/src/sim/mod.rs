//! In-process simulated device.
//!
//! A [`SimDevice`] owns a fixed pool of compute-unit threads. Each queued
//! command is split into work units (one per grid block for kernels, one for
//! a copy) and every idle compute unit claims its next unit from the most
//! urgent queue that has one ready. Lower-urgency queues therefore only make
//! progress on compute units the more urgent queues leave idle, which is
//! what makes priority observable in event timings.
//!
//! All devices reported by [`SimDeviceConfig::device_count`] share one pool;
//! [`ComputeBackend::set_device`] only changes the reported index.

mod state;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::backend::ComputeBackend;
use crate::buffer::{DeviceBuffer, HostBuffer};
use crate::device::DeviceProperties;
use crate::error::{Result, RuntimeError};
use crate::event::EventId;
use crate::kernel::{KernelLaunch, LaunchConfig};
use crate::priority::PriorityRange;
use crate::queue::{QueueFlags, QueueId};

use self::state::{DeviceState, Op};

/// Construction parameters for a [`SimDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimDeviceConfig {
    pub name: String,
    /// Least urgent priority the device reports.
    pub priority_low: i32,
    /// Most urgent priority the device reports.
    pub priority_high: i32,
    /// Worker threads executing work units.
    pub compute_units: usize,
    pub device_count: usize,
    pub max_threads_per_block: u32,
    /// Extra time spent on every work unit, in microseconds.
    pub unit_delay_us: u64,
}

impl Default for SimDeviceConfig {
    fn default() -> Self {
        Self {
            name: "streamprio-sim".to_string(),
            priority_low: 0,
            priority_high: -3,
            compute_units: num_cpus::get().clamp(1, 8),
            device_count: 1,
            max_threads_per_block: 1024,
            unit_delay_us: 0,
        }
    }
}

impl SimDeviceConfig {
    pub fn priority_range(&self) -> PriorityRange {
        PriorityRange::new(self.priority_low, self.priority_high)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compute_units == 0 {
            return Err(RuntimeError::InvalidConfiguration("compute_units must be at least 1".into()));
        }
        if self.device_count == 0 {
            return Err(RuntimeError::InvalidConfiguration("device_count must be at least 1".into()));
        }
        if self.max_threads_per_block == 0 {
            return Err(RuntimeError::InvalidConfiguration("max_threads_per_block must be non-zero".into()));
        }
        Ok(())
    }
}

struct Shared {
    config: SimDeviceConfig,
    state: Mutex<DeviceState>,
    /// Signalled when new work units may be claimable.
    work_ready: Condvar,
    /// Signalled when any command or queue completes.
    progress: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated device with priority-aware scheduling.
pub struct SimDevice {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    current_device: AtomicUsize,
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("config", &self.shared.config)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl SimDevice {
    pub fn new(config: SimDeviceConfig) -> Result<Self> {
        config.validate()?;
        let range = config.priority_range();
        let shared = Arc::new(Shared {
            state: Mutex::new(DeviceState::new(range)),
            work_ready: Condvar::new(),
            progress: Condvar::new(),
            config,
        });

        let mut device = Self { shared: Arc::clone(&shared), workers: Vec::new(), current_device: AtomicUsize::new(0) };
        for index in 0..shared.config.compute_units {
            let worker_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("streamprio-cu-{index}"))
                .spawn(move || run_compute_unit(&worker_shared))
                .map_err(|e| RuntimeError::WorkerStart(e.to_string()))?;
            device.workers.push(handle);
        }

        info!(
            name = %shared.config.name,
            compute_units = shared.config.compute_units,
            %range,
            "simulated device started"
        );
        Ok(device)
    }

    pub fn config(&self) -> &SimDeviceConfig {
        &self.shared.config
    }

    /// Queues currently alive, excluding the default queue.
    pub fn live_queue_count(&self) -> usize {
        self.shared.lock().live_queue_count()
    }

    fn submit(&self, queue: QueueId, op: Op, units: u32) -> Result<()> {
        {
            let mut state = self.shared.lock();
            if state.shutdown {
                return Err(RuntimeError::ShutDown);
            }
            state.submit(queue, op, units)?;
        }
        self.shared.work_ready.notify_all();
        // Zero-unit records may have completed inline.
        self.shared.progress.notify_all();
        Ok(())
    }

    /// Block until `done` holds.
    fn wait_until(&self, mut done: impl FnMut(&DeviceState) -> Result<bool>) -> Result<()> {
        let mut state = self.shared.lock();
        while !done(&state)? {
            state = self.shared.progress.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

impl Drop for SimDevice {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.work_ready.notify_all();
        self.shared.progress.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_compute_unit(shared: &Shared) {
    let delay = Duration::from_micros(shared.config.unit_delay_us);
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }
        let Some(unit) = state.claim() else {
            state = shared.work_ready.wait(state).unwrap_or_else(PoisonError::into_inner);
            continue;
        };
        drop(state);

        unit.execute();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        state = shared.lock();
        state.complete(&unit);
        trace!(queue = %unit.queue, "work unit complete");
        shared.progress.notify_all();
        shared.work_ready.notify_all();
    }
}

impl ComputeBackend for SimDevice {
    fn device_count(&self) -> Result<usize> {
        Ok(self.shared.config.device_count)
    }

    fn set_device(&self, index: usize) -> Result<()> {
        let count = self.shared.config.device_count;
        if index >= count {
            return Err(RuntimeError::InvalidDevice { index, count });
        }
        self.current_device.store(index, Ordering::Relaxed);
        Ok(())
    }

    fn device_properties(&self) -> Result<DeviceProperties> {
        let config = &self.shared.config;
        Ok(DeviceProperties {
            index: self.current_device.load(Ordering::Relaxed),
            name: config.name.clone(),
            compute_units: config.compute_units,
            max_threads_per_block: config.max_threads_per_block,
            priority_range: config.priority_range(),
        })
    }

    fn priority_range(&self) -> Result<PriorityRange> {
        Ok(self.shared.config.priority_range())
    }

    fn create_queue(&self, flags: u32, priority: i32) -> Result<QueueId> {
        let flags = QueueFlags::from_bits(flags)?;
        let mut state = self.shared.lock();
        if state.shutdown {
            return Err(RuntimeError::ShutDown);
        }
        let (id, bound) = state.create_queue(flags, priority);
        debug!(queue = %id, %flags, requested = priority, priority = bound, "queue created");
        Ok(id)
    }

    fn destroy_queue(&self, queue: QueueId) -> Result<()> {
        if queue.is_default() {
            return Err(RuntimeError::InvalidHandle { kind: "queue", id: queue.0 });
        }
        let mut state = self.shared.lock();
        loop {
            if state.queue(queue)?.is_idle() {
                state.remove_queue(queue)?;
                debug!(queue = %queue, "queue destroyed");
                return Ok(());
            }
            state = self.shared.progress.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn queue_priority(&self, queue: QueueId) -> Result<i32> {
        Ok(self.shared.lock().queue(queue)?.priority)
    }

    fn queue_flags(&self, queue: QueueId) -> Result<QueueFlags> {
        Ok(self.shared.lock().queue(queue)?.flags)
    }

    fn alloc(&self, len: usize) -> Result<DeviceBuffer> {
        Ok(DeviceBuffer::zeroed(len))
    }

    fn copy_to_device_async(&self, queue: QueueId, dst: &DeviceBuffer, src: &HostBuffer) -> Result<()> {
        if src.len() > dst.len() {
            return Err(RuntimeError::InvalidValue(format!(
                "copy of {} elements into device buffer of {}",
                src.len(),
                dst.len()
            )));
        }
        self.submit(queue, Op::CopyToDevice { dst: dst.clone(), src: src.clone() }, 1)
    }

    fn copy_to_host_async(&self, queue: QueueId, dst: &HostBuffer, src: &DeviceBuffer) -> Result<()> {
        if src.len() > dst.len() {
            return Err(RuntimeError::InvalidValue(format!(
                "copy of {} elements into host buffer of {}",
                src.len(),
                dst.len()
            )));
        }
        self.submit(queue, Op::CopyToHost { dst: dst.clone(), src: src.clone() }, 1)
    }

    fn launch(&self, queue: QueueId, kernel: KernelLaunch, config: LaunchConfig) -> Result<()> {
        config.validate()?;
        if config.block > self.shared.config.max_threads_per_block {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "block size {} exceeds device limit {}",
                config.block, self.shared.config.max_threads_per_block
            )));
        }
        kernel.validate()?;
        debug!(queue = %queue, op = %kernel.op, len = kernel.len, grid = config.grid, "kernel queued");
        self.submit(queue, Op::Kernel(kernel), config.grid)
    }

    fn create_event(&self) -> Result<EventId> {
        Ok(self.shared.lock().create_event())
    }

    fn destroy_event(&self, event: EventId) -> Result<()> {
        self.shared.lock().destroy_event(event)
    }

    fn record_event(&self, event: EventId, queue: QueueId) -> Result<()> {
        self.submit(queue, Op::Record(event), 0)
    }

    fn synchronize_event(&self, event: EventId) -> Result<()> {
        self.wait_until(|state| Ok(!state.event_pending(event)?))
    }

    fn elapsed_ms(&self, start: EventId, end: EventId) -> Result<f32> {
        self.shared.lock().elapsed_ms(start, end)
    }

    fn synchronize_queue(&self, queue: QueueId) -> Result<()> {
        self.wait_until(|state| Ok(state.queue(queue)?.is_idle()))
    }

    fn synchronize_device(&self) -> Result<()> {
        self.wait_until(|state| Ok(state.all_idle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ElementOp;
    use crate::ErrorCode;

    fn device(compute_units: usize) -> SimDevice {
        SimDevice::new(SimDeviceConfig { compute_units, ..Default::default() }).unwrap()
    }

    #[test]
    fn default_compute_units_track_cores_up_to_eight() {
        let units = SimDeviceConfig::default().compute_units;
        assert_eq!(units, num_cpus::get().clamp(1, 8));
        assert!((1..=8).contains(&units));
    }

    #[test]
    fn zero_compute_units_is_rejected() {
        let err = SimDevice::new(SimDeviceConfig { compute_units: 0, ..Default::default() }).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn square_kernel_round_trip() {
        let dev = device(4);
        let q = dev.create_queue(QueueFlags::NON_BLOCKING.bits(), -3).unwrap();
        let host = HostBuffer::indexed(10_000);
        let src = dev.alloc(host.len()).unwrap();
        let dst = dev.alloc(host.len()).unwrap();
        let out = HostBuffer::zeroed(host.len());

        dev.copy_to_device_async(q, &src, &host).unwrap();
        dev.launch(q, KernelLaunch::whole(ElementOp::Square, &src, &dst), LaunchConfig::new(64, 256)).unwrap();
        dev.copy_to_host_async(q, &out, &dst).unwrap();
        dev.synchronize_queue(q).unwrap();

        let got = out.to_vec();
        for (i, v) in got.iter().enumerate() {
            assert_eq!(*v, (i as i32).wrapping_mul(i as i32), "index {i}");
        }
        dev.destroy_queue(q).unwrap();
        assert_eq!(dev.live_queue_count(), 0);
    }

    #[test]
    fn block_over_device_limit_is_invalid_configuration() {
        let dev = SimDevice::new(SimDeviceConfig { max_threads_per_block: 128, ..Default::default() }).unwrap();
        let buf = dev.alloc(16).unwrap();
        let err = dev
            .launch(QueueId::DEFAULT, KernelLaunch::whole(ElementOp::Copy, &buf, &buf), LaunchConfig::new(1, 256))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn set_device_out_of_range() {
        let dev = device(1);
        assert_eq!(dev.set_device(1).unwrap_err().code(), ErrorCode::InvalidDevice);
        dev.set_device(0).unwrap();
    }

    #[test]
    fn drop_joins_idle_workers() {
        let dev = device(3);
        drop(dev);
    }
}
