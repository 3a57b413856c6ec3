//! Shared fixtures for harness integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use streamprio_harness::HarnessConfig;
use streamprio_runtime::sim::{SimDevice, SimDeviceConfig};
use streamprio_runtime::{
    ComputeBackend, DeviceBuffer, DeviceProperties, ElementOp, EventId, HostBuffer, KernelLaunch, LaunchConfig,
    PriorityRange, QueueFlags, QueueId, Result,
};

pub fn sim(low: i32, high: i32) -> SimDevice {
    SimDevice::new(SimDeviceConfig { priority_low: low, priority_high: high, compute_units: 4, ..Default::default() })
        .unwrap()
}

/// Harness config sized for fast tests.
pub fn small_config() -> HarnessConfig {
    HarnessConfig {
        elements_per_queue: 8192,
        concurrent_elements_per_queue: 2048,
        timing_chunk_elements: 1024,
        timing_chunks: 4,
        grid_size: 16,
        block_size: 64,
        worker_threads: 16,
        ..Default::default()
    }
}

/// Wraps a [`SimDevice`] and misbehaves on request.
pub struct FaultyBackend {
    pub inner: SimDevice,
    /// Launch number (0-based) whose kernel runs the other op (`copy` for
    /// `square` and the reverse).
    pub corrupt_launch: Option<usize>,
    /// Added to every priority read back.
    pub priority_skew: i32,
    /// Bind each queue to the mirror image of its requested level while
    /// reading back the requested one.
    pub invert_priorities: bool,
    /// Treat every flag word as `DEFAULT` instead of rejecting it.
    pub accept_any_flags: bool,
    /// Clamp requests to the numerically nearest bound before creating the
    /// queue, ignoring which bound is the urgent one.
    pub numeric_clamp: bool,
    /// Launch number (0-based) that panics instead of queueing.
    pub panic_launch: Option<usize>,
    launches: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FaultyBackend {
    pub fn new(inner: SimDevice) -> Self {
        Self {
            inner,
            corrupt_launch: None,
            priority_skew: 0,
            invert_priorities: false,
            accept_any_flags: false,
            numeric_clamp: false,
            panic_launch: None,
            launches: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Copies, launches, records and event waits seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn mirror(&self, priority: i32) -> Result<i32> {
        if !self.invert_priorities {
            return Ok(priority);
        }
        let range = self.inner.priority_range()?;
        Ok(range.low + range.high - range.clamp(priority))
    }
}

impl ComputeBackend for FaultyBackend {
    fn device_count(&self) -> Result<usize> {
        self.inner.device_count()
    }

    fn set_device(&self, index: usize) -> Result<()> {
        self.inner.set_device(index)
    }

    fn device_properties(&self) -> Result<DeviceProperties> {
        self.inner.device_properties()
    }

    fn priority_range(&self) -> Result<PriorityRange> {
        self.inner.priority_range()
    }

    fn create_queue(&self, flags: u32, priority: i32) -> Result<QueueId> {
        let flags = if self.accept_any_flags { QueueFlags::DEFAULT.bits() } else { flags };
        let mut priority = self.mirror(priority)?;
        if self.numeric_clamp {
            let range = self.inner.priority_range()?;
            priority = priority.clamp(range.low.min(range.high), range.low.max(range.high));
        }
        self.inner.create_queue(flags, priority)
    }

    fn destroy_queue(&self, queue: QueueId) -> Result<()> {
        self.inner.destroy_queue(queue)
    }

    fn queue_priority(&self, queue: QueueId) -> Result<i32> {
        Ok(self.mirror(self.inner.queue_priority(queue)?)? + self.priority_skew)
    }

    fn queue_flags(&self, queue: QueueId) -> Result<QueueFlags> {
        self.inner.queue_flags(queue)
    }

    fn alloc(&self, len: usize) -> Result<DeviceBuffer> {
        self.inner.alloc(len)
    }

    fn copy_to_device_async(&self, queue: QueueId, dst: &DeviceBuffer, src: &HostBuffer) -> Result<()> {
        self.log(format!("h2d {queue}"));
        self.inner.copy_to_device_async(queue, dst, src)
    }

    fn copy_to_host_async(&self, queue: QueueId, dst: &HostBuffer, src: &DeviceBuffer) -> Result<()> {
        self.log(format!("d2h {queue}"));
        self.inner.copy_to_host_async(queue, dst, src)
    }

    fn launch(&self, queue: QueueId, mut kernel: KernelLaunch, config: LaunchConfig) -> Result<()> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst);
        if self.panic_launch == Some(n) {
            panic!("launch {n} refused");
        }
        if self.corrupt_launch == Some(n) {
            kernel.op = match kernel.op {
                ElementOp::Copy => ElementOp::Square,
                ElementOp::Square => ElementOp::Copy,
            };
        }
        self.log(format!("kernel {queue}"));
        self.inner.launch(queue, kernel, config)
    }

    fn create_event(&self) -> Result<EventId> {
        self.inner.create_event()
    }

    fn destroy_event(&self, event: EventId) -> Result<()> {
        self.inner.destroy_event(event)
    }

    fn record_event(&self, event: EventId, queue: QueueId) -> Result<()> {
        self.log(format!("record {queue}"));
        self.inner.record_event(event, queue)
    }

    fn synchronize_event(&self, event: EventId) -> Result<()> {
        self.log("sync".to_owned());
        self.inner.synchronize_event(event)
    }

    fn elapsed_ms(&self, start: EventId, end: EventId) -> Result<f32> {
        self.inner.elapsed_ms(start, end)
    }

    fn synchronize_queue(&self, queue: QueueId) -> Result<()> {
        self.inner.synchronize_queue(queue)
    }

    fn synchronize_device(&self) -> Result<()> {
        self.inner.synchronize_device()
    }
}
