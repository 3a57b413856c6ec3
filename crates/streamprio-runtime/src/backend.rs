//! The backend boundary.

use crate::buffer::{DeviceBuffer, HostBuffer};
use crate::device::DeviceProperties;
use crate::error::{Result, RuntimeError};
use crate::event::EventId;
use crate::kernel::{KernelLaunch, LaunchConfig};
use crate::priority::PriorityRange;
use crate::queue::{QueueFlags, QueueId};

/// Host-side API of a prioritised asynchronous queue runtime.
///
/// Submission calls (`*_async`, [`launch`](Self::launch),
/// [`record_event`](Self::record_event)) return as soon as the command is
/// queued. Completion is observed only through
/// [`synchronize_queue`](Self::synchronize_queue),
/// [`synchronize_device`](Self::synchronize_device) or
/// [`synchronize_event`](Self::synchronize_event).
///
/// Within one queue commands complete in submission order. Across queues no
/// order is promised beyond what priority scheduling produces.
///
/// Implementations must accept concurrent submission to the same queue from
/// several threads.
pub trait ComputeBackend: Send + Sync {
    /// Number of devices visible to the backend.
    fn device_count(&self) -> Result<usize>;

    /// Make `index` the current device for subsequent calls.
    fn set_device(&self, index: usize) -> Result<()>;

    /// Properties of the current device.
    fn device_properties(&self) -> Result<DeviceProperties>;

    /// Supported queue priority interval of the current device.
    fn priority_range(&self) -> Result<PriorityRange>;

    /// Create a queue bound to `priority` (clamped into the supported range).
    ///
    /// `flags` is the raw flag word; unrecognised values fail with
    /// [`ErrorCode::InvalidConfiguration`](crate::ErrorCode::InvalidConfiguration).
    fn create_queue(&self, flags: u32, priority: i32) -> Result<QueueId>;

    /// Out-parameter form of [`create_queue`](Self::create_queue). A missing
    /// output slot fails with [`ErrorCode::InvalidValue`](crate::ErrorCode::InvalidValue)
    /// before anything is created.
    fn create_queue_into(&self, out: Option<&mut QueueId>, flags: u32, priority: i32) -> Result<()> {
        let Some(slot) = out else {
            return Err(RuntimeError::InvalidValue("queue output slot is missing".into()));
        };
        *slot = self.create_queue(flags, priority)?;
        Ok(())
    }

    /// Wait for outstanding work on `queue`, then release it.
    fn destroy_queue(&self, queue: QueueId) -> Result<()>;

    /// Priority the queue was bound to at creation (after clamping).
    fn queue_priority(&self, queue: QueueId) -> Result<i32>;

    /// Flags the queue was created with.
    fn queue_flags(&self, queue: QueueId) -> Result<QueueFlags>;

    /// Allocate `len` zeroed elements of device memory.
    fn alloc(&self, len: usize) -> Result<DeviceBuffer>;

    /// Queue a copy of all of `src` into the front of `dst`.
    fn copy_to_device_async(&self, queue: QueueId, dst: &DeviceBuffer, src: &HostBuffer) -> Result<()>;

    /// Queue a copy of all of `src` into the front of `dst`.
    fn copy_to_host_async(&self, queue: QueueId, dst: &HostBuffer, src: &DeviceBuffer) -> Result<()>;

    /// Blocking host → device copy, ordered on the default queue.
    fn copy_to_device(&self, dst: &DeviceBuffer, src: &HostBuffer) -> Result<()> {
        self.copy_to_device_async(QueueId::DEFAULT, dst, src)?;
        self.synchronize_queue(QueueId::DEFAULT)
    }

    /// Blocking device → host copy, ordered on the default queue.
    fn copy_to_host(&self, dst: &HostBuffer, src: &DeviceBuffer) -> Result<()> {
        self.copy_to_host_async(QueueId::DEFAULT, dst, src)?;
        self.synchronize_queue(QueueId::DEFAULT)
    }

    /// Queue a kernel.
    fn launch(&self, queue: QueueId, kernel: KernelLaunch, config: LaunchConfig) -> Result<()>;

    fn create_event(&self) -> Result<EventId>;

    fn destroy_event(&self, event: EventId) -> Result<()>;

    /// Place a marker for `event` on `queue`.
    fn record_event(&self, event: EventId, queue: QueueId) -> Result<()>;

    /// Block until the most recent record of `event` has completed. Returns
    /// immediately for an event that was never recorded.
    fn synchronize_event(&self, event: EventId) -> Result<()>;

    /// Milliseconds between two completed events.
    fn elapsed_ms(&self, start: EventId, end: EventId) -> Result<f32>;

    /// Block until every command submitted to `queue` has completed.
    fn synchronize_queue(&self, queue: QueueId) -> Result<()>;

    /// Block until every command on every queue has completed.
    fn synchronize_device(&self) -> Result<()>;
}
