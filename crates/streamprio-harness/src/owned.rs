//! RAII guards for backend handles.
//!
//! Every early return in a driver (including a validation failure) drops the
//! guards it holds, which destroys the queues and events they own. Call
//! `destroy` on the happy path to see the backend's status.

use streamprio_runtime::{ComputeBackend, EventId, QueueFlags, QueueId};
use tracing::{debug, warn};

use crate::error::Result;

/// A queue created by the harness and destroyed when dropped.
pub struct OwnedQueue<'b, B: ComputeBackend + ?Sized> {
    backend: &'b B,
    id: Option<QueueId>,
    priority: i32,
}

impl<'b, B: ComputeBackend + ?Sized> OwnedQueue<'b, B> {
    /// Create a queue and read back the priority the backend bound it to.
    pub fn create(backend: &'b B, flags: QueueFlags, priority: i32) -> Result<Self> {
        let id = backend.create_queue(flags.bits(), priority)?;
        let mut queue = Self { backend, id: Some(id), priority };
        queue.priority = backend.queue_priority(id)?;
        debug!(queue = %id, %flags, requested = priority, bound = queue.priority, "harness queue created");
        Ok(queue)
    }

    pub fn id(&self) -> QueueId {
        self.id.unwrap_or(QueueId::DEFAULT)
    }

    /// Priority as read back after creation.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn destroy(mut self) -> Result<()> {
        match self.id.take() {
            Some(id) => Ok(self.backend.destroy_queue(id)?),
            None => Ok(()),
        }
    }
}

impl<B: ComputeBackend + ?Sized> Drop for OwnedQueue<'_, B> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take()
            && let Err(e) = self.backend.destroy_queue(id)
        {
            warn!(queue = %id, error = %e, "failed to destroy queue during cleanup");
        }
    }
}

impl<B: ComputeBackend + ?Sized> std::fmt::Debug for OwnedQueue<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedQueue").field("id", &self.id).field("priority", &self.priority).finish()
    }
}

/// An event destroyed when dropped.
pub struct OwnedEvent<'b, B: ComputeBackend + ?Sized> {
    backend: &'b B,
    id: Option<EventId>,
}

impl<'b, B: ComputeBackend + ?Sized> OwnedEvent<'b, B> {
    pub fn create(backend: &'b B) -> Result<Self> {
        Ok(Self { backend, id: Some(backend.create_event()?) })
    }

    pub fn id(&self) -> EventId {
        self.id.unwrap_or(EventId(0))
    }
}

impl<B: ComputeBackend + ?Sized> Drop for OwnedEvent<'_, B> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take()
            && let Err(e) = self.backend.destroy_event(id)
        {
            warn!(event = %id, error = %e, "failed to destroy event during cleanup");
        }
    }
}
