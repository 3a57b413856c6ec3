//! Timing markers.

use serde::{Deserialize, Serialize};

/// Opaque event handle. Recording an event on a queue places a marker that
/// completes once every earlier command on that queue has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event#{}", self.0)
    }
}
