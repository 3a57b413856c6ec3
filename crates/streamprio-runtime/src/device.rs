//! Device property queries.

use serde::{Deserialize, Serialize};

use crate::priority::PriorityRange;

/// Properties of one device, as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProperties {
    pub index: usize,
    pub name: String,
    /// Number of work units the device executes concurrently.
    pub compute_units: usize,
    pub max_threads_per_block: u32,
    pub priority_range: PriorityRange,
}
