//! Workload drivers.

mod all_levels;
mod concurrent;
mod timing;

pub use all_levels::{AllLevelsReport, SlotReport, run_all_levels};
pub use concurrent::{ConcurrentReport, run_concurrent};
pub use timing::{MultiQueueTimingReport, QueueTiming, TierTimingReport, run_multi_queue_timing, run_tier_timing};
