//! Queue-creation contract checks.

use serde::Serialize;
use streamprio_runtime::{ComputeBackend, ErrorCode, QueueFlags};
use tracing::{debug, info};

use crate::error::{HarnessError, Result};
use crate::outcome::Outcome;
use crate::owned::OwnedQueue;
use crate::resolver::supported_or_return;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadbackCase {
    pub device: usize,
    pub case: &'static str,
    pub requested: i32,
    pub flags: QueueFlags,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityReadbackReport {
    pub devices: usize,
    pub cases: Vec<ReadbackCase>,
}

/// Create a queue for each of high, low, `i32::MAX`, `i32::MIN` and
/// high+non-blocking on every device, and check the priority and flags read
/// back. `i32::MAX` must read back as the `low` bound and `i32::MIN` as the
/// `high` bound, whichever way the range is oriented numerically.
///
/// Runs on single-level ranges too; both bounds are then the same level.
/// Device 0 is current again afterwards.
pub fn check_priority_values<B: ComputeBackend + ?Sized>(backend: &B) -> Result<PriorityReadbackReport> {
    let devices = backend.device_count()?;
    let mut cases = Vec::new();
    for device in 0..devices {
        backend.set_device(device)?;
        let range = backend.priority_range()?;
        info!(device, %range, "checking priority read-back");

        let requests = [
            ("high", range.high, range.high, QueueFlags::DEFAULT),
            ("low", range.low, range.low, QueueFlags::DEFAULT),
            ("i32-max", i32::MAX, range.low, QueueFlags::DEFAULT),
            ("i32-min", i32::MIN, range.high, QueueFlags::DEFAULT),
            ("high-non-blocking", range.high, range.high, QueueFlags::NON_BLOCKING),
        ];
        for (case, requested, expected, flags) in requests {
            let queue = OwnedQueue::create(backend, flags, requested)?;
            if queue.priority() != expected {
                return Err(HarnessError::PriorityReadback { device, case, expected, actual: queue.priority() });
            }
            let actual_flags = backend.queue_flags(queue.id())?;
            if actual_flags != flags {
                return Err(HarnessError::FlagsReadback { device, case, expected: flags, actual: actual_flags });
            }
            debug!(device, case, requested, priority = expected, "read-back ok");
            queue.destroy()?;
            cases.push(ReadbackCase { device, case, requested, flags, priority: expected });
        }
    }
    if devices > 0 {
        backend.set_device(0)?;
    }
    Ok(PriorityReadbackReport { devices, cases })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCheck {
    pub call: &'static str,
    pub expected: ErrorCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NegativeCreationReport {
    pub checks: Vec<StatusCheck>,
}

fn expect_status<T>(call: &'static str, result: streamprio_runtime::Result<T>, expected: ErrorCode) -> Result<()> {
    let actual = match result {
        Ok(_) => ErrorCode::Success,
        Err(e) => e.code(),
    };
    if actual == expected {
        debug!(call, %expected, "status as expected");
        Ok(())
    } else {
        Err(HarnessError::UnexpectedStatus { call, expected, actual })
    }
}

/// Queue creation must fail with `InvalidValue` for a missing output slot
/// and with `InvalidConfiguration` for an unrecognised flag word.
pub fn negative_queue_creation<B: ComputeBackend + ?Sized>(backend: &B) -> Result<Outcome<NegativeCreationReport>> {
    let resolved = supported_or_return!(backend, "negative-create");
    let priority = resolved.range.high;

    const MISSING_SLOT: &str = "create_queue_into(None)";
    expect_status(
        MISSING_SLOT,
        backend.create_queue_into(None, QueueFlags::DEFAULT.bits(), priority),
        ErrorCode::InvalidValue,
    )?;

    const BAD_FLAGS: &str = "create_queue(0xffffffff)";
    let created = backend.create_queue(0xffff_ffff, priority);
    if let Ok(queue) = &created {
        backend.destroy_queue(*queue)?;
    }
    expect_status(BAD_FLAGS, created, ErrorCode::InvalidConfiguration)?;

    Ok(Outcome::Completed(NegativeCreationReport {
        checks: vec![
            StatusCheck { call: MISSING_SLOT, expected: ErrorCode::InvalidValue },
            StatusCheck { call: BAD_FLAGS, expected: ErrorCode::InvalidConfiguration },
        ],
    }))
}
