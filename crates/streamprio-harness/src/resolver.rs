//! Priority range resolution.

use serde::Serialize;
use streamprio_runtime::{ComputeBackend, PriorityRange};
use tracing::debug;

use crate::error::Result;
use crate::outcome::{Outcome, SkipReason};
use crate::warn_once;

/// A range with at least two levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    pub range: PriorityRange,
    pub level_count: usize,
}

impl ResolvedRange {
    /// Slots in the all-levels pass: one per level plus the default queue.
    pub fn slot_count_with_default(&self) -> usize {
        self.level_count + 1
    }

    /// Levels from most to least urgent.
    pub fn levels(&self) -> impl Iterator<Item = i32> + use<> {
        self.range.levels()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Supported(ResolvedRange),
    /// `low == high`; prioritisation is not available.
    Unsupported(PriorityRange),
}

/// Query the backend's priority range once.
pub fn resolve<B: ComputeBackend + ?Sized>(backend: &B) -> Result<Resolution> {
    let range = backend.priority_range()?;
    debug!(%range, levels = range.level_count(), "priority range resolved");
    Ok(if range.is_supported() {
        Resolution::Supported(ResolvedRange { range, level_count: range.level_count() })
    } else {
        Resolution::Unsupported(range)
    })
}

/// [`resolve`], turning an unsupported range into a logged skip for
/// `scenario`.
pub fn resolve_or_skip<B: ComputeBackend + ?Sized>(backend: &B, scenario: &str) -> Result<Outcome<ResolvedRange>> {
    Ok(match resolve(backend)? {
        Resolution::Supported(resolved) => Outcome::Completed(resolved),
        Resolution::Unsupported(range) => {
            let reason = SkipReason::UnsupportedPriorityRange { range };
            warn_once!(&format!("skip:{scenario}"), "{scenario}: skipped, {reason}");
            Outcome::Skipped(reason)
        }
    })
}

/// Unwrap a supported range or return the skip from the enclosing function.
macro_rules! supported_or_return {
    ($backend:expr, $scenario:expr) => {
        match $crate::resolver::resolve_or_skip($backend, $scenario)? {
            $crate::outcome::Outcome::Completed(resolved) => resolved,
            $crate::outcome::Outcome::Skipped(reason) => return Ok($crate::outcome::Outcome::Skipped(reason)),
        }
    };
}
pub(crate) use supported_or_return;

#[cfg(test)]
mod tests {
    use super::*;
    use streamprio_runtime::sim::{SimDevice, SimDeviceConfig};

    fn sim(low: i32, high: i32) -> SimDevice {
        let config = SimDeviceConfig { priority_low: low, priority_high: high, compute_units: 1, ..Default::default() };
        SimDevice::new(config).unwrap()
    }

    #[test]
    fn four_level_range_has_five_slots() {
        let Resolution::Supported(resolved) = resolve(&sim(-2, 1)).unwrap() else {
            panic!("expected supported range");
        };
        assert_eq!(resolved.level_count, 4);
        assert_eq!(resolved.slot_count_with_default(), 5);
        assert_eq!(resolved.levels().collect::<Vec<_>>(), vec![1, 0, -1, -2]);
    }

    #[test]
    fn degenerate_range_is_unsupported() {
        assert_eq!(resolve(&sim(0, 0)).unwrap(), Resolution::Unsupported(PriorityRange::degenerate(0)));
    }

    #[test]
    fn unsupported_range_becomes_skip() {
        let outcome = resolve_or_skip(&sim(5, 5), "resolver_test").unwrap();
        assert_eq!(
            outcome,
            Outcome::Skipped(SkipReason::UnsupportedPriorityRange { range: PriorityRange::degenerate(5) })
        );
    }
}
