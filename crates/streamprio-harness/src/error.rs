//! Harness error types.

use serde::Serialize;
use streamprio_runtime::{ErrorCode, QueueFlags, RuntimeError};
use thiserror::Error;

use crate::tiers::TierName;

/// Broad failure class, used for reporting and process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Output data did not match the expected transform.
    DataMismatch,
    /// A higher-priority tier was slower than the tolerance allows.
    Fairness,
    /// The backend returned the wrong status or read-back value.
    Contract,
    /// Any other backend failure.
    Runtime,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("{label}: element {index} expected {expected}, got {actual}")]
    DataMismatch { label: String, index: usize, expected: i32, actual: i32 },

    #[error("{label}: output has {actual} elements, expected {expected}")]
    LengthMismatch { label: String, expected: usize, actual: usize },

    #[error(
        "fairness violation: {higher} tier took {higher_ms:.3} ms, \
         more than {tolerance} x {lower} tier ({lower_ms:.3} ms)"
    )]
    FairnessViolation { lower: TierName, higher: TierName, lower_ms: f64, higher_ms: f64, tolerance: f64 },

    #[error("{failed} of {workers} concurrent workers failed")]
    ConcurrentFailure { failed: usize, workers: usize },

    #[error("{call} returned {actual}, expected {expected}")]
    UnexpectedStatus { call: &'static str, expected: ErrorCode, actual: ErrorCode },

    #[error("device {device} case {case}: priority read back as {actual}, expected {expected}")]
    PriorityReadback { device: usize, case: &'static str, expected: i32, actual: i32 },

    #[error("device {device} case {case}: flags read back as {actual}, expected {expected}")]
    FlagsReadback { device: usize, case: &'static str, expected: QueueFlags, actual: QueueFlags },
}

impl HarnessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Runtime(_) => FailureKind::Runtime,
            Self::DataMismatch { .. } | Self::LengthMismatch { .. } | Self::ConcurrentFailure { .. } => {
                FailureKind::DataMismatch
            }
            Self::FairnessViolation { .. } => FailureKind::Fairness,
            Self::UnexpectedStatus { .. } | Self::PriorityReadback { .. } | Self::FlagsReadback { .. } => {
                FailureKind::Contract
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_slot() {
        let err = HarnessError::DataMismatch {
            label: "slot 2 (queue#3, priority -1)".into(),
            index: 17,
            expected: 4,
            actual: 0,
        };
        insta::assert_snapshot!(err.to_string(), @"slot 2 (queue#3, priority -1): element 17 expected 4, got 0");
    }

    #[test]
    fn fairness_message_carries_both_timings() {
        let err = HarnessError::FairnessViolation {
            lower: TierName::Low,
            higher: TierName::High,
            lower_ms: 10.0,
            higher_ms: 12.5,
            tolerance: 1.05,
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"fairness violation: high tier took 12.500 ms, more than 1.05 x low tier (10.000 ms)"
        );
    }

    #[test]
    fn kinds_are_classified() {
        assert_eq!(HarnessError::Runtime(RuntimeError::ShutDown).kind(), FailureKind::Runtime);
        assert_eq!(HarnessError::ConcurrentFailure { failed: 1, workers: 16 }.kind(), FailureKind::DataMismatch);
        assert_eq!(
            HarnessError::UnexpectedStatus {
                call: "create_queue",
                expected: ErrorCode::InvalidConfiguration,
                actual: ErrorCode::Success,
            }
            .kind(),
            FailureKind::Contract
        );
    }
}
