// Exit codes for precise CI triage
use streamprio_harness::{FailureKind, HarnessError};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_SKIPPED: i32 = 2;
pub const EXIT_DATA_MISMATCH: i32 = 3;
pub const EXIT_FAIRNESS: i32 = 4;

pub fn for_failure(kind: FailureKind) -> i32 {
    match kind {
        FailureKind::DataMismatch => EXIT_DATA_MISMATCH,
        FailureKind::Fairness => EXIT_FAIRNESS,
        FailureKind::Contract | FailureKind::Runtime => EXIT_GENERIC_FAIL,
    }
}

pub fn for_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<HarnessError>().map_or(EXIT_GENERIC_FAIL, |e| for_failure(e.kind()))
}
