//! Result validation.
//!
//! Data checks are exact and stop at the first mismatch. Timing checks are
//! tolerance-banded and pairwise. The two are never folded into one score.

use serde::Serialize;
use streamprio_runtime::{Element, ElementOp};

use crate::error::{HarnessError, Result};
use crate::tiers::{FAIRNESS_PAIRS, TierName};

/// `actual[i] == op(source[i])` for every `i`, reporting the first index
/// that differs.
pub fn verify_transform(label: &str, source: &[Element], actual: &[Element], op: ElementOp) -> Result<()> {
    if source.len() != actual.len() {
        return Err(HarnessError::LengthMismatch {
            label: label.to_string(),
            expected: source.len(),
            actual: actual.len(),
        });
    }
    match source.iter().zip(actual).position(|(s, a)| op.apply(*s) != *a) {
        Some(index) => Err(HarnessError::DataMismatch {
            label: label.to_string(),
            index,
            expected: op.apply(source[index]),
            actual: actual[index],
        }),
        None => Ok(()),
    }
}

/// Outcome of one `(lower, higher)` timing comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FairnessVerdict {
    pub lower: TierName,
    pub higher: TierName,
    pub lower_ms: f64,
    pub higher_ms: f64,
    pub tolerance: f64,
    pub passed: bool,
}

impl FairnessVerdict {
    pub fn new(lower: TierName, higher: TierName, lower_ms: f64, higher_ms: f64, tolerance: f64) -> Self {
        Self { lower, higher, lower_ms, higher_ms, tolerance, passed: higher_ms <= tolerance * lower_ms }
    }

    fn into_error(self) -> HarnessError {
        HarnessError::FairnessViolation {
            lower: self.lower,
            higher: self.higher,
            lower_ms: self.lower_ms,
            higher_ms: self.higher_ms,
            tolerance: self.tolerance,
        }
    }
}

/// Compare every fairness pair whose tiers both have a timing, in
/// [`FAIRNESS_PAIRS`] order.
pub fn fairness_verdicts(timings: &[(TierName, f64)], tolerance: f64) -> Vec<FairnessVerdict> {
    let ms = |name: TierName| timings.iter().find(|(t, _)| *t == name).map(|(_, ms)| *ms);
    FAIRNESS_PAIRS
        .iter()
        .filter_map(|&(lower, higher)| {
            Some(FairnessVerdict::new(lower, higher, ms(lower)?, ms(higher)?, tolerance))
        })
        .collect()
}

/// First failing verdict as an error.
pub fn check_fairness(verdicts: &[FairnessVerdict]) -> Result<()> {
    match verdicts.iter().find(|v| !v.passed) {
        Some(v) => Err(v.into_error()),
        None => Ok(()),
    }
}
