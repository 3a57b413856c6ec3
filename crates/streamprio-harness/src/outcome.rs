//! Scenario outcomes.

use serde::Serialize;
use streamprio_runtime::PriorityRange;

/// Why a scenario did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum SkipReason {
    /// The backend reports a single priority level.
    UnsupportedPriorityRange { range: PriorityRange },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedPriorityRange { range } => {
                write!(f, "queue priorities unsupported (range {range} has a single level)")
            }
        }
    }
}

/// Result of a scenario that may legitimately not run. Failures are the
/// `Err` side of the surrounding `Result`; a skip is not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Outcome<T> {
    Completed(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}
