//! Priority tiers for the timing pass.

use serde::{Deserialize, Serialize};
use streamprio_runtime::PriorityRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierName {
    Low,
    Normal,
    High,
}

impl std::fmt::Display for TierName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierDescriptor {
    pub name: TierName,
    pub priority: i32,
    pub enabled: bool,
}

impl std::fmt::Display for TierDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.enabled {
            write!(f, "{}={}", self.name, self.priority)
        } else {
            write!(f, "{}=off", self.name)
        }
    }
}

/// `(lower, higher)` pairs checked by the fairness validator, in order.
pub const FAIRNESS_PAIRS: [(TierName, TierName); 3] =
    [(TierName::Low, TierName::Normal), (TierName::Normal, TierName::High), (TierName::Low, TierName::High)];

/// Tiers for `range`, least urgent first.
///
/// `low` and `high` are always enabled. `normal` sits at the truncated
/// midpoint and is enabled only when a level exists strictly between the
/// bounds.
pub fn classify(range: PriorityRange) -> Vec<TierDescriptor> {
    vec![
        TierDescriptor { name: TierName::Low, priority: range.low, enabled: true },
        TierDescriptor { name: TierName::Normal, priority: range.midpoint(), enabled: range.level_count() > 2 },
        TierDescriptor { name: TierName::High, priority: range.high, enabled: true },
    ]
}

/// Priority of `name` if that tier is enabled.
pub fn enabled_priority(tiers: &[TierDescriptor], name: TierName) -> Option<i32> {
    tiers.iter().find(|t| t.name == name && t.enabled).map(|t| t.priority)
}
