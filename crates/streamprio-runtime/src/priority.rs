//! Queue priority ranges.
//!
//! Backends disagree on which numeric direction means "more urgent", so a
//! [`PriorityRange`] is treated as an ordinal interval between two named
//! bounds: `high` (most urgent) and `low` (least urgent). Nothing here
//! assumes `high < low` or `high > low`.

use serde::{Deserialize, Serialize};

/// Supported priority interval reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriorityRange {
    /// Least urgent supported priority.
    pub low: i32,
    /// Most urgent supported priority.
    pub high: i32,
}

impl PriorityRange {
    pub const fn new(low: i32, high: i32) -> Self {
        Self { low, high }
    }

    /// A range with a single level; prioritisation is unsupported.
    pub const fn degenerate(level: i32) -> Self {
        Self { low: level, high: level }
    }

    /// `false` when both bounds are equal.
    pub const fn is_supported(&self) -> bool {
        self.low != self.high
    }

    /// Number of distinct levels, inclusive of both bounds (always ≥ 1).
    pub fn level_count(&self) -> usize {
        let span = (i64::from(self.low) - i64::from(self.high)).unsigned_abs();
        usize::try_from(span).map_or(usize::MAX, |s| s.saturating_add(1))
    }

    /// Step that moves from `high` toward `low`.
    fn step(&self) -> i64 {
        if self.low >= self.high { 1 } else { -1 }
    }

    /// Every level from `high` toward `low`, both bounds included.
    ///
    /// ```
    /// use streamprio_runtime::PriorityRange;
    ///
    /// let levels: Vec<i32> = PriorityRange::new(-2, 1).levels().collect();
    /// assert_eq!(levels, vec![1, 0, -1, -2]);
    /// ```
    pub fn levels(&self) -> impl Iterator<Item = i32> + use<> {
        let high = i64::from(self.high);
        let step = self.step();
        (0..self.level_count() as i64).map(move |i| (high + step * i) as i32)
    }

    /// Whether `priority` lies between the bounds (inclusive).
    pub fn contains(&self, priority: i32) -> bool {
        let (min, max) = self.numeric_bounds();
        (min..=max).contains(&priority)
    }

    /// Resolve `priority` to a supported level.
    ///
    /// Levels inside the range are kept. Anything numerically above the
    /// range resolves to `low` and anything below it to `high`, in either
    /// orientation, so `i32::MAX` is always the least urgent level and
    /// `i32::MIN` the most urgent.
    ///
    /// ```
    /// use streamprio_runtime::PriorityRange;
    ///
    /// let range = PriorityRange::new(-2, 1);
    /// assert_eq!(range.clamp(i32::MAX), -2);
    /// assert_eq!(range.clamp(i32::MIN), 1);
    /// assert_eq!(range.clamp(0), 0);
    /// ```
    pub fn clamp(&self, priority: i32) -> i32 {
        let (min, max) = self.numeric_bounds();
        if priority > max {
            self.low
        } else if priority < min {
            self.high
        } else {
            priority
        }
    }

    /// Urgency rank of `priority` after clamping: `0` is the `high` bound,
    /// `level_count() - 1` is the `low` bound.
    pub fn rank(&self, priority: i32) -> u32 {
        let clamped = i64::from(self.clamp(priority));
        (clamped - i64::from(self.high)).unsigned_abs() as u32
    }

    /// Midpoint level used for a "normal" tier; integer division truncating
    /// toward zero, like the C expression `(low + high) / 2`.
    pub fn midpoint(&self) -> i32 {
        ((i64::from(self.low) + i64::from(self.high)) / 2) as i32
    }

    fn numeric_bounds(&self) -> (i32, i32) {
        (self.low.min(self.high), self.low.max(self.high))
    }
}

impl std::fmt::Display for PriorityRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "low={}, high={}", self.low, self.high)
    }
}
