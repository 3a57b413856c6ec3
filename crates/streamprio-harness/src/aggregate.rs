//! Cross-thread pass/fail accumulator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared boolean combined with logical AND. Starts `true`; any worker
/// recording `false` makes it `false` for good.
///
/// Cloning shares the same underlying flag.
#[derive(Debug, Clone)]
pub struct AggregateResult(Arc<AtomicBool>);

impl Default for AggregateResult {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateResult {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn record(&self, passed: bool) {
        self.0.fetch_and(passed, Ordering::AcqRel);
    }

    pub fn passed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
