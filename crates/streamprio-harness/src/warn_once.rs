//! Rate-limited skip warnings.
//!
//! Scenarios that cannot run on the current backend log why at WARN level
//! the first time, then at DEBUG for every repeat, so a suite that skips the
//! same way in every scenario does not flood the log.
//!
//! ```
//! use streamprio_harness::warn_once;
//!
//! warn_once!("doc_degenerate_range", "priority range has a single level");
//! warn_once!("doc_degenerate_range", "priority range has a single level"); // DEBUG
//! ```

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock, PoisonError};

static SEEN: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashSet<String>> {
    SEEN.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Log `message` at WARN the first time `key` is seen and at DEBUG after
/// that. Returns `true` for the first occurrence.
pub fn warn_once_fn(key: &str, message: &str) -> bool {
    let first = registry().lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string());
    if first {
        tracing::warn!(key = %key, "{}", message);
    } else {
        tracing::debug!(key = %key, "(rate-limited) {}", message);
    }
    first
}

/// Formatting front end for [`warn_once_fn`].
#[macro_export]
macro_rules! warn_once {
    ($key:expr, $($arg:tt)*) => {
        $crate::warn_once::warn_once_fn($key, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    fn setup_test_tracing() {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new("debug"))
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    }

    #[test]
    fn first_occurrence_only_is_reported() {
        setup_test_tracing();
        assert!(warn_once_fn("wo_test_first", "first"));
        assert!(!warn_once_fn("wo_test_first", "second"));
        assert!(warn_once_fn("wo_test_other", "different key"));
    }

    #[test]
    fn macro_formats_message() {
        setup_test_tracing();
        let level = 3;
        assert!(warn_once!("wo_test_macro", "skipping {} levels", level));
        assert!(!warn_once!("wo_test_macro", "skipping {} levels", level + 1));
    }

    #[test]
    fn concurrent_callers_warn_exactly_once() {
        setup_test_tracing();
        let barrier = Arc::new(Barrier::new(10));
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    warn_once_fn("wo_test_concurrent", &format!("thread {i}"))
                })
            })
            .collect();
        let firsts = handles.into_iter().map(|h| h.join().unwrap()).filter(|first| *first).count();
        assert_eq!(firsts, 1);
    }
}
