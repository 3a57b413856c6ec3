//! `streamprio-harness`: drives a [`ComputeBackend`] with identical
//! workloads on queues of different priority and verifies the results.
//!
//! Scenarios:
//!
//! - [`drivers::run_all_levels`]: one queue per supported priority level plus
//!   the default queue, square kernel, exact data validation.
//! - [`drivers::run_tier_timing`]: low / normal / high tiers, chunked copy
//!   kernel, data sanity plus a tolerance-banded fairness check.
//! - [`drivers::run_multi_queue_timing`]: several queues per tier, data
//!   sanity only.
//! - [`drivers::run_concurrent`]: many OS threads sharing one pool of
//!   priority queues, reduced through an [`AggregateResult`].
//! - [`contract::check_priority_values`] and
//!   [`contract::negative_queue_creation`]: queue creation contract checks.
//!
//! Priority-dependent scenarios return [`Outcome::Skipped`] when the backend
//! reports a single-level range, and touch no queues in that case.
//!
//! [`ComputeBackend`]: streamprio_runtime::ComputeBackend

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod drivers;
pub mod error;
pub mod outcome;
pub mod owned;
pub mod resolver;
pub mod suite;
pub mod tiers;
pub mod validator;
pub mod warn_once;
pub mod workload;

pub use aggregate::AggregateResult;
pub use config::{ConfigError, HarnessConfig, SyncStrategy};
pub use error::{FailureKind, HarnessError, Result};
pub use outcome::{Outcome, SkipReason};
pub use resolver::{Resolution, ResolvedRange, resolve};
pub use suite::{ScenarioRecord, ScenarioStatus, SuiteReport, run_suite};
pub use tiers::{FAIRNESS_PAIRS, TierDescriptor, TierName, classify};
