//! Run every scenario and collect a report.

use serde::Serialize;
use streamprio_runtime::{ComputeBackend, DeviceProperties, QueueFlags};
use tracing::{error, info};

use crate::config::{HarnessConfig, SyncStrategy};
use crate::contract::{check_priority_values, negative_queue_creation};
use crate::drivers::{run_all_levels, run_concurrent, run_multi_queue_timing, run_tier_timing};
use crate::error::{FailureKind, Result};
use crate::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioRecord {
    pub name: String,
    pub status: ScenarioStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ScenarioRecord {
    fn from_result<T>(name: String, result: Result<Outcome<T>>) -> Self {
        let record = match result {
            Ok(Outcome::Completed(_)) => Self { name, status: ScenarioStatus::Passed, failure: None, detail: None },
            Ok(Outcome::Skipped(reason)) => {
                Self { name, status: ScenarioStatus::Skipped, failure: None, detail: Some(reason.to_string()) }
            }
            Err(e) => Self {
                name,
                status: ScenarioStatus::Failed,
                failure: Some(e.kind()),
                detail: Some(e.to_string()),
            },
        };
        match record.status {
            ScenarioStatus::Failed => error!(scenario = %record.name, detail = ?record.detail, "scenario failed"),
            status => info!(scenario = %record.name, ?status, "scenario finished"),
        }
        record
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub device: DeviceProperties,
    pub scenarios: Vec<ScenarioRecord>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.first_failure().is_none()
    }

    pub fn first_failure(&self) -> Option<&ScenarioRecord> {
        self.scenarios.iter().find(|s| s.status == ScenarioStatus::Failed)
    }

    /// Every scenario was skipped.
    pub fn all_skipped(&self) -> bool {
        !self.scenarios.is_empty() && self.scenarios.iter().all(|s| s.status == ScenarioStatus::Skipped)
    }

    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }
}

/// Contract checks, the four all-levels sections, tier and multi-queue
/// timing, and the concurrent pass for both flag values. A failing scenario
/// does not stop the ones after it.
pub fn run_suite<B: ComputeBackend + ?Sized>(backend: &B, config: &HarnessConfig) -> Result<SuiteReport> {
    let device = backend.device_properties()?;
    info!(device = %device.name, range = %device.priority_range, "running suite");
    let mut scenarios = Vec::new();

    scenarios.push(ScenarioRecord::from_result(
        "priority-values".into(),
        check_priority_values(backend).map(Outcome::Completed),
    ));
    scenarios.push(ScenarioRecord::from_result("negative-create".into(), negative_queue_creation(backend)));

    for flags in [QueueFlags::DEFAULT, QueueFlags::NON_BLOCKING] {
        for sync in SyncStrategy::ALL {
            scenarios.push(ScenarioRecord::from_result(
                format!("all-levels/{flags}/{sync}"),
                run_all_levels(backend, config, flags, sync),
            ));
        }
    }

    scenarios.push(ScenarioRecord::from_result("tier-timing".into(), run_tier_timing(backend, config)));
    scenarios.push(ScenarioRecord::from_result("multi-queue-timing".into(), run_multi_queue_timing(backend, config)));

    for flags in [QueueFlags::DEFAULT, QueueFlags::NON_BLOCKING] {
        scenarios.push(ScenarioRecord::from_result(
            format!("concurrent/{flags}"),
            run_concurrent(backend, config, flags),
        ));
    }

    Ok(SuiteReport { device, scenarios })
}
