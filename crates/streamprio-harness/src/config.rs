//! Harness configuration file format.
//!
//! Loads [`HarnessConfig`] from a TOML file with environment variable
//! overrides via `STREAMPRIO_*` prefixed variables. The simulated device is
//! configured from the `[device]` table.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use streamprio_runtime::QueueFlags;
use streamprio_runtime::sim::SimDeviceConfig;

/// How the all-levels pass waits for its submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStrategy {
    /// One device-wide wait.
    Device,
    /// One wait per queue, in slot order.
    PerQueue,
}

impl SyncStrategy {
    pub const ALL: [Self; 2] = [Self::Device, Self::PerQueue];
}

impl std::fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device => write!(f, "device"),
            Self::PerQueue => write!(f, "per-queue"),
        }
    }
}

impl FromStr for SyncStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "device" => Ok(Self::Device),
            "per-queue" | "per_queue" | "queue" => Ok(Self::PerQueue),
            other => Err(format!("unknown sync strategy: {other}")),
        }
    }
}

/// Harness configuration loaded from TOML with environment variable overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Elements per queue in the all-levels pass.
    /// Override: `STREAMPRIO_ELEMENTS`
    pub elements_per_queue: usize,

    /// Fill value of the all-levels source buffers.
    /// Override: `STREAMPRIO_INIT_VALUE`
    pub init_value: i32,

    /// Elements per queue for each concurrent worker.
    /// Override: `STREAMPRIO_CONCURRENT_ELEMENTS`
    pub concurrent_elements_per_queue: usize,

    /// Chunk length of the timing pass copy kernel.
    /// Override: `STREAMPRIO_TIMING_CHUNK_ELEMENTS`
    pub timing_chunk_elements: usize,

    /// Chunks per queue in the timing pass.
    /// Override: `STREAMPRIO_TIMING_CHUNKS`
    pub timing_chunks: usize,

    /// Kernel grid size (blocks).
    /// Override: `STREAMPRIO_GRID_SIZE`
    pub grid_size: u32,

    /// Kernel block size (threads per block).
    /// Override: `STREAMPRIO_BLOCK_SIZE`
    pub block_size: u32,

    /// OS threads in the concurrent pass.
    /// Override: `STREAMPRIO_WORKER_THREADS`
    pub worker_threads: usize,

    /// Queues per tier in the multi-queue timing pass.
    /// Override: `STREAMPRIO_QUEUES_PER_TIER`
    pub queues_per_tier: usize,

    /// A higher tier fails when slower than `tolerance × lower`.
    /// Override: `STREAMPRIO_FAIRNESS_TOLERANCE`
    pub fairness_tolerance: f64,

    /// Timing runs averaged per tier before the fairness check.
    /// Override: `STREAMPRIO_FAIRNESS_TRIALS`
    pub fairness_trials: u32,

    /// Override: `STREAMPRIO_SYNC`
    pub sync_strategy: SyncStrategy,

    /// Flags for timing-pass queues.
    /// Override: `STREAMPRIO_QUEUE_FLAGS`
    pub queue_flags: QueueFlags,

    /// Simulated device parameters.
    /// Overrides: `STREAMPRIO_PRIORITY_LOW`, `STREAMPRIO_PRIORITY_HIGH`,
    /// `STREAMPRIO_COMPUTE_UNITS`, `STREAMPRIO_UNIT_DELAY_US`
    pub device: SimDeviceConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            elements_per_queue: 1_048_576,
            init_value: 2,
            concurrent_elements_per_queue: 65_536,
            timing_chunk_elements: 262_144,
            timing_chunks: 8,
            grid_size: 1024,
            block_size: 256,
            worker_threads: 16,
            queues_per_tier: 2,
            fairness_tolerance: 1.05,
            fairness_trials: 1,
            sync_strategy: SyncStrategy::Device,
            queue_flags: QueueFlags::DEFAULT,
            device: SimDeviceConfig::default(),
        }
    }
}

/// Errors that can occur when loading or validating a [`HarnessConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride { key: String, value: String, reason: String },
}

/// Every environment variable consulted by [`HarnessConfig::apply_env_overrides`].
pub const ENV_KEYS: [&str; 17] = [
    "STREAMPRIO_ELEMENTS",
    "STREAMPRIO_INIT_VALUE",
    "STREAMPRIO_CONCURRENT_ELEMENTS",
    "STREAMPRIO_TIMING_CHUNK_ELEMENTS",
    "STREAMPRIO_TIMING_CHUNKS",
    "STREAMPRIO_GRID_SIZE",
    "STREAMPRIO_BLOCK_SIZE",
    "STREAMPRIO_WORKER_THREADS",
    "STREAMPRIO_QUEUES_PER_TIER",
    "STREAMPRIO_FAIRNESS_TOLERANCE",
    "STREAMPRIO_FAIRNESS_TRIALS",
    "STREAMPRIO_SYNC",
    "STREAMPRIO_QUEUE_FLAGS",
    "STREAMPRIO_PRIORITY_LOW",
    "STREAMPRIO_PRIORITY_HIGH",
    "STREAMPRIO_COMPUTE_UNITS",
    "STREAMPRIO_UNIT_DELAY_US",
];

fn env_override<T>(key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(val) = std::env::var(key) {
        *slot = val.parse::<T>().map_err(|e| ConfigError::EnvOverride {
            key: key.into(),
            value: val.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

impl HarnessConfig {
    /// Render the default configuration as TOML.
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields, then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut cfg: HarnessConfig = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load only from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Total elements per queue in the timing pass.
    pub fn timing_elements(&self) -> usize {
        self.timing_chunk_elements.saturating_mul(self.timing_chunks)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("elements_per_queue", self.elements_per_queue),
            ("concurrent_elements_per_queue", self.concurrent_elements_per_queue),
            ("timing_chunk_elements", self.timing_chunk_elements),
            ("timing_chunks", self.timing_chunks),
            ("worker_threads", self.worker_threads),
            ("queues_per_tier", self.queues_per_tier),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be > 0")));
            }
        }
        if self.grid_size == 0 {
            return Err(ConfigError::Validation("grid_size must be > 0".into()));
        }
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(ConfigError::Validation(format!(
                "block_size must be a power of two, got {}",
                self.block_size
            )));
        }
        if self.block_size > self.device.max_threads_per_block {
            return Err(ConfigError::Validation(format!(
                "block_size must be <= {}, got {}",
                self.device.max_threads_per_block, self.block_size
            )));
        }
        if !self.fairness_tolerance.is_finite() || self.fairness_tolerance < 1.0 {
            return Err(ConfigError::Validation(format!(
                "fairness_tolerance must be a finite value >= 1.0, got {}",
                self.fairness_tolerance
            )));
        }
        if self.fairness_trials == 0 {
            return Err(ConfigError::Validation("fairness_trials must be >= 1".into()));
        }
        self.device.validate().map_err(|e| ConfigError::Validation(format!("device: {e}")))
    }

    /// Apply `STREAMPRIO_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        env_override("STREAMPRIO_ELEMENTS", &mut self.elements_per_queue)?;
        env_override("STREAMPRIO_INIT_VALUE", &mut self.init_value)?;
        env_override("STREAMPRIO_CONCURRENT_ELEMENTS", &mut self.concurrent_elements_per_queue)?;
        env_override("STREAMPRIO_TIMING_CHUNK_ELEMENTS", &mut self.timing_chunk_elements)?;
        env_override("STREAMPRIO_TIMING_CHUNKS", &mut self.timing_chunks)?;
        env_override("STREAMPRIO_GRID_SIZE", &mut self.grid_size)?;
        env_override("STREAMPRIO_BLOCK_SIZE", &mut self.block_size)?;
        env_override("STREAMPRIO_WORKER_THREADS", &mut self.worker_threads)?;
        env_override("STREAMPRIO_QUEUES_PER_TIER", &mut self.queues_per_tier)?;
        env_override("STREAMPRIO_FAIRNESS_TOLERANCE", &mut self.fairness_tolerance)?;
        env_override("STREAMPRIO_FAIRNESS_TRIALS", &mut self.fairness_trials)?;
        env_override("STREAMPRIO_SYNC", &mut self.sync_strategy)?;
        env_override("STREAMPRIO_QUEUE_FLAGS", &mut self.queue_flags)?;
        env_override("STREAMPRIO_PRIORITY_LOW", &mut self.device.priority_low)?;
        env_override("STREAMPRIO_PRIORITY_HIGH", &mut self.device.priority_high)?;
        env_override("STREAMPRIO_COMPUTE_UNITS", &mut self.device.compute_units)?;
        env_override("STREAMPRIO_UNIT_DELAY_US", &mut self.device.unit_delay_us)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Every override unset except `set`.
    fn env_with(set: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        ENV_KEYS
            .iter()
            .map(|key| (*key, set.iter().find(|(k, _)| k == key).map(|(_, v)| *v)))
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(HarnessConfig::default().validate().is_ok());
    }

    #[test]
    #[serial(streamprio_env)]
    fn test_default_toml_round_trips() {
        temp_env::with_vars(env_with(&[]), || {
            let toml_str = HarnessConfig::default_toml().unwrap();
            let cfg = HarnessConfig::from_toml(&toml_str).unwrap();
            assert_eq!(cfg, HarnessConfig::default());
        });
    }

    #[test]
    #[serial(streamprio_env)]
    fn test_from_toml_partial() {
        let toml_str = r#"
elements_per_queue = 4096
sync_strategy = "per-queue"
queue_flags = "non-blocking"

[device]
priority_low = 1
priority_high = -2
compute_units = 2
"#;
        temp_env::with_vars(env_with(&[]), || {
            let cfg = HarnessConfig::from_toml(toml_str).unwrap();
            assert_eq!(cfg.elements_per_queue, 4096);
            assert_eq!(cfg.sync_strategy, SyncStrategy::PerQueue);
            assert_eq!(cfg.queue_flags, QueueFlags::NON_BLOCKING);
            assert_eq!(cfg.device.priority_range(), streamprio_runtime::PriorityRange::new(1, -2));
            assert_eq!(cfg.device.compute_units, 2);
            // Untouched fields keep their defaults.
            assert_eq!(cfg.init_value, 2);
            assert_eq!(cfg.fairness_tolerance, 1.05);
        });
    }

    #[test]
    fn test_validation_block_size_not_power_of_two() {
        let cfg = HarnessConfig { block_size: 100, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("power of two"));
    }

    #[test]
    fn test_validation_block_size_above_device_limit() {
        let cfg = HarnessConfig { block_size: 2048, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("<= 1024"));
    }

    #[test]
    fn test_validation_tolerance_below_one() {
        let cfg = HarnessConfig { fairness_tolerance: 0.9, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("fairness_tolerance"));
    }

    #[test]
    fn test_validation_zero_workers() {
        let cfg = HarnessConfig { worker_threads: 0, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("worker_threads must be > 0"));
    }

    #[test]
    fn test_validation_device_zero_compute_units() {
        let mut cfg = HarnessConfig::default();
        cfg.device.compute_units = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().starts_with("validation failed: device:"));
    }

    #[test]
    #[serial(streamprio_env)]
    fn test_env_override_multiple_fields() {
        temp_env::with_vars(
            env_with(&[
                ("STREAMPRIO_ELEMENTS", "1024"),
                ("STREAMPRIO_WORKER_THREADS", "4"),
                ("STREAMPRIO_SYNC", "per-queue"),
                ("STREAMPRIO_QUEUE_FLAGS", "non-blocking"),
                ("STREAMPRIO_PRIORITY_LOW", "0"),
                ("STREAMPRIO_PRIORITY_HIGH", "0"),
                ("STREAMPRIO_FAIRNESS_TRIALS", "3"),
            ]),
            || {
                let cfg = HarnessConfig::from_env().unwrap();
                assert_eq!(cfg.elements_per_queue, 1024);
                assert_eq!(cfg.worker_threads, 4);
                assert_eq!(cfg.sync_strategy, SyncStrategy::PerQueue);
                assert_eq!(cfg.queue_flags, QueueFlags::NON_BLOCKING);
                assert!(!cfg.device.priority_range().is_supported());
                assert_eq!(cfg.fairness_trials, 3);
            },
        );
    }

    #[test]
    #[serial(streamprio_env)]
    fn test_env_override_invalid_number() {
        temp_env::with_vars(env_with(&[("STREAMPRIO_GRID_SIZE", "lots")]), || {
            match HarnessConfig::from_env().unwrap_err() {
                ConfigError::EnvOverride { key, value, .. } => {
                    assert_eq!(key, "STREAMPRIO_GRID_SIZE");
                    assert_eq!(value, "lots");
                }
                other => panic!("expected EnvOverride, got: {other}"),
            }
        });
    }

    #[test]
    #[serial(streamprio_env)]
    fn test_env_override_invalid_sync() {
        temp_env::with_vars(env_with(&[("STREAMPRIO_SYNC", "eventually")]), || {
            let err = HarnessConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("unknown sync strategy"));
        });
    }

    #[test]
    #[serial(streamprio_env)]
    fn test_load_from_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamprio.toml");
        std::fs::write(&path, HarnessConfig::default_toml().unwrap()).unwrap();
        temp_env::with_vars(env_with(&[]), || {
            let cfg = HarnessConfig::load(&path).unwrap();
            assert_eq!(cfg, HarnessConfig::default());
        });
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = HarnessConfig::load(Path::new("/nonexistent/streamprio.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_sync_strategy_display_roundtrip() {
        for strategy in SyncStrategy::ALL {
            let parsed: SyncStrategy = strategy.to_string().parse().unwrap();
            assert_eq!(strategy, parsed);
        }
    }
}
