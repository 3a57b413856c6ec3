//! Queue handles and creation flags.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

/// Opaque queue handle. [`QueueId::DEFAULT`] names the implicit default
/// queue, which always exists and is never created or destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueId(pub u64);

impl QueueId {
    pub const DEFAULT: Self = Self(0);

    pub const fn is_default(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_default() { write!(f, "queue#default") } else { write!(f, "queue#{}", self.0) }
    }
}

/// Queue creation flags. Exactly two enumerants are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueueFlags(u32);

impl QueueFlags {
    /// Work on this queue is ordered with respect to the default queue.
    pub const DEFAULT: Self = Self(0x0);
    /// Work on this queue never synchronises with the default queue.
    pub const NON_BLOCKING: Self = Self(0x1);

    /// Validate a raw flag word.
    ///
    /// Anything other than [`QueueFlags::DEFAULT`] or
    /// [`QueueFlags::NON_BLOCKING`] is rejected with
    /// [`ErrorCode::InvalidConfiguration`](crate::ErrorCode::InvalidConfiguration).
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            0x0 => Ok(Self::DEFAULT),
            0x1 => Ok(Self::NON_BLOCKING),
            other => Err(RuntimeError::InvalidConfiguration(format!(
                "unrecognised queue flags {other:#x}"
            ))),
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_non_blocking(self) -> bool {
        self.0 == Self::NON_BLOCKING.0
    }
}

impl std::fmt::Display for QueueFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_non_blocking() { write!(f, "non-blocking") } else { write!(f, "default") }
    }
}

impl std::str::FromStr for QueueFlags {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::DEFAULT),
            "non-blocking" | "nonblocking" | "non_blocking" => Ok(Self::NON_BLOCKING),
            other => Err(format!("unknown queue flags: {other}")),
        }
    }
}

impl Serialize for QueueFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QueueFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
