//! Runtime error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime status codes (subset of the usual GPU runtime enumerants).
///
/// Negative tests compare these exactly, so every [`RuntimeError`] maps to
/// one code via [`RuntimeError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    InvalidValue = 1,
    NotInitialized = 3,
    InvalidConfiguration = 9,
    InvalidDevice = 101,
    InvalidHandle = 400,
    NotReady = 600,
    LaunchFailure = 719,
    Unknown = 999,
}

impl ErrorCode {
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::InvalidValue,
            3 => Self::NotInitialized,
            9 => Self::InvalidConfiguration,
            101 => Self::InvalidDevice,
            400 => Self::InvalidHandle,
            600 => Self::NotReady,
            719 => Self::LaunchFailure,
            _ => Self::Unknown,
        }
    }

    /// Raw numeric value of the code.
    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Symbolic name, e.g. `"InvalidValue"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InvalidValue => "InvalidValue",
            Self::NotInitialized => "NotInitialized",
            Self::InvalidConfiguration => "InvalidConfiguration",
            Self::InvalidDevice => "InvalidDevice",
            Self::InvalidHandle => "InvalidHandle",
            Self::NotReady => "NotReady",
            Self::LaunchFailure => "LaunchFailure",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.raw())
    }
}

/// Errors produced by a [`ComputeBackend`](crate::ComputeBackend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid {kind} handle: {id}")]
    InvalidHandle { kind: &'static str, id: u64 },

    #[error("no device at index {index} ({count} available)")]
    InvalidDevice { index: usize, count: usize },

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("kernel launch failed: {0}")]
    KernelLaunch(String),

    #[error("failed to start device worker: {0}")]
    WorkerStart(String),

    #[error("backend has been shut down")]
    ShutDown,
}

impl RuntimeError {
    /// The status code a runtime would have returned for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidValue(_) => ErrorCode::InvalidValue,
            Self::InvalidConfiguration(_) => ErrorCode::InvalidConfiguration,
            Self::InvalidHandle { .. } => ErrorCode::InvalidHandle,
            Self::InvalidDevice { .. } => ErrorCode::InvalidDevice,
            Self::NotReady(_) => ErrorCode::NotReady,
            Self::KernelLaunch(_) => ErrorCode::LaunchFailure,
            Self::WorkerStart(_) | Self::ShutDown => ErrorCode::NotInitialized,
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, RuntimeError>;
