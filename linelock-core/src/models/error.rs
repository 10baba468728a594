use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::state::LineState;

/// Errors raised by the harness and its platform collaborators.
///
/// Only [`HarnessError::ResourceUnavailable`] is part of the phenomenon under
/// study. Every other variant means the experiment itself is invalid and
/// aborts a scenario run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HarnessError {
    #[error("no capture device found ({found} capture-capable device(s), need a secondary one)")]
    NoCaptureDeviceFound { found: usize },

    #[error("line unavailable on {device_id}: {message}")]
    ResourceUnavailable { device_id: String, message: String },

    #[error("invalid line state: cannot {operation} a {state} line")]
    InvalidLineState {
        operation: &'static str,
        state: LineState,
    },

    #[error("execution context {0} is no longer running")]
    ContextClosed(String),

    #[error("barrier acknowledgment failed: {0}")]
    Acknowledgment(String),

    #[error("platform backend error: {0}")]
    Backend(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCaptureDeviceFound { .. } => ErrorKind::NoCaptureDeviceFound,
            Self::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            Self::InvalidLineState { .. } => ErrorKind::InvalidLineState,
            Self::ContextClosed(_) => ErrorKind::ContextClosed,
            Self::Acknowledgment(_) => ErrorKind::Acknowledgment,
            Self::Backend(_) => ErrorKind::Backend,
            Self::ConfigurationFailed(_) => ErrorKind::ConfigurationFailed,
        }
    }

    /// Whether this error is the studied failure mode, recorded rather than
    /// propagated.
    pub fn is_studied(&self) -> bool {
        matches!(self, Self::ResourceUnavailable { .. })
    }
}

/// Field-less discriminant of [`HarnessError`], stored in outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NoCaptureDeviceFound,
    ResourceUnavailable,
    InvalidLineState,
    ContextClosed,
    Acknowledgment,
    Backend,
    ConfigurationFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
