//! Shared error type across tally crates.

use thiserror::Error;

use crate::metric::MetricKind;

/// Stable error codes, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A metric already exists under the requested name.
    AlreadyRegistered,
    /// No metric exists under the requested name.
    NotFound,
    /// The name holds a metric of another kind.
    KindMismatch,
    /// Rejected configuration value.
    InvalidConfig,
}

impl ErrorCode {
    /// String representation used by reporters and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AlreadyRegistered => "ALREADY_REGISTERED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::KindMismatch => "KIND_MISMATCH",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core and registry.
#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    #[error("metric already registered: {name}")]
    AlreadyRegistered { name: String },
    #[error("metric not found: {name}")]
    NotFound { name: String },
    #[error("metric {name} is a {found}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        found: MetricKind,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl MetricsError {
    pub fn already_registered(name: impl Into<String>) -> Self {
        MetricsError::AlreadyRegistered { name: name.into() }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        MetricsError::NotFound { name: name.into() }
    }

    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MetricsError::AlreadyRegistered { .. } => ErrorCode::AlreadyRegistered,
            MetricsError::NotFound { .. } => ErrorCode::NotFound,
            MetricsError::KindMismatch { .. } => ErrorCode::KindMismatch,
            MetricsError::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }
}
