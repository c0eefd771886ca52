// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Validation = 3,
    DependencyFailure = 4,
    Internal = 10,
}

impl ExitCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Usage => "usage",
            Self::Validation => "validation",
            Self::DependencyFailure => "dependency_failure",
            Self::Internal => "internal",
        }
    }
}

/// Machine-readable failure taxonomy shared by the store, the reconciler and
/// the transaction processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    NotFound,
    InsufficientStock,
    InvalidQuantity,
    ValidationFailed,
    ExternalSourceUnavailable,
    ExternalSourceSectionMissing,
    NotifierUnavailable,
    NotifierSendFailed,
    StorageInconsistency,
    Internal,
}

pub const ERROR_CODES: &[ErrorCode] = &[
    ErrorCode::NotFound,
    ErrorCode::InsufficientStock,
    ErrorCode::InvalidQuantity,
    ErrorCode::ValidationFailed,
    ErrorCode::ExternalSourceUnavailable,
    ErrorCode::ExternalSourceSectionMissing,
    ErrorCode::NotifierUnavailable,
    ErrorCode::NotifierSendFailed,
    ErrorCode::StorageInconsistency,
    ErrorCode::Internal,
];

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InsufficientStock => "insufficient_stock",
            Self::InvalidQuantity => "invalid_quantity",
            Self::ValidationFailed => "validation_failed",
            Self::ExternalSourceUnavailable => "external_source_unavailable",
            Self::ExternalSourceSectionMissing => "external_source_section_missing",
            Self::NotifierUnavailable => "notifier_unavailable",
            Self::NotifierSendFailed => "notifier_send_failed",
            Self::StorageInconsistency => "storage_inconsistency",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub const fn exit_code(self) -> ExitCode {
        match self {
            Self::NotFound
            | Self::InsufficientStock
            | Self::InvalidQuantity
            | Self::ValidationFailed => ExitCode::Validation,
            Self::ExternalSourceUnavailable
            | Self::ExternalSourceSectionMissing
            | Self::NotifierUnavailable
            | Self::NotifierSendFailed => ExitCode::DependencyFailure,
            Self::StorageInconsistency | Self::Internal => ExitCode::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl MachineError {
    #[must_use]
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn from_code(code: ErrorCode, message: &str) -> Self {
        Self::new(code.as_str(), message)
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MachineError {}
