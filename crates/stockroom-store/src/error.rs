// SPDX-License-Identifier: Apache-2.0

use rusqlite::ErrorCode as SqliteErrorCode;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorCode {
    NotFound,
    Validation,
    Conflict,
    Io,
    Internal,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation_error",
            Self::Conflict => "conflict",
            Self::Io => "io_error",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                SqliteErrorCode::ConstraintViolation => StoreErrorCode::Conflict,
                SqliteErrorCode::CannotOpen
                | SqliteErrorCode::SystemIoFailure
                | SqliteErrorCode::ReadOnly
                | SqliteErrorCode::DiskFull
                | SqliteErrorCode::DatabaseBusy
                | SqliteErrorCode::DatabaseLocked => StoreErrorCode::Io,
                _ => StoreErrorCode::Internal,
            },
            rusqlite::Error::QueryReturnedNoRows => StoreErrorCode::NotFound,
            rusqlite::Error::FromSqlConversionFailure(..) => StoreErrorCode::Validation,
            _ => StoreErrorCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<stockroom_model::ValidationError> for StoreError {
    fn from(err: stockroom_model::ValidationError) -> Self {
        Self::new(StoreErrorCode::Validation, err.0)
    }
}
