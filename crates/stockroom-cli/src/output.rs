// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use stockroom_core::{ErrorCode, ExitCode, MachineError};
use stockroom_ingest::ReconcileError;
use stockroom_server::TransactionError;
use stockroom_store::{StoreError, StoreErrorCode};

#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputMode {
    pub json: bool,
}

#[derive(Debug)]
pub(crate) struct CliError {
    exit: ExitCode,
    error: MachineError,
}

impl CliError {
    pub(crate) fn usage(message: &str) -> Self {
        Self {
            exit: ExitCode::Usage,
            error: MachineError::new("usage_error", message.trim()),
        }
    }

    pub(crate) fn from_code(code: ErrorCode, message: &str) -> Self {
        Self {
            exit: code.exit_code(),
            error: MachineError::from_code(code, message),
        }
    }

    pub(crate) fn internal(message: &str) -> Self {
        Self::from_code(ErrorCode::Internal, message)
    }

    pub(crate) const fn exit_code(&self) -> ExitCode {
        self.exit
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let code = match err.code {
            StoreErrorCode::NotFound => ErrorCode::NotFound,
            StoreErrorCode::Validation | StoreErrorCode::Conflict => ErrorCode::ValidationFailed,
            _ => ErrorCode::Internal,
        };
        Self::from_code(code, &err.message)
    }
}

impl From<TransactionError> for CliError {
    fn from(err: TransactionError) -> Self {
        let error = err.to_machine_error();
        Self {
            exit: err.code().exit_code(),
            error,
        }
    }
}

impl From<ReconcileError> for CliError {
    fn from(err: ReconcileError) -> Self {
        Self::from_code(err.code(), &err.to_string())
    }
}

pub(crate) fn emit_ok(mode: OutputMode, payload: &impl serde::Serialize) -> Result<(), CliError> {
    let rendered = if mode.json {
        serde_json::to_string(payload)
    } else {
        serde_json::to_string_pretty(payload)
    }
    .map_err(|e| CliError::internal(&format!("render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn emit_error(err: &CliError) {
    let payload = serde_json::json!({ "error": err.error });
    match serde_json::to_string(&payload) {
        Ok(text) => eprintln!("{text}"),
        Err(_) => eprintln!("{err}"),
    }
}
