// SPDX-License-Identifier: Apache-2.0

mod model;

pub use model::{ErrorCode, ExitCode, MachineError, ERROR_CODES};
