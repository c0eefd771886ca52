// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod domain;
mod errors;
pub mod ports;

use sha2::{Digest, Sha256};

pub use domain::config::resolve_stockroom_data_dir;
pub use errors::{ErrorCode, ExitCode, MachineError, ERROR_CODES};
pub use ports::{Clock, FixedClock, SystemClock};

pub const CRATE_NAME: &str = "stockroom-core";

pub const ENV_STOCKROOM_LOG_LEVEL: &str = "STOCKROOM_LOG_LEVEL";
pub const ENV_STOCKROOM_DATA_DIR: &str = "STOCKROOM_DATA_DIR";

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_lowercase_and_stable() {
        assert_eq!(
            sha256_hex(b"stockroom"),
            sha256_hex(b"stockroom"),
            "hash must be deterministic"
        );
        let hex = sha256_hex(b"");
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
