// SPDX-License-Identifier: Apache-2.0

use stockroom_core::{ErrorCode, ExitCode, MachineError, ERROR_CODES};

#[test]
fn display_and_debug_contracts_are_stable() {
    assert_eq!(format!("{}", ErrorCode::InsufficientStock), "insufficient_stock");
    assert_eq!(format!("{:?}", ExitCode::Internal), "Internal");

    let err = MachineError::from_code(ErrorCode::NotFound, "item 7 not found");
    assert_eq!(format!("{err}"), "not_found: item 7 not found");
    assert_eq!(
        format!("{err:?}"),
        "MachineError { code: \"not_found\", message: \"item 7 not found\", details: {} }"
    );
}

#[test]
fn error_codes_serialize_as_their_wire_names() {
    for code in ERROR_CODES {
        let json = serde_json::to_string(code).expect("serialize code");
        assert_eq!(json, format!("\"{}\"", code.as_str()));
    }
}

#[test]
fn client_errors_and_dependency_errors_map_to_distinct_exit_codes() {
    assert_eq!(ErrorCode::InsufficientStock.exit_code(), ExitCode::Validation);
    assert_eq!(
        ErrorCode::ExternalSourceUnavailable.exit_code(),
        ExitCode::DependencyFailure
    );
    assert_eq!(ErrorCode::StorageInconsistency.exit_code(), ExitCode::Internal);
}
