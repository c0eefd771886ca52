// SPDX-License-Identifier: Apache-2.0

use stockroom_model::{EffectStatus, TransactionKind, TransactionRequest};

#[test]
fn transaction_request_accepts_legacy_kind_names() {
    let req: TransactionRequest = serde_json::from_str(
        r#"{"kind":"retirada","item_id":7,"quantity":2,"actor":"Bruno"}"#,
    )
    .expect("parse");
    assert_eq!(req.kind, TransactionKind::CheckOut);

    let req: TransactionRequest = serde_json::from_str(
        r#"{"kind":"check_in","item_id":7,"quantity":1,"actor":"Bruno"}"#,
    )
    .expect("parse");
    assert_eq!(req.kind, TransactionKind::CheckIn);
}

#[test]
fn transaction_request_rejects_unknown_fields() {
    let err = serde_json::from_str::<TransactionRequest>(
        r#"{"kind":"check_out","item_id":7,"quantity":2,"actor":"Bruno","extra":true}"#,
    );
    assert!(err.is_err());
}

#[test]
fn effect_status_serializes_with_reason_only_on_failure() {
    let applied = serde_json::to_value(EffectStatus::Applied).expect("json");
    assert_eq!(applied, serde_json::json!({"status": "applied"}));
    let failed = serde_json::to_value(EffectStatus::Failed("timeout".to_string())).expect("json");
    assert_eq!(failed, serde_json::json!({"status": "failed", "reason": "timeout"}));
}
