// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use stockroom_model::{
    EffectStatus, ItemKey, ItemUpsert, TransactionKind, TransactionRequest,
};
use stockroom_server::{
    ChatNotifier, FakeMirror, FakeNotifier, HistoryMirror, NotifierSettings, ProcessorOptions,
    TransactionError, TransactionProcessor,
};
use stockroom_store::LedgerStore;

fn seed(store: &LedgerStore, name: &str, total: i64, codes: &[&str]) -> i64 {
    let mut upsert = ItemUpsert::fresh(ItemKey::new(name, "Produto").expect("key"), total);
    upsert.codes = codes.iter().map(ToString::to_string).collect();
    store.upsert_item(&upsert).expect("seed item")
}

fn request(kind: TransactionKind, item_id: i64, quantity: i64, actor: &str) -> TransactionRequest {
    TransactionRequest {
        kind,
        item_id,
        quantity,
        actor: actor.to_string(),
    }
}

struct Harness {
    store: Arc<LedgerStore>,
    processor: TransactionProcessor,
    notifier: Arc<FakeNotifier>,
    mirror: Arc<FakeMirror>,
}

fn harness(notifier: FakeNotifier, chat_enabled: bool) -> Harness {
    harness_with(notifier, Arc::new(NotifierSettings::in_memory(chat_enabled)))
}

fn harness_with(notifier: FakeNotifier, settings: Arc<NotifierSettings>) -> Harness {
    let store = Arc::new(LedgerStore::open_in_memory().expect("store"));
    let notifier = Arc::new(notifier);
    let mirror = Arc::new(FakeMirror::default());
    let chat: Arc<dyn ChatNotifier> = notifier.clone();
    let history: Arc<dyn HistoryMirror> = mirror.clone();
    let processor = TransactionProcessor::new(
        Arc::clone(&store),
        chat,
        history,
        settings,
        ProcessorOptions {
            chat_channel: "C-STOCK".to_string(),
            external_timeout: Duration::from_millis(200),
            ..ProcessorOptions::default()
        },
    );
    Harness {
        store,
        processor,
        notifier,
        mirror,
    }
}

#[tokio::test]
async fn drill_checkout_then_partial_return() {
    let h = harness(FakeNotifier::default(), true);
    let drill = seed(&h.store, "Drill", 6, &["D-1", "D-2", "D-3", "D-4", "D-5", "D-6"]);

    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, drill, 3, "Ana"))
        .await
        .expect("checkout");
    assert!(out.success);
    assert_eq!(out.new_balance, 3);
    assert!(out.notified);
    assert_eq!(out.side_effects.usage_records, 3);
    assert_eq!(out.side_effects.mirror, EffectStatus::Applied);

    let item = h.store.get_item(drill).expect("read").expect("item");
    assert_eq!((item.total, item.available, item.in_use), (6, 3, 3));

    let err = h
        .processor
        .process(request(TransactionKind::CheckOut, drill, 4, "Ana"))
        .await
        .expect_err("oversell");
    assert_eq!(err, TransactionError::InsufficientStock { available: 3 });

    let out = h
        .processor
        .process(request(TransactionKind::CheckIn, drill, 2, "Ana"))
        .await
        .expect("checkin");
    assert_eq!(out.new_balance, 5);
    assert_eq!(out.side_effects.usage_records, 2);

    let remaining = h.store.list_usage_records_for_item(drill).expect("usage");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].code.as_deref(), Some("D-3"));

    let err = h
        .processor
        .process(request(TransactionKind::CheckIn, drill, 2, "Ana"))
        .await
        .expect_err("return more than in use");
    assert_eq!(err, TransactionError::InvalidQuantity { in_use: 1 });
    assert_eq!(h.mirror.recorded().await.len(), 2);
    assert_eq!(h.notifier.messages().await.len(), 2);
}

#[tokio::test]
async fn second_checkout_skips_codes_already_on_loan() {
    let h = harness(FakeNotifier::default(), false);
    let kit = seed(&h.store, "Kit", 4, &["K-1", "K-2"]);

    h.processor
        .process(request(TransactionKind::CheckOut, kit, 1, "Ana"))
        .await
        .expect("first");
    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, kit, 3, "Bruno"))
        .await
        .expect("second");
    assert_eq!(out.side_effects.usage_records, 1);

    let records = h.store.list_usage_records_for_item(kit).expect("usage");
    let mut codes: Vec<_> = records.iter().filter_map(|r| r.code.clone()).collect();
    codes.sort();
    assert_eq!(codes, vec!["K-1".to_string(), "K-2".to_string()]);
    let item = h.store.get_item(kit).expect("read").expect("item");
    assert_eq!(item.in_use, 4);
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let h = harness(FakeNotifier::default(), false);
    let item = seed(&h.store, "Multimeter", 5, &[]);
    let processor = Arc::new(h.processor);

    let mut tasks = Vec::new();
    for n in 0..12 {
        let processor = Arc::clone(&processor);
        tasks.push(tokio::spawn(async move {
            processor
                .process(request(TransactionKind::CheckOut, item, 1, &format!("user-{n}")))
                .await
        }));
    }
    let mut ok = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("join") {
            Ok(_) => ok += 1,
            Err(TransactionError::InsufficientStock { available: 0 }) => rejected += 1,
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!((ok, rejected), (5, 7));
    let item = h.store.get_item(item).expect("read").expect("item");
    assert_eq!((item.available, item.in_use), (0, 5));
    assert_eq!(h.store.list_transactions(50).expect("history").len(), 5);
}

#[tokio::test]
async fn failing_side_effects_never_undo_the_movement() {
    let notifier = FakeNotifier::default();
    notifier.fail_send.store(true, Ordering::Relaxed);
    let h = harness(notifier, true);
    h.mirror.fail.store(true, Ordering::Relaxed);
    let item = seed(&h.store, "Soldering iron", 2, &[]);

    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, item, 1, "Ana"))
        .await
        .expect("committed despite side effects");
    assert!(out.success);
    assert!(!out.notified);
    assert!(matches!(out.side_effects.notification, EffectStatus::Failed(_)));
    assert!(matches!(out.side_effects.mirror, EffectStatus::Failed(_)));
    assert_eq!(out.side_effects.usage_records, 0);

    let stored = h
        .store
        .get_transaction(out.transaction_id)
        .expect("read")
        .expect("transaction persisted");
    assert_eq!(stored.balance_after, 1);
}

#[tokio::test]
async fn slow_notifier_is_bounded_by_the_external_timeout() {
    let h = harness(
        FakeNotifier {
            send_delay: Some(Duration::from_secs(5)),
            ..FakeNotifier::default()
        },
        true,
    );
    let item = seed(&h.store, "Scope", 1, &[]);
    let started = std::time::Instant::now();
    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, item, 1, "Ana"))
        .await
        .expect("checkout");
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!out.notified);
    assert_eq!(
        out.side_effects.notification,
        EffectStatus::Failed("chat notification timed out".to_string())
    );
}

#[tokio::test]
async fn unconfigured_notifier_is_reported_not_raised() {
    let h = harness(
        FakeNotifier {
            configured: false,
            ..FakeNotifier::default()
        },
        true,
    );
    let item = seed(&h.store, "Clamp", 3, &[]);
    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, item, 1, "Ana"))
        .await
        .expect("checkout");
    assert!(!out.notified);
    assert!(matches!(out.side_effects.notification, EffectStatus::Failed(_)));
    assert_eq!(h.notifier.lookups.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn notifier_without_channel_counts_as_unconfigured() {
    let store = Arc::new(LedgerStore::open_in_memory().expect("store"));
    let notifier = Arc::new(FakeNotifier::default());
    let processor = TransactionProcessor::new(
        Arc::clone(&store),
        notifier.clone(),
        Arc::new(FakeMirror::default()),
        Arc::new(NotifierSettings::in_memory(true)),
        ProcessorOptions {
            chat_channel: "  ".to_string(),
            external_timeout: Duration::from_millis(200),
            ..ProcessorOptions::default()
        },
    );
    assert!(notifier.is_configured());
    assert!(!processor.notifier_configured());

    let item = seed(&store, "Level", 2, &[]);
    let out = processor
        .process(request(TransactionKind::CheckOut, item, 1, "Ana"))
        .await
        .expect("checkout");
    assert!(!out.notified);
    assert_eq!(
        out.side_effects.notification,
        EffectStatus::Failed("notifier not configured".to_string())
    );
    assert!(notifier.messages().await.is_empty());
}

#[tokio::test]
async fn chat_directory_resolves_actor_without_people_section() {
    let h = harness(FakeNotifier::default().with_user("Bruno Lima", "U0002"), true);
    let item = seed(&h.store, "Caliper", 2, &[]);
    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, item, 1, "bruno"))
        .await
        .expect("checkout");
    assert_eq!(out.side_effects.chat_identity.as_deref(), Some("U0002"));
    let messages = h.notifier.messages().await;
    assert!(messages[0].1.contains("<@U0002>"));
}

#[tokio::test]
async fn toggle_file_is_read_fresh_before_each_notification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    let settings = Arc::new(NotifierSettings::file(path.clone(), true));
    let h = harness_with(FakeNotifier::default(), settings);
    let item = seed(&h.store, "Tape", 5, &[]);

    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, item, 1, "Ana"))
        .await
        .expect("first");
    assert!(out.notified);

    std::fs::write(&path, br#"{"chat_enabled":false}"#).expect("external edit");
    let out = h
        .processor
        .process(request(TransactionKind::CheckOut, item, 1, "Ana"))
        .await
        .expect("second");
    assert!(!out.notified);
    assert_eq!(out.side_effects.notification, EffectStatus::Skipped);
}

#[tokio::test]
async fn invalid_requests_do_not_touch_the_ledger() {
    let h = harness(FakeNotifier::default(), true);
    let item = seed(&h.store, "Drill", 6, &[]);

    for (quantity, actor) in [(0, "Ana"), (-2, "Ana"), (1, "  ")] {
        let err = h
            .processor
            .process(request(TransactionKind::CheckOut, item, quantity, actor))
            .await
            .expect_err("invalid request");
        assert!(matches!(err, TransactionError::Validation(_)), "{err:?}");
    }
    let err = h
        .processor
        .process(request(TransactionKind::CheckOut, 404, 1, "Ana"))
        .await
        .expect_err("missing item");
    assert_eq!(err, TransactionError::NotFound(404));
    assert_eq!(err.to_machine_error().code, "not_found");
    assert!(h.store.list_transactions(10).expect("history").is_empty());
}
