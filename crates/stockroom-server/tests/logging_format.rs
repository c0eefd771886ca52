// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::sync::{Arc, Mutex};

use stockroom_model::{ItemKey, ItemUpsert, TransactionKind, TransactionRequest};
use stockroom_server::{
    FakeMirror, FakeNotifier, NotifierSettings, ProcessorOptions, TransactionProcessor,
};
use stockroom_store::LedgerStore;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn captured_lines(sink: &SharedBuffer) -> Vec<serde_json::Value> {
    let bytes = sink.0.lock().expect("lock output").clone();
    let text = String::from_utf8(bytes).expect("utf8 log output");
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("json log line"))
        .collect()
}

#[tokio::test]
async fn committed_transaction_is_logged_as_structured_json() {
    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = Arc::new(LedgerStore::open_in_memory().expect("store"));
    let item = store
        .upsert_item(&ItemUpsert::fresh(
            ItemKey::new("Drill", "Produto").expect("key"),
            3,
        ))
        .expect("seed");
    let processor = TransactionProcessor::new(
        store,
        Arc::new(FakeNotifier::default()),
        Arc::new(FakeMirror::default()),
        Arc::new(NotifierSettings::in_memory(false)),
        ProcessorOptions::default(),
    );
    processor
        .process(TransactionRequest {
            kind: TransactionKind::CheckOut,
            item_id: item,
            quantity: 1,
            actor: "Ana".to_string(),
        })
        .await
        .expect("checkout");

    let lines = captured_lines(&sink);
    let committed = lines
        .iter()
        .find(|l| l["fields"]["message"] == "transaction committed")
        .expect("commit event");
    assert_eq!(committed["level"], "INFO");
    assert!(committed["target"]
        .as_str()
        .is_some_and(|t| t.starts_with("stockroom_server")));
    assert_eq!(committed["fields"]["kind"], "check_out");
    assert_eq!(committed["fields"]["balance_after"], 2);
    assert_eq!(committed["fields"]["item_id"], item);
}

#[test]
fn request_span_fields_render_in_json() {
    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let span = tracing::info_span!(
            "http.request",
            request_id = "req-123",
            method = "POST",
            route = "/api/transactions"
        );
        let _entered = span.enter();
        tracing::info!(status = 200_u16, "request finished");
    });

    let lines = captured_lines(&sink);
    let line = lines.first().expect("log line");
    assert_eq!(line["fields"]["status"], 200);
    assert_eq!(line["span"]["name"], "http.request");
    assert_eq!(line["span"]["request_id"], "req-123");
    assert_eq!(line["span"]["route"], "/api/transactions");
}
