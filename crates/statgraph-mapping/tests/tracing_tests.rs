//! Checks the structured `debug` events the compiler emits when it drops
//! entries, captured through a `tracing_subscriber` layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use statgraph_mapping::{compile, wikidata_mapping, DatatypeMask, Filter, SnakMask, WikidataConfig};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Debug, Clone, Default)]
struct EventStore(Arc<Mutex<Vec<HashMap<String, String>>>>);

impl EventStore {
    fn events(&self) -> Vec<HashMap<String, String>> {
        self.0.lock().unwrap().clone()
    }

    fn with_message(&self, message: &str) -> Vec<HashMap<String, String>> {
        self.events()
            .into_iter()
            .filter(|e| e.get("message").map(String::as_str) == Some(message))
            .collect()
    }
}

struct FieldVisitor(HashMap<String, String>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

struct EventCapture(EventStore);

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = FieldVisitor(HashMap::new());
        event.record(&mut fields);
        self.0 .0.lock().unwrap().push(fields.0);
    }
}

fn capture() -> (EventStore, tracing::subscriber::DefaultGuard) {
    let store = EventStore::default();
    let subscriber = tracing_subscriber::registry().with(EventCapture(store.clone()));
    (store, tracing::subscriber::set_default(subscriber))
}

#[test]
fn masked_entries_are_logged_with_a_reason() -> Result<()> {
    let mapping = wikidata_mapping(&WikidataConfig::default())?;
    let filter = Filter::builder()
        .snak_mask(SnakMask::VALUE_SNAK)
        .value_mask(DatatypeMask::QUANTITY | DatatypeMask::TIME)
        .build()?;

    let (store, _guard) = capture();
    let compiled = compile(&mapping, &filter)?;
    assert_eq!(compiled.plans().len(), 2);

    let skipped = store.with_message("entry skipped");
    let reason_of = |id: usize| {
        skipped
            .iter()
            .find(|e| e.get("entry") == Some(&id.to_string()))
            .and_then(|e| e.get("reason").cloned())
    };
    for id in 0..7 {
        assert_eq!(reason_of(id).as_deref(), Some("value datatype masked out"));
    }
    assert_eq!(reason_of(9).as_deref(), Some("snak kind masked out"));
    assert_eq!(reason_of(10).as_deref(), Some("snak kind masked out"));
    assert_eq!(reason_of(7), None);

    let done = store.with_message("filter compiled");
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].get("branches").map(String::as_str), Some("2"));
    Ok(())
}

#[test]
fn empty_filters_log_once_and_compile_nothing() -> Result<()> {
    let mapping = wikidata_mapping(&WikidataConfig::default())?;
    let filter = Filter::builder().snak_mask(SnakMask::NONE).build()?;

    let (store, _guard) = capture();
    let compiled = compile(&mapping, &filter)?;
    assert!(compiled.is_always_false());
    assert_eq!(store.with_message("filter matches nothing").len(), 1);
    assert!(store.with_message("entry skipped").is_empty());
    Ok(())
}
