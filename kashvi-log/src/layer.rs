use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::record::LogRecord;
use crate::sink::AsyncLogSink;

/// A `tracing` layer that converts events into [`LogRecord`]s and emits them
/// into an [`AsyncLogSink`].
pub struct SinkLayer {
    sink: Arc<AsyncLogSink>,
}

impl SinkLayer {
    pub fn new(sink: Arc<AsyncLogSink>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        self.sink.emit(LogRecord {
            time: Utc::now(),
            level: level_str(event.metadata().level()),
            msg: visitor.message.unwrap_or_default(),
            request_id: visitor.request_id,
            attrs: visitor.attrs,
        });
    }
}

/// Splits an event's fields into message, request id, and attributes.
#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    request_id: Option<String>,
    attrs: Map<String, Value>,
}

impl RecordVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        match field.name() {
            "message" => self.message = Some(display_value(&value)),
            "request_id" => self.request_id = Some(display_value(&value)),
            name => {
                self.attrs.insert(name.to_string(), value);
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Visit for RecordVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::from(format!("{value:?}")));
    }
}

fn level_str(level: &Level) -> &'static str {
    if *level == Level::ERROR {
        "ERROR"
    } else if *level == Level::WARN {
        "WARN"
    } else if *level == Level::INFO {
        "INFO"
    } else if *level == Level::DEBUG {
        "DEBUG"
    } else {
        "TRACE"
    }
}

/// Install the process-wide subscriber: stdout at `stdout_level`, fanned out
/// to the remote sink at its own level when one is supplied.
///
/// The per-sink filters are what let development setups write DEBUG to
/// stdout while the remote store receives INFO and above. Does nothing if a
/// subscriber is already installed.
pub fn init(stdout_level: LevelFilter, remote: Option<(Arc<AsyncLogSink>, LevelFilter)>) {
    let remote_layer = remote.map(|(sink, level)| SinkLayer::new(sink).with_filter(level));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(stdout_level))
        .with(remote_layer)
        .try_init();
}
