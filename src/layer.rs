use crate::record::{EntryError, LogEntry, Severity};
use crate::shipper::{in_delivery_cycle, BatchShipper};
use serde_json::{Map, Value};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Crates whose events are never recorded: this crate (including
/// [`crate::console_sink::ConsoleSink`]) and the HTTP stack used to deliver
/// records. Recording the latter would queue new records on every delivery.
pub const IGNORED_TARGETS: &[&str] = &[
    "rest_log_sink",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "want",
    "mio",
];

/// Level used when neither the layer nor the shipper names one.
pub const DEFAULT_LAYER_SEVERITY: Severity = Severity::Error;

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|krate| {
        target == *krate
            || target
                .strip_prefix(krate)
                .map_or(false, |rest| rest.starts_with("::"))
    })
}

/// `tracing_subscriber` layer that turns events into [`LogEntry`]s and
/// hands them to a [`BatchShipper`].
///
/// Only events at or above the layer's minimum severity are recorded. It
/// defaults to the shipper's configured minimum, or to
/// [`DEFAULT_LAYER_SEVERITY`]. Events from [`IGNORED_TARGETS`] and events
/// emitted while a delivery cycle runs are skipped.
///
/// Recognized fields: `method` (defaults to the event target),
/// `correlation_id`, `elapsed_ms` and any field recorded as
/// `&dyn Error`. Everything else lands in the entry's `content`.
pub struct ShipperLayer {
    shipper: BatchShipper,
    minimum_severity: Severity,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Handed to the shipper.
    pub forwarded_events: Arc<AtomicU64>,
    /// Below the minimum severity, from an ignored target, or emitted
    /// inside a delivery cycle.
    pub skipped_events: Arc<AtomicU64>,
}

impl ShipperLayer {
    pub fn new(shipper: BatchShipper) -> Self {
        let minimum_severity = shipper.minimum_severity().unwrap_or(DEFAULT_LAYER_SEVERITY);
        Self {
            shipper,
            minimum_severity,
            total_events: Arc::new(AtomicU64::new(0)),
            forwarded_events: Arc::new(AtomicU64::new(0)),
            skipped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_minimum_severity(mut self, minimum: Severity) -> Self {
        self.minimum_severity = minimum;
        self
    }

    pub fn minimum_severity(&self) -> Severity {
        self.minimum_severity
    }

    fn should_skip(&self, meta: &tracing::Metadata<'_>) -> bool {
        severity(meta.level()) < self.minimum_severity || is_ignored(meta.target()) || in_delivery_cycle()
    }
}

fn severity(level: &Level) -> Severity {
    if *level == Level::TRACE {
        Severity::Trace
    } else if *level == Level::DEBUG {
        Severity::Debug
    } else if *level == Level::INFO {
        Severity::Information
    } else if *level == Level::WARN {
        Severity::Warning
    } else {
        Severity::Error
    }
}

impl<S> Layer<S> for ShipperLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if self.should_skip(meta) {
            self.skipped_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = LogEntry::new(
            severity(meta.level()),
            visitor.method.unwrap_or_else(|| meta.target().to_string()),
            visitor.correlation_id.unwrap_or_default(),
            visitor.message.unwrap_or_default(),
        );
        if !visitor.fields.is_empty() {
            entry = entry.with_content(Value::Object(visitor.fields));
        }
        if let Some(error) = visitor.error {
            entry = entry.with_error(error);
        }
        if let Some(elapsed) = visitor.elapsed_ms {
            entry = entry.with_elapsed_ms(elapsed);
        }

        self.shipper.record(entry);
        self.forwarded_events.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct FieldVisitor {
    pub fields: Map<String, Value>,
    pub message: Option<String>,
    pub method: Option<String>,
    pub correlation_id: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub error: Option<EntryError>,
}

impl FieldVisitor {
    fn text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "method" => self.method = Some(value),
            "correlation_id" => self.correlation_id = Some(value),
            name => {
                self.fields.insert(name.to_string(), Value::String(value));
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "elapsed_ms" && value >= 0 {
            self.elapsed_ms = Some(value as u64);
        } else {
            self.fields.insert(field.name().to_string(), Value::from(value));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "elapsed_ms" {
            self.elapsed_ms = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), Value::from(value));
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.error = Some(EntryError::from_error(field.name(), value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.text(field, format!("{:?}", value));
    }
}
