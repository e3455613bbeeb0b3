use crate::record::{EntryError, LogEntry, Severity};
use crate::sink::FallbackSink;
use tracing::Level;

/// Target of every event emitted by [`ConsoleSink`]. The
/// [`crate::layer::ShipperLayer`] ignores it.
pub const FALLBACK_TARGET: &str = "rest_log_sink::fallback";

/// Default fallback sink: renders entries as `tracing` events so they end
/// up wherever the process' subscriber prints (usually stdout through the
/// `fmt` layer).
#[derive(Clone, Default)]
pub struct ConsoleSink;

fn render_error(error: &EntryError) -> String {
    match error {
        EntryError::Captured { name, message, .. } => format!("{}: {}", name, message),
        EntryError::Raw(value) => value.to_string(),
    }
}

// `tracing` needs the level as a constant at each call site.
macro_rules! emit {
    ($level:expr, $entry:expr) => {{
        let entry = $entry;
        let content = entry.content.as_ref().map(|c| c.to_string());
        let error = entry.error.as_ref().map(render_error);
        tracing::event!(
            target: FALLBACK_TARGET,
            $level,
            method = %entry.method,
            correlation_id = %entry.correlation_id,
            severity = %entry.level,
            elapsed_ms = entry.elapsed_time_ms,
            content = content.as_deref(),
            error = error.as_deref(),
            "{}",
            entry.message
        );
    }};
}

impl FallbackSink for ConsoleSink {
    fn write(&self, entry: &LogEntry) {
        match entry.level {
            Severity::Trace => emit!(Level::TRACE, entry),
            Severity::Debug => emit!(Level::DEBUG, entry),
            Severity::Information => emit!(Level::INFO, entry),
            Severity::Warning => emit!(Level::WARN, entry),
            Severity::Error | Severity::Critical => emit!(Level::ERROR, entry),
        }
    }
}
