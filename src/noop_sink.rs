use crate::record::LogEntry;
use crate::sink::FallbackSink;

/// A fallback sink that simply drops all entries.
///
/// Useful for measuring the overhead of the shipper itself without any
/// local rendering, and for callers that already print events elsewhere.
#[derive(Clone, Default)]
pub struct NoopSink;

impl FallbackSink for NoopSink {
    fn write(&self, _entry: &LogEntry) {}
}
