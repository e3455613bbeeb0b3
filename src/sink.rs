use crate::record::LogEntry;
use async_trait::async_trait;

/// Always-available local destination for [`LogEntry`]s.
///
/// The shipper mirrors every recorded entry here and reports its own
/// warnings and delivery failures here, so whatever happens to the remote
/// collector stays observable locally (console, file, etc).
///
/// Implementations must not block for long and must not panic: `write` is
/// called on the producer's thread from [`crate::shipper::BatchShipper::record`].
#[async_trait]
pub trait FallbackSink: Send + Sync {
    /// Render a single entry.
    fn write(&self, entry: &LogEntry);

    /// Flush anything the sink buffers. Awaited at the end of every
    /// [`crate::shipper::BatchShipper::shutdown`].
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) {}
}
