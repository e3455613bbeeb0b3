use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rest_log_sink::{BatchShipper, FallbackSink, LogEntry, ServiceIdentity, Severity, ShipperConfig};

/// Example of plugging in a custom local fallback by implementing
/// `FallbackSink` directly. Entries are written as JSON lines to stderr,
/// and `flush` makes sure nothing is left in the buffer at shutdown.
struct JsonLinesSink {
    out: Mutex<std::io::BufWriter<std::io::Stderr>>,
}

#[async_trait]
impl FallbackSink for JsonLinesSink {
    fn write(&self, entry: &LogEntry) {
        if let (Ok(line), Ok(mut out)) = (serde_json::to_string(entry), self.out.lock()) {
            let _ = writeln!(out, "{}", line);
        }
    }

    async fn flush(&self) {
        if let Ok(mut out) = self.out.lock() {
            let _ = out.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(JsonLinesSink {
        out: Mutex::new(std::io::BufWriter::new(std::io::stderr())),
    });

    // Nothing listens here, so the batch ends up reported to the sink.
    let config = ShipperConfig::new(ServiceIdentity::new("custom-fallback", "0.1.0"))
        .with_remote_url("http://127.0.0.1:9/logs");
    let shipper = BatchShipper::new(config, sink)?;

    shipper.record(LogEntry::new(Severity::Information, "main", "example-1", "custom fallback example started"));
    shipper.record(LogEntry::new(Severity::Error, "main", "example-1", "simulated error"));

    shipper.shutdown("example-1").await;
    Ok(())
}
