use std::sync::Arc;
use std::time::Instant;

use rest_log_sink::env::{env_or, REST_LOG_URL_ENV};
use rest_log_sink::noop_sink::NoopSink;
use rest_log_sink::{BatchShipper, LogEntry, ServiceIdentity, Severity, ShipperConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = env_or(REST_LOG_URL_ENV, "http://127.0.0.1:8080/logs");
    let config = ShipperConfig::new(ServiceIdentity::new("load-test", env!("CARGO_PKG_VERSION"))).with_remote_url(url);
    let shipper = BatchShipper::new(config, Arc::new(NoopSink))?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        shipper.record(
            LogEntry::new(Severity::Error, "default_load", format!("req-{}", i), "default load test error")
                .with_elapsed_ms(i % 250),
        );
    }

    let elapsed = start.elapsed();
    println!(
        "default config: recorded {} entries in {:?} (~{:.0} entries/s), {} pending",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        shipper.pending()
    );

    Ok(())
}
