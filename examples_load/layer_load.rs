use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use rest_log_sink::init::{init_tracing_with_config, LayerConfig};
use rest_log_sink::noop_sink::NoopSink;
use rest_log_sink::{BatchShipper, ServiceIdentity, ShipperConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ShipperConfig::new(ServiceIdentity::new("load-test", env!("CARGO_PKG_VERSION")))
        .with_remote_url("http://127.0.0.1:8080/logs");
    let shipper = BatchShipper::new(config, Arc::new(NoopSink))?;

    let layer_config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    };
    init_tracing_with_config(shipper.clone(), layer_config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(method = "layer_load", iteration = i, "layer load test error");
    }

    let elapsed = start.elapsed();
    println!(
        "tracing layer: recorded {} events in {:?} (~{:.0} ev/s), {} pending",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        shipper.pending()
    );

    Ok(())
}
