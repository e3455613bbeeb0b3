use crate::layer::{ShipperLayer, IGNORED_TARGETS};
use crate::record::Severity;
use crate::shipper::BatchShipper;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Configuration of the global subscriber installed by
/// [`init_tracing_with_config`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is
///   added next to the [`ShipperLayer`] so events (and entries rendered by
///   [`crate::console_sink::ConsoleSink`]) are printed to the console.
/// - `stdout_filter`: `EnvFilter` directives for the console layer; when
///   `None`, `RUST_LOG` is used and falls back to `info`.
/// - `minimum_severity`: events below it are not recorded; when `None`,
///   the [`ShipperLayer`] default applies.
/// - `ignored_targets`: crates whose events are never recorded, in
///   addition to [`IGNORED_TARGETS`].
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub enable_stdout: bool,
    pub stdout_filter: Option<String>,
    pub minimum_severity: Option<Severity>,
    pub ignored_targets: Vec<String>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            stdout_filter: None,
            minimum_severity: None,
            ignored_targets: Vec::new(),
        }
    }
}

/// Turns the ignored crates off before their events reach the layer.
fn shipper_targets(extra: &[String]) -> Targets {
    IGNORED_TARGETS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .fold(Targets::new().with_default(LevelFilter::TRACE), |targets, krate| {
            targets.with_target(krate, LevelFilter::OFF)
        })
}

fn stdout_filter(directives: Option<&str>) -> EnvFilter {
    match directives {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Install a global `tracing` subscriber that records every event through
/// `shipper`.
///
/// When the shipper's fallback sink is a [`crate::console_sink::ConsoleSink`]
/// and `enable_stdout` is set, recorded events are printed twice (once by
/// the `fmt` layer, once as the mirrored entry); pair the stdout layer with
/// a [`crate::noop_sink::NoopSink`] or disable it.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already installed.
pub fn init_tracing_with_config(shipper: BatchShipper, config: LayerConfig) -> Result<(), TryInitError> {
    let fmt_layer = config.enable_stdout.then(|| {
        tracing_subscriber::fmt::layer().with_filter(stdout_filter(config.stdout_filter.as_deref()))
    });

    let mut shipper_layer = ShipperLayer::new(shipper);
    if let Some(minimum) = config.minimum_severity {
        shipper_layer = shipper_layer.with_minimum_severity(minimum);
    }

    Registry::default()
        .with(shipper_layer.with_filter(shipper_targets(&config.ignored_targets)))
        .with(fmt_layer)
        .try_init()
}

/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(shipper: BatchShipper) -> Result<(), TryInitError> {
    init_tracing_with_config(shipper, LayerConfig::default())
}
