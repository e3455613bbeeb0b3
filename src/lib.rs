pub mod record;
pub mod payload;
pub mod sink;
pub mod queue;
pub mod scheduler;
pub mod delivery;
pub mod shipper;
pub mod layer;

pub mod config;
pub mod env;
pub mod error;
pub mod init;
pub mod console_sink;
pub mod noop_sink;

pub use config::ShipperConfig;
pub use console_sink::ConsoleSink;
pub use error::{ConfigError, DeliveryError, FailureKind, ShipperError};
pub use payload::{Environment, ServiceIdentity};
pub use queue::DeliveryOrder;
pub use record::{EntryError, LogEntry, Severity};
pub use shipper::{BatchShipper, CycleOutcome};
pub use sink::FallbackSink;
