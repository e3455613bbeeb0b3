use crate::env::*;
use crate::error::ConfigError;
use crate::payload::{Environment, ServiceIdentity};
use crate::queue::DeliveryOrder;
use crate::record::Severity;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration of a [`crate::shipper::BatchShipper`].
///
/// **Fields**
/// - `remote_url`: collector endpoint; `None` disables remote delivery and
///   every entry is only written to the fallback sink.
/// - `batch_interval`: period of the flush timer.
/// - `request_timeout`: bound on a single delivery round trip.
/// - `minimum_severity`: entries below it are not queued (they still reach
///   the fallback sink).
/// - `environment`, `service`: static identity stamped on every record.
/// - `delivery_order`: which end of the backlog is drained first.
#[derive(Clone, Debug)]
pub struct ShipperConfig {
    pub remote_url: Option<String>,
    pub batch_interval: Duration,
    pub request_timeout: Duration,
    pub minimum_severity: Option<Severity>,
    pub environment: Environment,
    pub service: ServiceIdentity,
    pub delivery_order: DeliveryOrder,
}

impl ShipperConfig {
    pub fn new(service: ServiceIdentity) -> Self {
        Self {
            remote_url: None,
            batch_interval: DEFAULT_BATCH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            minimum_severity: None,
            environment: Environment::default(),
            service,
            delivery_order: DeliveryOrder::default(),
        }
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_minimum_severity(mut self, severity: Severity) -> Self {
        self.minimum_severity = Some(severity);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_delivery_order(mut self, order: DeliveryOrder) -> Self {
        self.delivery_order = order;
        self
    }

    /// Load configuration from `REST_LOG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup(REST_LOG_SERVICE_NAME_ENV).ok_or(ConfigError::MissingVar(REST_LOG_SERVICE_NAME_ENV))?;
        let version = lookup(REST_LOG_SERVICE_VERSION_ENV).unwrap_or_else(|| "unknown".to_string());
        let mut config = ShipperConfig::new(ServiceIdentity::new(name, version));

        config.remote_url = lookup(REST_LOG_URL_ENV).filter(|url| !url.trim().is_empty());

        if let Some(seconds) = parse_var::<u64, _>(&lookup, REST_LOG_BATCH_INTERVAL_ENV)? {
            config.batch_interval = Duration::from_secs(seconds);
        }
        if let Some(seconds) = parse_var::<u64, _>(&lookup, REST_LOG_TIMEOUT_ENV)? {
            config.request_timeout = Duration::from_secs(seconds);
        }
        config.minimum_severity = parse_var::<Severity, _>(&lookup, REST_LOG_MIN_LEVEL_ENV)?;
        if let Some(environment) = parse_var::<Environment, _>(&lookup, REST_LOG_ENVIRONMENT_ENV)? {
            config.environment = environment;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. The remote URL itself is checked when
    /// the delivery client is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        if self.batch_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("batch_interval"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("request_timeout"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { key, value }),
    }
}
