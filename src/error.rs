use std::time::Duration;

/// Error type returned when building or validating a [`crate::config::ShipperConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {key} has an invalid value `{value}`")]
    InvalidVar { key: &'static str, value: String },

    #[error("service name cannot be empty")]
    EmptyServiceName,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    // The URL itself is left out: it may carry credentials.
    #[error("remote log url is invalid: {0}")]
    InvalidUrl(String),

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// How a delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The collector answered with a non-success status.
    RemoteRejected,
    /// No usable answer: network error, timeout, cancellation or a body
    /// that could not be serialized.
    TransportFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RemoteRejected => "RemoteRejected",
            FailureKind::TransportFailure => "TransportFailure",
        }
    }
}

/// Error returned by [`crate::delivery::DeliveryClient::send`].
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("collector rejected batch with status {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to serialize batch: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeliveryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DeliveryError::RemoteRejected { .. } => FailureKind::RemoteRejected,
            DeliveryError::Timeout(_) | DeliveryError::Transport(_) | DeliveryError::Serialization(_) => {
                FailureKind::TransportFailure
            }
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.without_url())
    }
}

/// Error type returned when constructing a [`crate::shipper::BatchShipper`].
#[derive(thiserror::Error, Debug)]
pub enum ShipperError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a Tokio runtime is required to drive the flush timer")]
    NoRuntime,
}
