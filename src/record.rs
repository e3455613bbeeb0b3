use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Ordered importance of a [`LogEntry`], lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Trace => "Trace",
            Severity::Debug => "Debug",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        };
        f.write_str(name)
    }
}

/// Error returned when a severity name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown severity `{0}`")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "information" | "info" => Ok(Severity::Information),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Failure attached to a [`LogEntry`].
///
/// `Captured` is what Rust callers produce via [`EntryError::capture`].
/// `Raw` carries a foreign error object as-is (for example one decoded from
/// another service); its shape is not trusted and is only read through the
/// safe projection in [`crate::payload::ExceptionInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryError {
    #[serde(rename_all = "camelCase")]
    Captured {
        name: String,
        message: String,
        stack_trace: Option<String>,
    },
    Raw(serde_json::Value),
}

impl EntryError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        EntryError::Captured {
            name: name.into(),
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Capture an error under its Rust type name.
    pub fn capture<E: std::error::Error>(err: &E) -> Self {
        Self::from_error(std::any::type_name::<E>(), err)
    }

    /// Capture an error under an explicit name. The `source()` chain, if
    /// any, becomes the stack trace.
    pub fn from_error<E: std::error::Error + ?Sized>(name: impl Into<String>, err: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        EntryError::Captured {
            name: name.into(),
            message: err.to_string(),
            stack_trace: if causes.is_empty() { None } else { Some(causes.join("\n")) },
        }
    }
}

/// A single application-emitted log record. Immutable once handed to the
/// shipper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub method: String,
    pub correlation_id: String,
    pub level: Severity,
    pub message: String,
    pub content: Option<serde_json::Value>,
    pub error: Option<EntryError>,
    pub elapsed_time_ms: Option<u64>,
}

impl LogEntry {
    pub fn new(
        level: Severity,
        method: impl Into<String>,
        correlation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            correlation_id: correlation_id.into(),
            level,
            message: message.into(),
            content: None,
            error: None,
            elapsed_time_ms: None,
        }
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_error(mut self, error: EntryError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_time_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_time_ms = Some(elapsed_ms);
        self
    }
}

/// An entry waiting in the queue, stamped with the moment it was accepted.
/// The capture time is what gets reported as the execution date.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub captured_at: DateTime<Utc>,
    pub entry: LogEntry,
}

impl PendingRecord {
    pub fn capture(entry: LogEntry) -> Self {
        Self {
            captured_at: Utc::now(),
            entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryError {
        #[source]
        source: io::Error,
    }

    #[test]
    fn severity_is_ordered_ascending() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Debug < Severity::Information);
        assert!(Severity::Information < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn severity_parses_aliases() {
        assert_eq!("INFO".parse::<Severity>().unwrap(), Severity::Information);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(" Critical ".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn capture_walks_source_chain() {
        let err = QueryError {
            source: io::Error::new(io::ErrorKind::TimedOut, "socket timed out"),
        };

        match EntryError::from_error("QueryError", &err) {
            EntryError::Captured { name, message, stack_trace } => {
                assert_eq!(name, "QueryError");
                assert_eq!(message, "query failed");
                assert_eq!(stack_trace.as_deref(), Some("caused by: socket timed out"));
            }
            other => panic!("unexpected projection: {:?}", other),
        }
    }

    #[test]
    fn capture_uses_type_name() {
        let err = io::Error::new(io::ErrorKind::Other, "boom");
        match EntryError::capture(&err) {
            EntryError::Captured { name, stack_trace, .. } => {
                assert!(name.ends_with("io::error::Error"), "{}", name);
                assert!(stack_trace.is_none());
            }
            other => panic!("unexpected projection: {:?}", other),
        }
    }

    #[test]
    fn entry_serializes_camel_case() {
        let entry = LogEntry::new(Severity::Warning, "checkout", "c-1", "slow")
            .with_elapsed(Duration::from_millis(1500));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["correlationId"], "c-1");
        assert_eq!(json["level"], "Warning");
        assert_eq!(json["elapsedTimeMs"], 1500);
    }

    #[test]
    fn oversized_elapsed_saturates() {
        let entry = LogEntry::new(Severity::Information, "batch", "c-2", "done").with_elapsed(Duration::MAX);
        assert_eq!(entry.elapsed_time_ms, Some(u64::MAX));
    }
}
