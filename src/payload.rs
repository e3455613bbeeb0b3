use crate::record::{EntryError, PendingRecord, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Value of the `entrypoint` field on every transmitted record.
pub const ENTRYPOINT: &str = "Execute";

/// Class name used when an attached error object cannot be read.
pub const OPAQUE_ERROR_CLASS: &str = "UnknownError";

/// Static identity of the emitting service, embedded in every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: String,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "Development",
            Environment::Staging => "Staging",
            Environment::Production => "Production",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown environment `{0}`")]
pub struct ParseEnvironmentError(pub String);

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Wire shape of an attached error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    pub class_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl ExceptionInfo {
    /// Project an [`EntryError`] onto the wire shape. Never fails: a raw
    /// error object that does not expose string `name` and `message`
    /// members is reported as its JSON text under [`OPAQUE_ERROR_CLASS`].
    pub fn project(error: &EntryError) -> Self {
        match error {
            EntryError::Captured { name, message, stack_trace } => Self {
                class_name: name.clone(),
                message: message.clone(),
                stack_trace: stack_trace.clone(),
            },
            EntryError::Raw(value) => Self::read_raw(value).unwrap_or_else(|| Self::opaque(value)),
        }
    }

    fn read_raw(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let class_name = object.get("name")?.as_str()?.to_string();
        let message = object.get("message")?.as_str()?.to_string();
        let stack = object.get("stack").or_else(|| object.get("stackTrace"));
        let stack_trace = match stack {
            None | Some(Value::Null) => None,
            Some(Value::String(stack)) => Some(stack.clone()),
            Some(_) => return None,
        };

        Some(Self {
            class_name,
            message,
            stack_trace,
        })
    }

    fn opaque(value: &Value) -> Self {
        Self {
            class_name: OPAQUE_ERROR_CLASS.to_string(),
            message: value.to_string(),
            stack_trace: None,
        }
    }
}

/// One element of the JSON array posted to the collector. Built on demand
/// from a queued record; borrows everything except the derived fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord<'a> {
    pub service: &'a ServiceIdentity,
    pub environment: Environment,
    pub execution_date: DateTime<Utc>,
    pub entrypoint: &'static str,
    pub method: &'a str,
    pub correlation_id: &'a str,
    pub level: Severity,
    pub custom_message: &'a str,
    pub message: String,
    pub content: Option<&'a Value>,
    pub exception: Option<ExceptionInfo>,
    pub elapsed_time_ms: Option<u64>,
}

impl<'a> EnrichedRecord<'a> {
    pub fn new(record: &'a PendingRecord, service: &'a ServiceIdentity, environment: Environment) -> Self {
        let entry = &record.entry;

        let mut message = format!("[{}] {}", service.name, entry.message);
        if let Some(elapsed) = entry.elapsed_time_ms.filter(|ms| *ms != 0) {
            message.push_str(&format!(" in {}ms", elapsed));
        }

        Self {
            service,
            environment,
            execution_date: record.captured_at,
            entrypoint: ENTRYPOINT,
            method: &entry.method,
            correlation_id: &entry.correlation_id,
            level: entry.level,
            custom_message: &entry.message,
            message,
            content: entry.content.as_ref(),
            exception: entry.error.as_ref().map(ExceptionInfo::project),
            elapsed_time_ms: entry.elapsed_time_ms,
        }
    }
}

/// Enrich a whole chunk in drain order.
pub fn enrich_chunk<'a>(
    chunk: &'a [PendingRecord],
    service: &'a ServiceIdentity,
    environment: Environment,
) -> Vec<EnrichedRecord<'a>> {
    chunk
        .iter()
        .map(|record| EnrichedRecord::new(record, service, environment))
        .collect()
}
