//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rest_log_sink::{FallbackSink, LogEntry, ServiceIdentity, Severity, ShipperConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Fallback sink that keeps every entry it receives.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
    pub flushes: AtomicUsize,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: Severity) -> Vec<LogEntry> {
        self.entries().into_iter().filter(|e| e.level == level).collect()
    }
}

#[async_trait]
impl FallbackSink for RecordingSink {
    fn write(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }

    async fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records like [`RecordingSink`] but panics the first time it is handed
/// an entry whose message starts with `trigger`, simulating a defect in the
/// delivery path. Trips on "Delivery cycle started" by default.
pub struct DefectiveSink {
    pub inner: RecordingSink,
    trigger: &'static str,
    tripped: AtomicBool,
}

impl DefectiveSink {
    pub fn tripping_on(trigger: &'static str) -> Self {
        Self {
            inner: RecordingSink::default(),
            trigger,
            tripped: AtomicBool::new(false),
        }
    }
}

impl Default for DefectiveSink {
    fn default() -> Self {
        Self::tripping_on("Delivery cycle started")
    }
}

#[async_trait]
impl FallbackSink for DefectiveSink {
    fn write(&self, entry: &LogEntry) {
        if entry.message.starts_with(self.trigger) && !self.tripped.swap(true, Ordering::SeqCst) {
            panic!("sink exploded");
        }
        self.inner.write(entry);
    }
}

pub fn config(url: &str) -> ShipperConfig {
    ShipperConfig::new(ServiceIdentity::new("orders", "3.1.0"))
        .with_remote_url(url)
        // Keep the timer out of the way; tests flush explicitly.
        .with_batch_interval(Duration::from_secs(3600))
        .with_request_timeout(Duration::from_secs(5))
}

pub fn entry(n: usize) -> LogEntry {
    LogEntry::new(Severity::Information, "place_order", format!("req-{}", n), format!("entry {}", n))
}
