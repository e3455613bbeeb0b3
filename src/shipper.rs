use crate::config::ShipperConfig;
use crate::console_sink::ConsoleSink;
use crate::delivery::DeliveryClient;
use crate::error::{FailureKind, ShipperError};
use crate::payload::{enrich_chunk, Environment, ServiceIdentity};
use crate::queue::BatchQueue;
use crate::record::{EntryError, LogEntry, PendingRecord, Severity};
use crate::scheduler::{FlushScheduler, SchedulerState, TickFn};
use crate::sink::FallbackSink;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use uuid::Uuid;

/// Maximum number of records sent in one delivery cycle.
pub const CHUNK_SIZE: usize = 10;

tokio::task_local! {
    static DELIVERY_CYCLE: ();
}

/// `true` while the current task is running a delivery cycle.
pub(crate) fn in_delivery_cycle() -> bool {
    DELIVERY_CYCLE.try_with(|_| ()).is_ok()
}

/// Result of one [`BatchShipper::run_delivery_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The queue was empty; nothing was sent.
    Idle,
    /// A chunk of this many records was accepted by the collector.
    Delivered(usize),
    /// A chunk of this many records was lost and reported to the fallback sink.
    Failed { count: usize, kind: FailureKind },
}

/// Buffers log entries and ships them to a REST collector in chunks.
///
/// Every entry is mirrored to the [`FallbackSink`] first, so the local view
/// is complete even when remote delivery fails. Delivery is best-effort: a
/// chunk that cannot be delivered is reported to the fallback sink with its
/// full content and is never retried.
///
/// Cheap to clone; all clones share one queue and one flush timer. The
/// timer stops when the last clone is dropped.
#[derive(Clone)]
pub struct BatchShipper {
    inner: Arc<Shared>,
}

struct Shared {
    sink: Arc<dyn FallbackSink>,
    queue: BatchQueue,
    client: Option<DeliveryClient>,
    minimum_severity: Option<Severity>,
    service: ServiceIdentity,
    environment: Environment,
    // Held for a whole drain-and-send, so cycles never overlap.
    cycle_lock: Arc<Mutex<()>>,
    scheduler: FlushScheduler,
}

impl BatchShipper {
    /// Validate `config`, build the delivery client and arm the flush timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ShipperConfig, sink: Arc<dyn FallbackSink>) -> Result<Self, ShipperError> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| ShipperError::NoRuntime)?;

        let client = config
            .remote_url
            .as_deref()
            .map(|url| DeliveryClient::new(url, config.request_timeout))
            .transpose()?;

        let inner = Arc::new_cyclic(|weak: &Weak<Shared>| Shared {
            sink,
            queue: BatchQueue::new(config.delivery_order),
            client,
            minimum_severity: config.minimum_severity,
            service: config.service,
            environment: config.environment,
            cycle_lock: Arc::new(Mutex::new(())),
            scheduler: FlushScheduler::start(config.batch_interval, timer_tick(weak.clone())),
        });

        Ok(Self { inner })
    }

    /// Shorthand for [`BatchShipper::new`] with a [`ConsoleSink`] fallback.
    pub fn with_console_fallback(config: ShipperConfig) -> Result<Self, ShipperError> {
        Self::new(config, Arc::new(ConsoleSink))
    }

    /// Record an entry. Never blocks, never fails.
    ///
    /// The entry always reaches the fallback sink. It is queued for remote
    /// delivery only when a collector is configured and the entry is at or
    /// above the minimum severity; otherwise a warning explaining why is
    /// written to the fallback sink instead.
    pub fn record(&self, entry: LogEntry) {
        let inner = &self.inner;
        inner.sink.write(&entry);

        if inner.client.is_none() {
            inner.sink.write(
                &LogEntry::new(
                    Severity::Warning,
                    "record",
                    entry.correlation_id.clone(),
                    "Remote log url is not configured; entry was not queued for delivery",
                )
                .with_content(serde_json::to_value(&entry).unwrap_or_default()),
            );
            return;
        }

        if let Some(minimum) = inner.minimum_severity {
            if entry.level < minimum {
                inner.sink.write(&LogEntry::new(
                    Severity::Warning,
                    "record",
                    entry.correlation_id.clone(),
                    format!(
                        "{} entry from `{}` is below the minimum severity {} and was not queued for delivery",
                        entry.level, entry.method, minimum
                    ),
                ));
                return;
            }
        }

        inner.queue.push(PendingRecord::capture(entry));
    }

    /// Drain up to [`CHUNK_SIZE`] records and send them. Waits for any
    /// cycle already in flight to finish first.
    ///
    /// Each cycle starts by writing a `Debug` "Delivery cycle started" entry
    /// to the fallback sink. Without a remote url nothing is ever queued, so
    /// the cycle returns [`CycleOutcome::Idle`] immediately and writes
    /// nothing.
    pub async fn run_delivery_cycle(&self, correlation_id: &str) -> CycleOutcome {
        self.inner.run_delivery_cycle(correlation_id).await
    }

    /// Flush everything that is queued, then resume the timer.
    ///
    /// Pauses the flush timer and runs delivery cycles until the queue is
    /// empty. A defect inside a cycle (a panic) stops the loop and is
    /// reported to the fallback sink; it never reaches the caller. The timer
    /// is re-armed in every case, so the shipper stays usable and this can
    /// be called any number of times, including at process exit.
    pub async fn shutdown(&self, correlation_id: &str) {
        let inner = &self.inner;
        inner.scheduler.begin_manual_flush();

        loop {
            let shared = Arc::clone(inner);
            let cid = correlation_id.to_string();
            let cycle = tokio::spawn(async move { shared.run_delivery_cycle(&cid).await });

            match cycle.await {
                Ok(CycleOutcome::Idle) => break,
                Ok(_) => continue,
                Err(err) => {
                    inner.report_defect("shutdown", correlation_id, join_error_detail(err));
                    break;
                }
            }
        }

        inner.sink.flush().await;
        inner.scheduler.end_manual_flush();
    }

    /// Number of records waiting for delivery.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.scheduler.state()
    }

    /// Entries below this severity are not queued for delivery.
    pub fn minimum_severity(&self) -> Option<Severity> {
        self.inner.minimum_severity
    }
}

fn timer_tick(shared: Weak<Shared>) -> TickFn {
    Arc::new(move || {
        let shared = shared.clone();
        async move {
            if let Some(shared) = shared.upgrade() {
                Shared::on_timer(shared).await;
            }
        }
        .boxed()
    })
}

impl Shared {
    async fn on_timer(self: Arc<Self>) {
        // A manual flush owns delivery; this firing is dropped, not queued.
        let Ok(guard) = Arc::clone(&self.cycle_lock).try_lock_owned() else {
            tracing::debug!("delivery cycle already in flight, skipping timer firing");
            return;
        };

        let correlation_id = Uuid::new_v4().to_string();
        let shared = Arc::clone(&self);
        let cid = correlation_id.clone();
        // A manual flush aborts this timer task while the cycle keeps
        // running, so the cycle reports its own panics.
        let cycle = tokio::spawn(async move {
            let _guard = guard;
            let outcome = AssertUnwindSafe(shared.deliver_next_chunk(&cid)).catch_unwind().await;
            if let Err(payload) = outcome {
                shared.report_defect("on_timer", &cid, panic_message(payload));
            }
        });

        if let Err(err) = cycle.await {
            self.report_defect("on_timer", &correlation_id, join_error_detail(err));
        }
    }

    async fn run_delivery_cycle(&self, correlation_id: &str) -> CycleOutcome {
        let _guard = self.cycle_lock.lock().await;
        self.deliver_next_chunk(correlation_id).await
    }

    async fn deliver_next_chunk(&self, correlation_id: &str) -> CycleOutcome {
        DELIVERY_CYCLE.scope((), self.deliver_chunk(correlation_id)).await
    }

    async fn deliver_chunk(&self, correlation_id: &str) -> CycleOutcome {
        // Without a client nothing is ever queued.
        let Some(client) = self.client.as_ref() else {
            return CycleOutcome::Idle;
        };
        self.trace(correlation_id, "Delivery cycle started".to_string());

        let chunk = self.queue.drain(CHUNK_SIZE);
        if chunk.is_empty() {
            return CycleOutcome::Idle;
        }
        let count = chunk.len();

        let records = enrich_chunk(&chunk, &self.service, self.environment);
        self.trace(
            correlation_id,
            format!("Sending {} log records to {}", count, client.host()),
        );

        match client.send(&records, correlation_id).await {
            Ok(()) => {
                self.trace(
                    correlation_id,
                    format!("Delivered {} log records to {}", count, client.host()),
                );
                CycleOutcome::Delivered(count)
            }
            Err(err) => {
                let kind = err.kind();
                self.sink.write(
                    &LogEntry::new(
                        Severity::Error,
                        "run_delivery_cycle",
                        correlation_id,
                        format!("Failed to deliver {} log records to {}", count, client.host()),
                    )
                    .with_content(serde_json::to_value(&records).unwrap_or_default())
                    .with_error(EntryError::from_error(kind.as_str(), &err)),
                );
                CycleOutcome::Failed { count, kind }
            }
        }
    }

    fn trace(&self, correlation_id: &str, message: String) {
        self.sink
            .write(&LogEntry::new(Severity::Debug, "run_delivery_cycle", correlation_id, message));
    }

    fn report_defect(&self, method: &str, correlation_id: &str, detail: String) {
        self.sink.write(&LogEntry::new(
            Severity::Error,
            method,
            correlation_id,
            "Unexpected failure while delivering pending log records",
        )
        .with_error(EntryError::new("OrchestrationDefect", detail)));
    }
}

fn join_error_detail(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "delivery cycle was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "panic with a non-string payload".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop_sink::NoopSink;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Capture(StdMutex<Vec<LogEntry>>);

    impl FallbackSink for Capture {
        fn write(&self, entry: &LogEntry) {
            self.0.lock().unwrap().push(entry.clone());
        }
    }

    fn config() -> ShipperConfig {
        ShipperConfig::new(ServiceIdentity::new("orders", "1.0.0"))
    }

    fn entry(level: Severity, message: &str) -> LogEntry {
        LogEntry::new(level, "place_order", "req-1", message)
    }

    #[test]
    fn requires_a_runtime() {
        let result = BatchShipper::new(config(), Arc::new(NoopSink));
        assert!(matches!(result, Err(ShipperError::NoRuntime)));
    }

    #[tokio::test]
    async fn rejects_invalid_configuration() {
        let invalid = config().with_remote_url("::nope::");
        assert!(matches!(
            BatchShipper::new(invalid, Arc::new(NoopSink)),
            Err(ShipperError::Config(_))
        ));
    }

    #[tokio::test]
    async fn without_url_nothing_is_queued() {
        let sink = Arc::new(Capture::default());
        let shipper = BatchShipper::new(config(), sink.clone()).unwrap();

        shipper.record(entry(Severity::Error, "card declined"));
        shipper.record(entry(Severity::Information, "order placed"));

        assert_eq!(shipper.pending(), 0);
        let written = sink.0.lock().unwrap();
        assert_eq!(written.len(), 4);
        assert_eq!(written[0].message, "card declined");
        assert_eq!(written[1].level, Severity::Warning);
        assert_eq!(written[1].correlation_id, "req-1");
        assert_eq!(written[1].content.as_ref().unwrap()["message"], "card declined");
        assert_eq!(written[2].message, "order placed");
    }

    #[tokio::test]
    async fn entries_below_minimum_are_not_queued() {
        let sink = Arc::new(Capture::default());
        let shipper = BatchShipper::new(
            config()
                .with_remote_url("http://127.0.0.1:9/ingest")
                .with_minimum_severity(Severity::Warning),
            sink.clone(),
        )
        .unwrap();

        shipper.record(entry(Severity::Debug, "cache miss"));
        shipper.record(entry(Severity::Warning, "slow query"));
        shipper.record(entry(Severity::Critical, "db down"));

        assert_eq!(shipper.pending(), 2);
        let written = sink.0.lock().unwrap();
        let warnings: Vec<_> = written.iter().filter(|e| e.method == "record").collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("below the minimum severity Warning"));
    }

    #[tokio::test]
    async fn empty_cycle_is_idle() {
        let shipper = BatchShipper::with_console_fallback(config().with_remote_url("http://127.0.0.1:9/ingest")).unwrap();
        assert_eq!(shipper.run_delivery_cycle("c").await, CycleOutcome::Idle);
        assert_eq!(shipper.scheduler_state(), SchedulerState::Running);
    }

    #[tokio::test]
    async fn cycle_without_url_writes_nothing() {
        let sink = Arc::new(Capture::default());
        let shipper = BatchShipper::new(config(), sink.clone()).unwrap();

        assert_eq!(shipper.run_delivery_cycle("c").await, CycleOutcome::Idle);
        shipper.shutdown("c").await;
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_cycles_are_marked() {
        assert!(!in_delivery_cycle());
        let marked = DELIVERY_CYCLE.scope((), async { in_delivery_cycle() }).await;
        assert!(marked);
    }

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "panic with a non-string payload");
    }
}
