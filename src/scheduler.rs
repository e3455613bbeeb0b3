use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// Callback run on every timer firing.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// The repeating timer is armed.
    Running,
    /// The timer is cancelled while an explicit flush owns delivery.
    Draining,
}

struct Timer {
    manual_flushes: usize,
    task: Option<JoinHandle<()>>,
}

/// Repeating flush timer with a pause for manual flushes.
///
/// The timer task awaits each tick callback before waiting for the next
/// firing, and missed firings are skipped rather than queued, so callbacks
/// started by the timer never overlap.
pub struct FlushScheduler {
    period: Duration,
    tick: TickFn,
    timer: Mutex<Timer>,
}

impl FlushScheduler {
    /// Arm the timer and return a scheduler in [`SchedulerState::Running`].
    /// Must be called from within a Tokio runtime.
    pub fn start(period: Duration, tick: TickFn) -> Self {
        let task = spawn_timer(period, tick.clone());
        Self {
            period,
            tick,
            timer: Mutex::new(Timer {
                manual_flushes: 0,
                task: Some(task),
            }),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn lock(&self) -> MutexGuard<'_, Timer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SchedulerState {
        if self.lock().manual_flushes == 0 {
            SchedulerState::Running
        } else {
            SchedulerState::Draining
        }
    }

    /// Running -> Draining. Cancels the pending firing; a callback that is
    /// already executing is not interrupted by this.
    pub fn begin_manual_flush(&self) {
        let mut timer = self.lock();
        timer.manual_flushes += 1;
        if let Some(task) = timer.task.take() {
            task.abort();
            debug!("flush timer paused for manual flush");
        }
    }

    /// Draining -> Running once the last overlapping manual flush ends.
    /// Re-arms a fresh timer, so the next firing is one full period away.
    pub fn end_manual_flush(&self) {
        let mut timer = self.lock();
        timer.manual_flushes = timer.manual_flushes.saturating_sub(1);
        if timer.manual_flushes == 0 && timer.task.is_none() {
            timer.task = Some(spawn_timer(self.period, self.tick.clone()));
            debug!(period = ?self.period, "flush timer resumed");
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.lock().task.take() {
            task.abort();
        }
    }
}

fn spawn_timer(period: Duration, tick: TickFn) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            (tick)().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_tick(counter: Arc<AtomicUsize>, work: Duration) -> TickFn {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if !work.is_zero() {
                    sleep(work).await;
                }
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = FlushScheduler::start(Duration::from_secs(5), counting_tick(counter.clone(), Duration::ZERO));
        assert_eq!(scheduler.state(), SchedulerState::Running);

        sleep(Duration::from_millis(4_900)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_flush_pauses_and_rearms() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = FlushScheduler::start(Duration::from_secs(5), counting_tick(counter.clone(), Duration::ZERO));

        sleep(Duration::from_secs(3)).await;
        scheduler.begin_manual_flush();
        assert_eq!(scheduler.state(), SchedulerState::Draining);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        scheduler.end_manual_flush();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        sleep(Duration::from_millis(4_900)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_manual_flushes_resume_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = FlushScheduler::start(Duration::from_secs(5), counting_tick(counter.clone(), Duration::ZERO));

        scheduler.begin_manual_flush();
        scheduler.begin_manual_flush();
        scheduler.end_manual_flush();
        assert_eq!(scheduler.state(), SchedulerState::Draining);

        sleep(Duration::from_secs(12)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        scheduler.end_manual_flush();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        sleep(Duration::from_millis(5_100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_are_not_queued() {
        let counter = Arc::new(AtomicUsize::new(0));
        // Each callback outlives two periods: firings at 10s and 15s are
        // collapsed into one late firing when the first callback ends at 17s.
        let _scheduler =
            FlushScheduler::start(Duration::from_secs(5), counting_tick(counter.clone(), Duration::from_secs(12)));

        sleep(Duration::from_millis(16_500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        sleep(Duration::from_secs(11)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stops_the_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = FlushScheduler::start(Duration::from_secs(1), counting_tick(counter.clone(), Duration::ZERO));
        drop(scheduler);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
