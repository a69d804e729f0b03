//! # Scheduler
//!
//! Repeating-task abstraction used by [`PollingConfig`](crate::PollingConfig).
//!
//! [`FixedIntervalScheduler`] runs each scheduled task on the tokio runtime:
//! one spawned loop per task that sleeps for the interval, then runs the
//! task on the blocking pool and waits for it before sleeping again. The
//! delay is therefore measured from the end of one call to the start of the
//! next, and one task never overlaps itself.
//!
//! Called outside any runtime, the scheduler starts a small runtime of its
//! own on first use and shuts it down when dropped.

use errors::SchedulerError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A task run repeatedly by a [`Scheduler`].
pub type Task = Arc<dyn Fn() + Send + Sync>;

pub trait Scheduler: Send + Sync {
    /// Start invoking `task` repeatedly.
    fn schedule(&self, task: Task) -> Result<(), SchedulerError>;

    /// Stop future invocations. Running invocations finish. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Runs tasks with a fixed delay between invocations.
pub struct FixedIntervalScheduler {
    interval: Duration,
    handle: Mutex<Option<Handle>>,
    background: Mutex<Option<Runtime>>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl FixedIntervalScheduler {
    /// Scheduler using the runtime current at the time of the first
    /// [`schedule`](Scheduler::schedule) call, or a background runtime of its
    /// own when there is none.
    pub fn new(interval: Duration) -> Result<Self, SchedulerError> {
        Self::build(interval, None)
    }

    /// Scheduler spawning onto an explicit runtime.
    pub fn with_handle(interval: Duration, handle: Handle) -> Result<Self, SchedulerError> {
        Self::build(interval, Some(handle))
    }

    fn build(interval: Duration, handle: Option<Handle>) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            interval,
            handle: Mutex::new(handle),
            background: Mutex::new(None),
            shutdown,
            closed: AtomicBool::new(false),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn runtime(&self) -> Result<Handle, SchedulerError> {
        let mut handle = self.handle.lock();
        if let Some(handle) = handle.as_ref() {
            return Ok(handle.clone());
        }
        let current = match Handle::try_current() {
            Ok(current) => current,
            Err(_) => self.start_background()?,
        };
        *handle = Some(current.clone());
        Ok(current)
    }

    fn start_background(&self) -> Result<Handle, SchedulerError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("strata-scheduler")
            .enable_time()
            .build()
            .map_err(|e| SchedulerError::Runtime {
                reason: e.to_string(),
            })?;
        let handle = runtime.handle().clone();
        *self.background.lock() = Some(runtime);

        debug!("Started background scheduler runtime");
        Ok(handle)
    }

    /// Whether tasks run on a runtime owned by this scheduler.
    pub fn owns_runtime(&self) -> bool {
        self.background.lock().is_some()
    }
}

impl Scheduler for FixedIntervalScheduler {
    fn schedule(&self, task: Task) -> Result<(), SchedulerError> {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }

        let runtime = self.runtime()?;
        let interval = self.interval;
        let mut shutdown = self.shutdown.subscribe();

        debug!(interval_ms = interval.as_millis() as u64, "Scheduling task");

        runtime.spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    _ = shutdown.changed() => break,
                    () = tokio::time::sleep(interval) => {
                        let task = task.clone();
                        if let Err(e) = tokio::task::spawn_blocking(move || task()).await {
                            warn!("Scheduled task failed: {}", e);
                        }
                    }
                }
            }
            debug!("Scheduled task stopped");
        });

        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing scheduler");
        self.shutdown.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for FixedIntervalScheduler {
    fn drop(&mut self) {
        self.close();
        // May run on one of the runtime's own threads, so never block here.
        if let Some(runtime) = self.background.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for FixedIntervalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedIntervalScheduler")
            .field("interval", &self.interval)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task() -> (Task, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task: Task = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (task, count)
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = FixedIntervalScheduler::new(Duration::ZERO).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidInterval);
    }

    #[test]
    fn test_schedule_without_runtime_starts_background() {
        let scheduler = FixedIntervalScheduler::new(Duration::from_millis(10)).unwrap();
        let (task, count) = counting_task();

        scheduler.schedule(task).unwrap();
        assert!(scheduler.owns_runtime());
        std::thread::sleep(Duration::from_millis(150));
        assert!(count.load(Ordering::SeqCst) >= 2);

        drop(scheduler);
        let after_drop = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(60));
        assert!(count.load(Ordering::SeqCst) <= after_drop + 1);
    }

    #[tokio::test]
    async fn test_current_runtime_preferred() {
        let scheduler = FixedIntervalScheduler::new(Duration::from_millis(10)).unwrap();
        let (task, _) = counting_task();

        scheduler.schedule(task).unwrap();
        assert!(!scheduler.owns_runtime());
        scheduler.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runs_repeatedly() {
        let scheduler = FixedIntervalScheduler::new(Duration::from_millis(20)).unwrap();
        let (task, count) = counting_task();

        scheduler.schedule(task).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_stops_invocations() {
        let scheduler = FixedIntervalScheduler::new(Duration::from_millis(20)).unwrap();
        let (task, count) = counting_task();

        scheduler.schedule(task).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.close();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let after_close = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_close);
    }

    #[tokio::test]
    async fn test_schedule_after_close_fails() {
        let scheduler = FixedIntervalScheduler::new(Duration::from_millis(20)).unwrap();
        scheduler.close();
        scheduler.close();

        let (task, _) = counting_task();
        assert_eq!(scheduler.schedule(task), Err(SchedulerError::Closed));
        assert!(scheduler.is_closed());
    }

    #[test]
    fn test_with_handle_spawns_on_given_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let scheduler =
            FixedIntervalScheduler::with_handle(Duration::from_millis(10), runtime.handle().clone())
                .unwrap();
        let (task, count) = counting_task();

        scheduler.schedule(task).unwrap();
        std::thread::sleep(Duration::from_millis(150));

        assert!(count.load(Ordering::SeqCst) >= 2);
        scheduler.close();
    }
}
