use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tokio::{
    sync::Mutex,
    task::{JoinError, JoinHandle, JoinSet},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{application::handlers::message_dispatcher::BatchDispatcher, config::SchedulerConfig};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
    #[error("scheduler is not running")]
    NotRunning,
}

struct LoopHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

struct SchedulerInner {
    dispatcher: Arc<dyn BatchDispatcher>,
    config: SchedulerConfig,
    running: AtomicBool,
    processing: Arc<AtomicBool>,
    // Start and stop serialize on this lock; `running` mirrors it for
    // lock-free reads.
    control: Mutex<Option<LoopHandle>>,
}

/// Runs one dispatch batch per tick and never lets two batches overlap.
///
/// Ticks that fire while a batch is still in flight are dropped, not queued.
/// `stop` waits for the loop and any in-flight batch to finish; sends are
/// never cancelled midway.
#[derive(Clone)]
pub struct DispatchScheduler {
    inner: Arc<SchedulerInner>,
}

impl DispatchScheduler {
    pub fn new(dispatcher: Arc<dyn BatchDispatcher>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                dispatcher,
                config,
                running: AtomicBool::new(false),
                processing: Arc::new(AtomicBool::new(false)),
                control: Mutex::new(None),
            }),
        }
    }

    /// Launches the scheduler loop and returns without waiting for a tick.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut control = self.inner.control.lock().await;
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("scheduler is already running");
            return Err(SchedulerError::AlreadyRunning);
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_loop(self.inner.clone(), shutdown.clone()));
        *control = Some(LoopHandle { shutdown, task });

        info!(
            runs_every_ms = self.inner.config.runs_every.as_millis() as u64,
            grace_period_ms = self.inner.config.grace_period.as_millis() as u64,
            message_rate = self.inner.config.message_rate,
            "scheduler started"
        );
        Ok(())
    }

    /// Signals the loop to exit and waits until it has, including the batch
    /// currently in flight.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let mut control = self.inner.control.lock().await;
        if self
            .inner
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("scheduler is not running");
            return Err(SchedulerError::NotRunning);
        }

        if let Some(handle) = control.take() {
            handle.shutdown.cancel();
            if let Err(err) = handle.task.await {
                error!(error = %err, "scheduler loop terminated abnormally");
            }
        }

        info!("scheduler stopped gracefully");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// True only while a batch is executing.
    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::Acquire)
    }
}

async fn run_loop(inner: Arc<SchedulerInner>, shutdown: CancellationToken) {
    // First batch runs one full period after start, not at start.
    let period = inner.config.runs_every;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut batches: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("stop signal received, shutting down scheduler loop");
                break;
            }
            Some(joined) = batches.join_next() => log_batch_exit(joined),
            _ = ticker.tick() => inner.on_tick(&mut batches),
        }
    }

    while let Some(joined) = batches.join_next().await {
        log_batch_exit(joined);
    }
}

fn log_batch_exit(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "message processing batch terminated abnormally");
    }
}

impl SchedulerInner {
    fn on_tick(self: &Arc<Self>, batches: &mut JoinSet<()>) {
        let Some(guard) = ProcessingGuard::acquire(self.processing.clone()) else {
            warn!("skipping tick, previous processing batch is still active");
            return;
        };

        let inner = self.clone();
        batches.spawn(async move {
            let _guard = guard;
            inner.execute_batch().await;
        });
    }

    async fn execute_batch(&self) {
        let budget = self.config.batch_budget();
        let deadline = Instant::now() + budget;
        info!(
            budget_ms = budget.as_millis() as u64,
            "ticker triggered, starting message processing batch"
        );

        match self
            .dispatcher
            .dispatch_pending(deadline, self.config.message_rate)
            .await
        {
            Ok(()) => info!("message processing batch completed successfully"),
            Err(err) if err.is_deadline_exceeded() => warn!(
                error = %err,
                "message processing timed out, remaining messages will be retried on the next tick"
            ),
            Err(err) => error!(
                error = %err,
                "an unexpected error occurred during message processing"
            ),
        }
    }
}

/// Holds the processing flag for one batch; dropping it (including during a
/// panic unwind) releases the flag.
struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl ProcessingGuard {
    fn acquire(flag: Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::application::handlers::message_dispatcher::DispatchError;

    #[derive(Default)]
    struct ScriptedDispatcher {
        calls: AtomicUsize,
        completed: AtomicUsize,
        first_call_delay: Option<Duration>,
        every_call_delay: Option<Duration>,
        panic_on_first_call: bool,
        deadlines: std::sync::Mutex<Vec<(Instant, usize)>>,
    }

    #[async_trait]
    impl BatchDispatcher for ScriptedDispatcher {
        async fn dispatch_pending(
            &self,
            deadline: Instant,
            limit: usize,
        ) -> Result<(), DispatchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.deadlines.lock().unwrap().push((deadline, limit));

            if call == 1 && self.panic_on_first_call {
                panic!("dispatcher blew up");
            }
            if let Some(delay) = self.every_call_delay {
                tokio::time::sleep(delay).await;
            } else if call == 1 {
                if let Some(delay) = self.first_call_delay {
                    tokio::time::sleep(delay).await;
                }
            }

            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            message_rate: 10,
            runs_every: Duration::from_millis(50),
            grace_period: Duration::from_millis(10),
            job_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn start_and_stop_transition_running_state() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let config = SchedulerConfig {
            runs_every: Duration::from_secs(3600),
            grace_period: Duration::from_secs(30),
            ..fast_config()
        };
        let scheduler = DispatchScheduler::new(dispatcher, config);

        assert!(!scheduler.is_running());

        scheduler.start().await.expect("first start succeeds");
        assert!(scheduler.is_running());

        assert_eq!(scheduler.start().await, Err(SchedulerError::AlreadyRunning));
        assert!(scheduler.is_running());

        scheduler.stop().await.expect("first stop succeeds");
        assert!(!scheduler.is_running());

        assert_eq!(scheduler.stop().await, Err(SchedulerError::NotRunning));
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_can_be_restarted_after_stop() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let scheduler = DispatchScheduler::new(dispatcher.clone(), fast_config());

        scheduler.start().await.unwrap();
        scheduler.stop().await.unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(70)).await;
        scheduler.stop().await.unwrap();

        assert!(!scheduler.is_running());
        assert!(dispatcher.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_batch_waits_one_full_period() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let scheduler = DispatchScheduler::new(dispatcher.clone(), fast_config());

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(54)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_tick_is_dropped() {
        let dispatcher = Arc::new(ScriptedDispatcher {
            first_call_delay: Some(Duration::from_millis(60)),
            ..Default::default()
        });
        let scheduler = DispatchScheduler::new(dispatcher.clone(), fast_config());

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(170)).await;
        scheduler.stop().await.unwrap();

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_receives_deadline_and_message_rate() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let scheduler = DispatchScheduler::new(dispatcher.clone(), fast_config());

        let first_tick = Instant::now() + Duration::from_millis(50);
        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.stop().await.unwrap();

        let deadlines = dispatcher.deadlines.lock().unwrap();
        let (deadline, limit) = deadlines[0];
        assert_eq!(limit, 10);
        let budget = deadline.duration_since(first_tick);
        assert!(budget >= Duration::from_millis(40), "budget was {budget:?}");
        assert!(budget < Duration::from_millis(50), "budget was {budget:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_in_flight_batch() {
        let dispatcher = Arc::new(ScriptedDispatcher {
            every_call_delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let scheduler = DispatchScheduler::new(dispatcher.clone(), fast_config());

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(scheduler.is_processing());

        scheduler.stop().await.unwrap();

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.completed.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_batch_does_not_wedge_the_scheduler() {
        let dispatcher = Arc::new(ScriptedDispatcher {
            panic_on_first_call: true,
            ..Default::default()
        });
        let scheduler = DispatchScheduler::new(dispatcher.clone(), fast_config());

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(170)).await;
        scheduler.stop().await.unwrap();

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.completed.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_processing());
    }

    #[test]
    fn processing_guard_is_exclusive_until_dropped() {
        let flag = Arc::new(AtomicBool::new(false));

        let guard = ProcessingGuard::acquire(flag.clone()).expect("flag is free");
        assert!(ProcessingGuard::acquire(flag.clone()).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(ProcessingGuard::acquire(flag).is_some());
    }
}
