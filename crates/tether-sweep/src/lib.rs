//! Periodic sweep scheduler for Tether.
//!
//! Runs a cleanup job ([`Sweep`]) in its own Tokio task, triggered two ways:
//!
//! - a fixed **interval** (default 5 s) that keeps ticking no matter what
//!   the rest of the server is doing;
//! - an explicit **wake** through a [`SweepWaker`], so a connection that just
//!   went away can ask for a sweep right now instead of waiting for the next
//!   tick.
//!
//! Wakes never block the caller. A wake that arrives while a sweep is
//! already running is remembered and causes exactly one more sweep; any
//! number of wakes in between coalesce into that one.
//!
//! ```ignore
//! let handle = tether_sweep::spawn(Arc::clone(&ledger), SweepConfig::default());
//! let waker = handle.waker();
//! // ... from a connection task on disconnect:
//! waker.wake();
//! // ... on server shutdown:
//! handle.shutdown().await;
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a sweep task.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between timer-driven sweeps. The first one fires one full
    /// interval after the task starts.
    pub interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

impl SweepConfig {
    /// Shortest interval accepted; anything below is raised to this.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Create a config with the given interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }.validated()
    }

    /// Raise the interval to [`Self::MIN_INTERVAL`] if it is shorter.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            debug!(
                interval = ?self.interval,
                min = ?Self::MIN_INTERVAL,
                "sweep interval below minimum, raising"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Sweep trait
// ---------------------------------------------------------------------------

/// Why a sweep ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The interval elapsed.
    Timer,
    /// Someone called [`SweepWaker::wake`].
    Wake,
}

/// A cleanup job run by the scheduler.
pub trait Sweep: Send + Sync + 'static {
    /// Runs one pass and returns how many items it removed.
    ///
    /// Must not fail as a whole: per-item errors are the job's to log and
    /// skip.
    fn sweep(&self) -> impl Future<Output = usize> + Send;
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters for a sweep task. Cheap to read at any time.
#[derive(Debug, Default)]
pub struct SweepStats {
    timer_runs: AtomicU64,
    wake_runs: AtomicU64,
    removed: AtomicU64,
}

/// A point-in-time copy of [`SweepStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSnapshot {
    /// Sweeps started by the interval.
    pub timer_runs: u64,
    /// Sweeps started by a wake.
    pub wake_runs: u64,
    /// Items removed across all sweeps.
    pub removed: u64,
}

impl SweepSnapshot {
    /// Total sweeps run.
    pub fn total_runs(&self) -> u64 {
        self.timer_runs + self.wake_runs
    }
}

impl SweepStats {
    fn record(&self, trigger: Trigger, removed: usize) {
        match trigger {
            Trigger::Timer => self.timer_runs.fetch_add(1, Ordering::Relaxed),
            Trigger::Wake => self.wake_runs.fetch_add(1, Ordering::Relaxed),
        };
        self.removed.fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Reads the counters.
    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            timer_runs: self.timer_runs.load(Ordering::Relaxed),
            wake_runs: self.wake_runs.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Waker / handle
// ---------------------------------------------------------------------------

/// Requests an immediate sweep. Clone freely; never blocks.
#[derive(Debug, Clone)]
pub struct SweepWaker {
    notify: Arc<Notify>,
}

impl SweepWaker {
    /// Asks the task to sweep as soon as it can.
    pub fn wake(&self) {
        // `notify_one` stores a permit when nobody is waiting, so a wake
        // sent mid-sweep is not lost.
        self.notify.notify_one();
    }
}

/// Owner's handle to a running sweep task.
pub struct SweepHandle {
    waker: SweepWaker,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<SweepStats>,
}

impl SweepHandle {
    /// Returns a waker for this task.
    pub fn waker(&self) -> SweepWaker {
        self.waker.clone()
    }

    /// Current counters.
    pub fn stats(&self) -> SweepSnapshot {
        self.stats.snapshot()
    }

    /// Returns `true` until [`shutdown`](Self::shutdown) is called.
    pub fn is_running(&self) -> bool {
        !*self.stop.borrow()
    }

    /// Stops the task and waits for it to exit. A sweep in progress is
    /// allowed to finish. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        self.stop.send_replace(true);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                debug!(error = %e, "sweep task ended abnormally");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Spawns a task running `target` on `config.interval` and on every wake.
///
/// Must be called from inside a Tokio runtime.
pub fn spawn<S: Sweep>(target: Arc<S>, config: SweepConfig) -> SweepHandle {
    let config = config.validated();
    let notify = Arc::new(Notify::new());
    let stats = Arc::new(SweepStats::default());
    let (stop, stop_rx) = watch::channel(false);

    let task = tokio::spawn(run(
        target,
        config,
        Arc::clone(&notify),
        Arc::clone(&stats),
        stop_rx,
    ));

    SweepHandle {
        waker: SweepWaker { notify },
        stop,
        task: Mutex::new(Some(task)),
        stats,
    }
}

async fn run<S: Sweep>(
    target: Arc<S>,
    config: SweepConfig,
    notify: Arc<Notify>,
    stats: Arc<SweepStats>,
    mut stop: watch::Receiver<bool>,
) {
    // `interval_at` so the first tick doesn't fire immediately.
    let mut ticker =
        time::interval_at(Instant::now() + config.interval, config.interval);
    // Missed ticks are skipped: a slow sweep must not cause a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(interval = ?config.interval, "sweep task started");

    loop {
        let trigger = tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => break,
            _ = ticker.tick() => Trigger::Timer,
            _ = notify.notified() => Trigger::Wake,
        };

        let removed = target.sweep().await;
        stats.record(trigger, removed);
        trace!(?trigger, removed, "sweep finished");
    }

    debug!("sweep task stopped");
}
