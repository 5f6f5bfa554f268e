use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

/// One iteration of a repeating task. The returned text becomes the task's
/// status line.
#[async_trait]
pub trait TickJob: Send + Sync {
    async fn tick(&self) -> anyhow::Result<String>;
}

#[derive(Default)]
struct TaskState {
    running: AtomicBool,
    generation: AtomicU64,
    interval_ms: AtomicU64,
    cycles: AtomicU64,
    ticks: AtomicU64,
    status: Mutex<String>,
    wake: Notify,
}

impl TaskState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn should_continue(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.is_current(generation)
    }

    fn set_status(&self, status: String) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

/// A self-rescheduling loop on the Tokio runtime.
///
/// Each iteration runs to completion before the next is scheduled, so ticks of
/// one task never overlap. The interval is read fresh after every iteration.
/// `stop` lets an in-flight iteration finish and prevents the next one.
pub struct RepeatingTask {
    name: String,
    initial_delay: Option<Duration>,
    state: Arc<TaskState>,
}

impl RepeatingTask {
    /// The first iteration runs one full interval after `start`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_delay: None,
            state: Arc::default(),
        }
    }

    /// Run the first iteration after `delay` instead of one interval.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    pub fn set_initial_delay(&mut self, delay: Option<Duration>) {
        self.initial_delay = delay;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Begin ticking every `interval_ms`. Returns `false` (and changes
    /// nothing) if the task is already running. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self, interval_ms: u64, job: Arc<dyn TickJob>) -> bool {
        if self.state.running.swap(true, Ordering::SeqCst) {
            debug!(task = %self.name, "Already running");
            return false;
        }
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.interval_ms.store(interval_ms, Ordering::SeqCst);
        self.state.cycles.store(0, Ordering::SeqCst);
        self.state.ticks.store(0, Ordering::SeqCst);

        let first = self
            .initial_delay
            .unwrap_or(Duration::from_millis(interval_ms));
        info!(task = %self.name, interval_ms, first_ms = first.as_millis() as u64, "Task started");

        tokio::spawn(run_loop(
            self.name.clone(),
            Arc::clone(&self.state),
            generation,
            first,
            job,
        ));
        true
    }

    /// No-op when idle.
    pub fn stop(&self) {
        if self.state.running.swap(false, Ordering::SeqCst) {
            self.state.wake.notify_waiters();
            info!(task = %self.name, cycles = self.cycles(), "Task stopped");
        }
    }

    /// Applies from the next scheduling decision on.
    pub fn set_interval(&self, interval_ms: u64) {
        self.state.interval_ms.store(interval_ms, Ordering::SeqCst);
    }

    pub fn interval_ms(&self) -> u64 {
        self.state.interval_ms.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Successful iterations since the last `start`.
    pub fn cycles(&self) -> u64 {
        self.state.cycles.load(Ordering::SeqCst)
    }

    /// All iterations since the last `start`, failed ones included.
    pub fn ticks(&self) -> u64 {
        self.state.ticks.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> String {
        self.state
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    name: String,
    state: Arc<TaskState>,
    generation: u64,
    first: Duration,
    job: Arc<dyn TickJob>,
) {
    let mut delay = first;
    loop {
        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = state.wake.notified() => {}
        }
        if !state.should_continue(generation) {
            break;
        }

        let outcome = job.tick().await;
        if !state.is_current(generation) {
            break;
        }
        state.ticks.fetch_add(1, Ordering::SeqCst);
        match outcome {
            Ok(message) => {
                state.cycles.fetch_add(1, Ordering::SeqCst);
                state.set_status(message);
            }
            Err(e) => {
                warn!(task = %name, error = %format!("{e:#}"), "Iteration failed");
                state.set_status(format!("{name} error: {e:#}"));
            }
        }

        if !state.should_continue(generation) {
            break;
        }
        delay = Duration::from_millis(state.interval_ms.load(Ordering::SeqCst));
    }
    debug!(task = %name, generation, "Loop exited");
}
