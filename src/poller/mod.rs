//! Adaptive polling loop.
//!
//! ```text
//! NotStarted ─start()─▶ AwaitingReady ─ready─▶ Polling ─stop()─▶ Stopped
//!                         │    ▲
//!                         └────┘ probe every `probe_interval`
//! ```
//!
//! A single spawned task owns the interval, the idle clock and the cursor.
//! Other tasks only see the lifecycle state (atomics) and a snapshot that
//! the task publishes after every transition.

mod interval;

pub use interval::{ActivityMode, IntervalPolicy};

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::auth::AuthGate;
use crate::config::PollingConfig;
use crate::ingest::Ingestor;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollerState {
    NotStarted = 0,
    AwaitingReady = 1,
    Polling = 2,
    Stopped = 3,
}

impl PollerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PollerState::NotStarted,
            1 => PollerState::AwaitingReady,
            2 => PollerState::Polling,
            _ => PollerState::Stopped,
        }
    }
}

/// Point-in-time view of the polling task.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingSnapshot {
    pub state: PollerState,
    pub interval: Duration,
    pub last_activity: Option<Instant>,
    pub cursor: Option<i64>,
    pub cycles: u64,
}

struct Shared {
    state: AtomicU8,
    run: AtomicU64,
    stopped: Notify,
    /// Held by a task for its whole lifetime; a restarted task waits here
    /// until the previous one has finished its last cycle.
    running: Mutex<()>,
}

impl Shared {
    fn state(&self) -> PollerState {
        PollerState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

pub struct Poller<S: Store + Send + Sync + 'static> {
    gate: Arc<AuthGate<S>>,
    ingestor: Arc<Ingestor<S>>,
    policy: IntervalPolicy,
    probe_interval: Duration,
    activity: ActivityMode,
    shared: Arc<Shared>,
    snapshot_tx: Arc<watch::Sender<PollingSnapshot>>,
}

impl<S: Store + Send + Sync + 'static> Poller<S> {
    pub fn new(gate: Arc<AuthGate<S>>, ingestor: Arc<Ingestor<S>>, config: &PollingConfig) -> Self {
        let policy = config.interval_policy();
        let (snapshot_tx, _) = watch::channel(PollingSnapshot {
            state: PollerState::NotStarted,
            interval: policy.initial,
            last_activity: None,
            cursor: None,
            cycles: 0,
        });

        Self {
            gate,
            ingestor,
            policy,
            probe_interval: config.readiness_probe(),
            activity: config.activity,
            shared: Arc::new(Shared {
                state: AtomicU8::new(PollerState::NotStarted as u8),
                run: AtomicU64::new(0),
                stopped: Notify::new(),
                running: Mutex::new(()),
            }),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    pub fn state(&self) -> PollerState {
        self.shared.state()
    }

    pub fn snapshot(&self) -> PollingSnapshot {
        let mut snapshot = self.snapshot_tx.borrow().clone();
        snapshot.state = self.state();
        snapshot
    }

    /// Receiver notified after every readiness transition and cycle.
    pub fn subscribe(&self) -> watch::Receiver<PollingSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Spawn the polling task.
    ///
    /// Returns `None` without side effects when a task is already waiting or
    /// polling. After a `stop()` the new task starts probing only once the
    /// previous task has finished its in-flight cycle.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let current = self.state();
        let startable = matches!(current, PollerState::NotStarted | PollerState::Stopped);
        if !startable
            || self
                .shared
                .state
                .compare_exchange(
                    current as u8,
                    PollerState::AwaitingReady as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_err()
        {
            warn!("Polling already running, skipping start");
            return None;
        }

        let run = self.shared.run.fetch_add(1, Ordering::SeqCst) + 1;
        // Wake a superseded task still sleeping so it exits now.
        self.shared.stopped.notify_waiters();
        let task = PollTask {
            gate: self.gate.clone(),
            ingestor: self.ingestor.clone(),
            policy: self.policy,
            probe_interval: self.probe_interval,
            activity: self.activity,
            shared: self.shared.clone(),
            snapshot_tx: self.snapshot_tx.clone(),
            run,
            interval: self.policy.initial,
            last_activity: None,
            cursor: None,
            cycles: 0,
        };

        Some(tokio::spawn(task.run()))
    }

    /// Ask the task to finish. A pending sleep is cut short and an in-flight
    /// cycle completes; no further cycle starts.
    pub fn stop(&self) {
        self.shared
            .state
            .store(PollerState::Stopped as u8, Ordering::SeqCst);
        self.shared.stopped.notify_waiters();
        info!("Poller stopped");
    }
}

/// The polling task and the state it owns.
struct PollTask<S: Store + Send + Sync + 'static> {
    gate: Arc<AuthGate<S>>,
    ingestor: Arc<Ingestor<S>>,
    policy: IntervalPolicy,
    probe_interval: Duration,
    activity: ActivityMode,
    shared: Arc<Shared>,
    snapshot_tx: Arc<watch::Sender<PollingSnapshot>>,
    run: u64,
    interval: Duration,
    last_activity: Option<Instant>,
    cursor: Option<i64>,
    cycles: u64,
}

impl<S: Store + Send + Sync + 'static> PollTask<S> {
    async fn run(mut self) {
        let shared = self.shared.clone();
        let _running = shared.running.lock().await;

        if !self.await_ready().await {
            debug!("Poller stopped before the source became ready");
            return;
        }

        if !self.active() {
            return;
        }
        let promoted = self.shared.state.compare_exchange(
            PollerState::AwaitingReady as u8,
            PollerState::Polling as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if promoted.is_err() {
            return;
        }

        if self.activity == ActivityMode::NewData {
            self.last_activity = Some(Instant::now());
        }
        info!(cursor = ?self.cursor, "Source ready, polling started");
        self.publish();

        loop {
            debug!(interval_ms = self.interval.as_millis() as u64, "Scheduling next poll");
            if !self.pause(self.interval).await {
                break;
            }
            self.cycle().await;
        }

        debug!(cycles = self.cycles, "Polling loop exited");
    }

    /// Probe until the source is usable and the starting cursor is known.
    /// Returns false if the poller was stopped meanwhile.
    async fn await_ready(&mut self) -> bool {
        loop {
            if !self.active() {
                return false;
            }

            if self.gate.is_ready().await {
                match self.gate.starting_cursor().await {
                    Ok(cursor) => {
                        self.cursor = cursor;
                        return true;
                    }
                    Err(e) => error!(error = %e, "Failed to read starting cursor"),
                }
            } else {
                warn!(
                    retry_secs = self.probe_interval.as_secs_f64(),
                    "Source not ready, retrying"
                );
            }

            if !self.pause(self.probe_interval).await {
                return false;
            }
        }
    }

    /// Sleep for `delay`, returning early on `stop()`. True if the run is
    /// still active afterwards.
    async fn pause(&self, delay: Duration) -> bool {
        let stopped = self.shared.stopped.notified();
        tokio::pin!(stopped);
        stopped.as_mut().enable();

        if !self.active() {
            return false;
        }
        tokio::select! {
            _ = sleep(delay) => {}
            _ = &mut stopped => {}
        }
        self.active()
    }

    async fn cycle(&mut self) {
        info!(since = ?self.cursor, "Polling for new messages");

        let had_new_data = match self.ingestor.run_cycle(self.cursor).await {
            Ok(outcome) => {
                self.cursor = outcome.cursor;
                if outcome.had_new_data || self.activity == ActivityMode::EveryCycle {
                    self.last_activity = Some(Instant::now());
                }
                info!(
                    fetched = outcome.fetched,
                    stored = outcome.stored,
                    cursor = ?outcome.cursor,
                    "Poll cycle complete"
                );
                outcome.had_new_data
            }
            Err(e) => {
                error!(kind = ?e.kind(), error = %e, cursor = ?self.cursor, "Poll cycle failed");
                false
            }
        };

        let since_activity = self
            .last_activity
            .map(|at| Instant::now().saturating_duration_since(at));
        let old = self.interval;
        self.interval = self.policy.next(old, had_new_data, since_activity);
        if self.interval != old {
            info!(
                from_secs = old.as_secs_f64(),
                to_secs = self.interval.as_secs_f64(),
                "Polling interval adjusted"
            );
        }

        self.cycles += 1;
        self.publish();
    }

    fn current_run(&self) -> bool {
        self.shared.run.load(Ordering::SeqCst) == self.run
    }

    fn active(&self) -> bool {
        self.current_run() && self.shared.state() != PollerState::Stopped
    }

    fn publish(&self) {
        // A task superseded by a restart must not overwrite the new run's view.
        if !self.current_run() {
            return;
        }
        self.snapshot_tx.send_replace(PollingSnapshot {
            state: self.shared.state(),
            interval: self.interval,
            last_activity: self.last_activity,
            cursor: self.cursor,
            cycles: self.cycles,
        });
    }
}
