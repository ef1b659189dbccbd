use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::classifier::classify;
use crate::models::{Binary, MonitorRecord, Outcome, Status, StatusEvent, Target};
use crate::prober::Prober;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub timeout: Duration,
    /// Minimum spacing between probe starts. Zero probes continuously.
    pub min_interval: Duration,
    pub event_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(3500), min_interval: Duration::ZERO, event_capacity: 1024 }
    }
}

/// Everything a probe loop needs besides its own record.
pub(crate) struct ProbeContext {
    pub prober: Arc<dyn Prober>,
    pub settings: MonitorSettings,
    pub events: broadcast::Sender<StatusEvent>,
    pub runtime: Handle,
}

/// Loop lifecycle. Stopping means the flag was flipped but the loop has not
/// yet observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug)]
struct MonitorState {
    status: Status,
    binary: Option<Binary>,
    last_outcome: Option<Outcome>,
    last_checked: Option<DateTime<Utc>>,
    probes: u64,
    phase: Phase,
    /// Incremented on every start so a superseded loop can tell it is stale.
    epoch: u64,
    /// Wakes the current loop out of its interval sleep. One per epoch.
    wake: Arc<Notify>,
}

impl MonitorState {
    fn owns(&self, epoch: u64) -> bool {
        self.phase == Phase::Running && self.epoch == epoch
    }

    /// Called by a loop on exit. Only the current loop may move Stopping to Idle.
    fn retire(&mut self, epoch: u64) {
        if self.epoch == epoch && self.phase == Phase::Stopping {
            self.phase = Phase::Idle;
        }
    }
}

/// Probe loop and state for exactly one target.
pub struct Monitor {
    target: Target,
    seq: u64,
    state: Arc<Mutex<MonitorState>>,
    task: Mutex<Option<JoinHandle<()>>>,
    ctx: Arc<ProbeContext>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Monitor {
    pub(crate) fn new(target: Target, seq: u64, ctx: Arc<ProbeContext>) -> Self {
        Self {
            target,
            seq,
            state: Arc::new(Mutex::new(MonitorState {
                status: Status::Unknown,
                binary: None,
                last_outcome: None,
                last_checked: None,
                probes: 0,
                phase: Phase::Idle,
                epoch: 0,
                wake: Arc::new(Notify::new()),
            })),
            task: Mutex::new(None),
            ctx,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    /// Begin probing. Returns false if the loop was already running.
    pub fn start(&self) -> bool {
        let mut state = lock(&self.state);
        if state.phase == Phase::Running {
            return false;
        }
        state.epoch += 1;
        state.phase = Phase::Running;
        state.wake = Arc::new(Notify::new());

        let handle = self.ctx.runtime.spawn(run_loop(
            self.target.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.ctx),
            state.epoch,
            Arc::clone(&state.wake),
        ));
        // Stored before the state lock is released so a concurrent restart
        // cannot replace it with an older handle. A loop still draining from
        // a previous stop keeps running detached until its probe returns.
        *lock(&self.task) = Some(handle);
        drop(state);

        info!("Monitor started for {}", self.target);
        true
    }

    /// Ask the loop to exit. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let mut state = lock(&self.state);
        if state.phase != Phase::Running {
            return false;
        }
        state.phase = Phase::Stopping;
        // Stored permit, so a loop that has not reached its sleep yet still sees it.
        state.wake.notify_one();
        drop(state);

        info!("Monitor stopping for {}", self.target);
        true
    }

    pub fn current(&self) -> MonitorRecord {
        let state = lock(&self.state);
        MonitorRecord {
            target: self.target.clone(),
            status: state.status,
            last_outcome: state.last_outcome.clone(),
            running: state.phase == Phase::Running,
            last_checked: state.last_checked,
            probes: state.probes,
        }
    }

    pub fn status(&self) -> Status {
        lock(&self.state).status
    }

    /// Wait for the most recently started loop to exit.
    pub(crate) async fn join(&self) {
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Probe loop for {} ended abnormally: {}", self.target, e);
            }
        }
    }
}

async fn run_loop(
    target: Target,
    state: Arc<Mutex<MonitorState>>,
    ctx: Arc<ProbeContext>,
    epoch: u64,
    wake: Arc<Notify>,
) {
    debug!("Probe loop {} started for {}", epoch, target.address);

    loop {
        {
            let mut st = lock(&state);
            if !st.owns(epoch) {
                st.retire(epoch);
                break;
            }
        }

        let started = Instant::now();
        let outcome = guarded_probe(ctx.prober.as_ref(), &target.address, ctx.settings.timeout).await;

        {
            let mut st = lock(&state);
            // A stop that landed during the probe discards its result.
            if !st.owns(epoch) {
                st.retire(epoch);
                break;
            }

            let previous = st.status;
            let classification = classify(previous, st.binary, &outcome);
            st.status = classification.status;
            st.binary = Some(classification.binary);
            st.last_outcome = Some(outcome.clone());
            st.last_checked = Some(Utc::now());
            st.probes += 1;

            log_classification(&target, previous, classification.status, classification.changed, &outcome);

            // Sent under the record lock so nothing is published once stop() returns.
            let _ = ctx.events.send(StatusEvent {
                address: target.address.clone(),
                label: target.label.clone(),
                previous,
                status: classification.status,
                changed: classification.changed,
                outcome,
                timestamp: Utc::now(),
            });
        }

        if !ctx.settings.min_interval.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep_until(started + ctx.settings.min_interval) => {}
                _ = wake.notified() => {}
            }
        }
    }

    debug!("Probe loop {} exited for {}", epoch, target.address);
}

/// Run one probe, turning a panic inside the prober into an error outcome.
async fn guarded_probe(prober: &dyn Prober, address: &str, timeout: Duration) -> Outcome {
    match AssertUnwindSafe(prober.probe(address, timeout)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Prober panicked while probing {}: {}", address, reason);
            Outcome::error(format!("Probe failed unexpectedly: {}", reason))
        }
    }
}

fn log_classification(target: &Target, previous: Status, status: Status, changed: bool, outcome: &Outcome) {
    if !changed {
        debug!("{} {} {}", target.address, status, outcome.detail());
        return;
    }

    let msg = format!("[CHANGE] {} {} -> {} ({})", target, previous, status, outcome.detail());
    match status {
        Status::Down => error!("{}", msg),
        Status::Flapping => warn!("{}", msg),
        _ => info!("{}", msg),
    }
}
