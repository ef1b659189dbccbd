use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::RegistryError;
use crate::models::{MonitorRecord, ResultSnapshot, SnapshotEntry, StatusEvent, Target};
use crate::monitor::{Monitor, MonitorSettings, ProbeContext};
use crate::prober::Prober;

/// Owns every monitor, keyed by target address.
///
/// The map lock only guards membership. Each monitor publishes under its own
/// record lock, so probe loops never contend with each other.
pub struct Registry {
    monitors: RwLock<HashMap<String, Arc<Monitor>>>,
    next_seq: AtomicU64,
    ctx: Arc<ProbeContext>,
}

impl Registry {
    /// Must be called from inside a Tokio runtime; probe loops are spawned on it.
    pub fn new(prober: Arc<dyn Prober>, settings: MonitorSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            monitors: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            ctx: Arc::new(ProbeContext { prober, settings, events, runtime: Handle::current() }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Monitor>>> {
        self.monitors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Monitor>>> {
        self.monitors.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn monitor(&self, address: &str) -> Option<Arc<Monitor>> {
        self.read().get(address.trim()).cloned()
    }

    /// Monitors in registration order, cloned out so no lock is held while
    /// callers act on them.
    fn ordered(&self) -> Vec<Arc<Monitor>> {
        let mut monitors: Vec<Arc<Monitor>> = self.read().values().cloned().collect();
        monitors.sort_by_key(|m| m.seq());
        monitors
    }

    /// Add a target with status Unknown. Returns false if the address is
    /// already registered; the existing monitor and its label are kept.
    pub fn register(&self, address: &str, label: Option<&str>) -> Result<bool, RegistryError> {
        let target = Target::parse(address, label)?;

        let mut monitors = self.write();
        if monitors.contains_key(&target.address) {
            return Ok(false);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        info!("Registered {}", target);
        let key = target.address.clone();
        monitors.insert(key, Arc::new(Monitor::new(target, seq, Arc::clone(&self.ctx))));
        Ok(true)
    }

    /// Stop and remove a monitor. Returns false if it was never registered.
    pub fn unregister(&self, address: &str) -> bool {
        let removed = self.write().remove(address.trim());
        match removed {
            Some(monitor) => {
                monitor.stop();
                info!("Unregistered {}", monitor.target());
                true
            }
            None => false,
        }
    }

    pub fn unregister_all(&self) -> usize {
        let removed: Vec<Arc<Monitor>> = self.write().drain().map(|(_, m)| m).collect();
        for monitor in &removed {
            monitor.stop();
        }
        info!("Unregistered {} monitors", removed.len());
        removed.len()
    }

    /// Start one monitor. Returns false if unknown or already running.
    pub fn start(&self, address: &str) -> bool {
        self.monitor(address).is_some_and(|m| m.start())
    }

    /// Stop one monitor. Returns false if unknown or not running.
    pub fn stop(&self, address: &str) -> bool {
        self.monitor(address).is_some_and(|m| m.stop())
    }

    /// Start every monitor. Returns how many were newly started.
    pub fn start_all(&self) -> usize {
        let started = self.ordered().iter().filter(|m| m.start()).count();
        info!("Started {} monitors", started);
        started
    }

    /// Stop every monitor. Returns how many were running.
    pub fn stop_all(&self) -> usize {
        let stopped = self.ordered().iter().filter(|m| m.stop()).count();
        info!("Stopped {} monitors", stopped);
        stopped
    }

    pub fn contains(&self, address: &str) -> bool {
        self.read().contains_key(address.trim())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, address: &str) -> Option<MonitorRecord> {
        self.monitor(address).map(|m| m.current())
    }

    pub fn records(&self) -> Vec<MonitorRecord> {
        self.ordered().iter().map(|m| m.current()).collect()
    }

    pub fn snapshot(&self) -> ResultSnapshot {
        let entries = self
            .ordered()
            .iter()
            .map(|m| SnapshotEntry {
                address: m.target().address.clone(),
                label: m.target().label.clone(),
                status: m.status(),
            })
            .collect();

        ResultSnapshot { taken_at: Utc::now(), entries }
    }

    /// Receive every classification from every monitor.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.ctx.events.subscribe()
    }

    /// Invoke `callback` for each classification on a background task.
    pub fn on_status_changed<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(&StatusEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();
        self.ctx.runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(&event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Status subscriber lagged, {} events dropped", missed)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Stop every monitor and wait for their loops to finish.
    pub async fn shutdown(&self) {
        let monitors = self.ordered();
        for monitor in &monitors {
            monitor.stop();
        }
        futures::future::join_all(monitors.iter().map(|m| m.join())).await;
        info!("All probe loops finished");
    }
}
