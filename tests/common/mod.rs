#![allow(dead_code)]

use async_trait::async_trait;
use pingops::{MonitorSettings, Outcome, Prober, Registry, StatusEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

type Script = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Outcome>>>;

/// Prober whose outcomes are fed by the test, one per probe.
///
/// A probe waits for the next fed outcome and reports Timeout if none arrives
/// within the timeout. Addresses without a script always time out.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn feed(&self, address: &str) -> mpsc::UnboundedSender<Outcome> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().insert(address.to_string(), Arc::new(tokio::sync::Mutex::new(rx)));
        tx
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: &str, timeout: Duration) -> Outcome {
        let script = self.scripts.lock().unwrap().get(address).cloned();
        let Some(script) = script else {
            tokio::time::sleep(timeout).await;
            return Outcome::Timeout;
        };

        let mut rx = script.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                tokio::time::sleep(timeout).await;
                Outcome::Timeout
            }
            Err(_) => Outcome::Timeout,
        }
    }
}

pub fn success(address: &str) -> Outcome {
    Outcome::success(format!("Reply from {address}: bytes=56 time=1.0ms"), Some(1.0))
}

pub fn registry_with(prober: Arc<ScriptedProber>, timeout: Duration) -> Registry {
    registry_with_interval(prober, timeout, Duration::ZERO)
}

pub fn registry_with_interval(prober: Arc<ScriptedProber>, timeout: Duration, min_interval: Duration) -> Registry {
    let settings = MonitorSettings { timeout, min_interval, ..MonitorSettings::default() };
    Registry::new(prober, settings)
}

pub async fn next_event(rx: &mut broadcast::Receiver<StatusEvent>, within: Duration) -> StatusEvent {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("timed out waiting for a status event")
        .expect("event channel closed")
}
