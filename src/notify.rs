use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{Status, StatusEvent};

/// Posts a Discord-style embed for every status transition.
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http_client: reqwest::Client::new() }
    }

    pub fn spawn(self, mut rx: broadcast::Receiver<StatusEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.changed => self.send(&event).await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => warn!("Webhook notifier skipped {} events", missed),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn send(&self, event: &StatusEvent) {
        let payload = build_payload(event);
        match self.http_client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => debug!("Webhook delivered for {}", event.address),
            Ok(resp) => warn!("Webhook for {} rejected with {}", event.address, resp.status()),
            Err(e) => warn!("Webhook for {} failed: {}", event.address, e),
        }
    }
}

fn color(status: Status) -> u32 {
    match status {
        Status::Up => 0x2ECC71,
        Status::Down => 0xE74C3C,
        Status::Flapping => 0xFBC02D,
        Status::Unknown => 0x95A5A6,
    }
}

pub fn build_payload(event: &StatusEvent) -> Value {
    serde_json::json!({
        "username": "PingOps",
        "embeds": [{
            "title": "Reachability Status Transition",
            "color": color(event.status),
            "fields": [
                { "name": "Name", "value": event.label.as_deref().unwrap_or("-"), "inline": true },
                { "name": "IP Address", "value": event.address, "inline": true },
                { "name": "Transition", "value": format!("{} \u{2192} {}", event.previous, event.status), "inline": true },
                { "name": "Latency", "value": event.outcome.latency_ms().map_or("N/A".to_string(), |l| format!("{:.2}ms", l)), "inline": true },
                { "name": "Reply", "value": event.detail(), "inline": false }
            ],
            "timestamp": Utc::now().to_rfc3339(),
            "footer": { "text": "PingOps reachability monitor" }
        }]
    })
}
