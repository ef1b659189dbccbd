use anyhow::{Context, Result};
use hickory_resolver::config::ResolverConfig;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::monitor::MonitorSettings;
use crate::prober::ProberSettings;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PingOpsConfig {
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub min_interval_ms: u64,
    #[serde(default = "default_autostart")]
    pub autostart: bool,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub tcp_fallback: bool,
    #[serde(default = "default_fallback_ports")]
    pub fallback_ports: Vec<u16>,
    #[serde(default)]
    pub resolver: ResolverKind,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    /// Host, IP address or CIDR block.
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    #[default]
    Cloudflare,
    Google,
    Quad9,
}

impl ResolverKind {
    pub fn resolver_config(self) -> ResolverConfig {
        match self {
            ResolverKind::Cloudflare => ResolverConfig::cloudflare(),
            ResolverKind::Google => ResolverConfig::google(),
            ResolverKind::Quad9 => ResolverConfig::quad9(),
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverKind::Cloudflare => write!(f, "Cloudflare 1.1.1.1 / 1.0.0.1"),
            ResolverKind::Google => write!(f, "Google 8.8.8.8 / 8.8.4.4"),
            ResolverKind::Quad9 => write!(f, "Quad9 9.9.9.9"),
        }
    }
}

fn default_timeout() -> u64 { 3500 }
fn default_autostart() -> bool { true }
fn default_api_port() -> u16 { 3000 }
fn default_event_capacity() -> usize { 1024 }
pub fn default_fallback_ports() -> Vec<u16> { vec![22, 80, 443, 3389] }

impl Default for PingOpsConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            timeout_ms: default_timeout(),
            min_interval_ms: 0,
            autostart: default_autostart(),
            api_port: default_api_port(),
            webhook_url: None,
            tcp_fallback: false,
            fallback_ports: default_fallback_ports(),
            resolver: ResolverKind::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl PingOpsConfig {
    /// Read a JSON config. A missing file is only tolerated when
    /// `required` is false, in which case defaults are used.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() && !required {
            warn!("{} not found, starting with default configuration", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        anyhow::ensure!(config.timeout_ms > 0, "timeout_ms must be greater than zero");
        anyhow::ensure!(config.event_capacity > 0, "event_capacity must be greater than zero");
        Ok(config)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            min_interval: Duration::from_millis(self.min_interval_ms),
            event_capacity: self.event_capacity,
        }
    }

    pub fn prober_settings(&self) -> ProberSettings {
        ProberSettings {
            resolver: self.resolver,
            tcp_fallback: self.tcp_fallback,
            fallback_ports: self.fallback_ports.clone(),
        }
    }

    /// Flatten configured targets, expanding CIDR blocks into host addresses.
    pub fn expand_targets(&self) -> Vec<TargetEntry> {
        let mut expanded = Vec::new();
        for entry in &self.targets {
            match entry.address.trim().parse::<IpNet>() {
                Ok(net) => expanded.extend(net.hosts().map(|ip| TargetEntry {
                    address: ip.to_string(),
                    label: entry.label.clone(),
                })),
                Err(_) => expanded.push(entry.clone()),
            }
        }
        expanded
    }
}

/// Pair a list of addresses with a list of names by line index.
///
/// Blank address lines are skipped but still consume a name slot so the
/// two lists stay aligned line for line.
pub fn parse_target_lists(addresses: &str, names: &str) -> Vec<TargetEntry> {
    let names: Vec<&str> = names.lines().collect();

    addresses
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let address = raw.trim();
            if address.is_empty() {
                return None;
            }
            let label = names.get(idx).map(|n| n.trim()).filter(|n| !n.is_empty()).map(str::to_string);
            Some(TargetEntry { address: address.to_string(), label })
        })
        .collect()
}
