use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::error::RegistryError;

/// Observed reachability of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Unknown,
    Up,
    Down,
    Flapping,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "UNKNOWN"),
            Status::Up => write!(f, "UP"),
            Status::Down => write!(f, "DOWN"),
            Status::Flapping => write!(f, "FLAPPING"),
        }
    }
}

/// The two states an outcome can actually be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Binary {
    Up,
    Down,
}

impl From<Binary> for Status {
    fn from(binary: Binary) -> Self {
        match binary {
            Binary::Up => Status::Up,
            Binary::Down => Status::Down,
        }
    }
}

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Success { detail: String, latency_ms: Option<f64> },
    Timeout,
    Error { detail: String },
}

impl Outcome {
    pub fn success(detail: impl Into<String>, latency_ms: Option<f64>) -> Self {
        Outcome::Success { detail: detail.into(), latency_ms }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Outcome::Error { detail: detail.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            Outcome::Success { latency_ms, .. } => *latency_ms,
            _ => None,
        }
    }

    /// Raw text of the outcome, the "latest line" a display shows.
    pub fn detail(&self) -> &str {
        match self {
            Outcome::Success { detail, .. } | Outcome::Error { detail } => detail,
            Outcome::Timeout => "Request timed out.",
        }
    }
}

/// A monitored endpoint. `address` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub address: String,
    pub label: Option<String>,
}

impl Target {
    /// Validate an address and build a target. Surrounding whitespace is
    /// trimmed from both fields and an empty label is treated as absent.
    pub fn parse(address: &str, label: Option<&str>) -> Result<Self, RegistryError> {
        let address = address.trim();
        if let Err(reason) = validate_address(address) {
            return Err(RegistryError::InvalidTarget { address: address.to_string(), reason });
        }

        let label = label.map(str::trim).filter(|l| !l.is_empty()).map(str::to_string);

        Ok(Self { address: address.to_string(), label })
    }

    pub fn label_or_empty(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", self.address, label),
            None => write!(f, "{}", self.address),
        }
    }
}

fn validate_address(address: &str) -> Result<(), &'static str> {
    if address.is_empty() {
        return Err("address is empty");
    }
    if address.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    if address.contains('/') {
        return Err("network ranges must be expanded before registration");
    }
    if address.len() > 253 {
        return Err("hostname exceeds 253 characters");
    }

    let host = address.strip_suffix('.').unwrap_or(address);
    let labels: Vec<&str> = host.split('.').collect();

    if labels.iter().all(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_digit())) {
        return Err("not a valid IPv4 address");
    }

    for label in labels {
        if label.is_empty() || label.len() > 63 {
            return Err("hostname label must be 1-63 characters");
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err("hostname contains invalid characters");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("hostname label cannot start or end with '-'");
        }
    }
    Ok(())
}

/// Point-in-time view of one monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub target: Target,
    pub status: Status,
    pub last_outcome: Option<Outcome>,
    pub running: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub probes: u64,
}

/// Fired once per classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub address: String,
    pub label: Option<String>,
    pub previous: Status,
    pub status: Status,
    pub changed: bool,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn detail(&self) -> &str {
        self.outcome.detail()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub address: String,
    pub label: Option<String>,
    pub status: Status,
}

/// Exported view of the registry, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub taken_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

impl ResultSnapshot {
    pub fn get(&self, address: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
