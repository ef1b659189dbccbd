//! Continuous reachability monitoring for a set of network targets.
//!
//! Each registered target gets a [`Monitor`] running its own probe loop.
//! Outcomes are classified into UP, DOWN or FLAPPING by [`classify`] and
//! published through the [`Registry`].

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod prober;
pub mod registry;

pub use classifier::{classify, Classification};
pub use error::{ExportError, ProberError, RegistryError};
pub use models::{Binary, MonitorRecord, Outcome, ResultSnapshot, SnapshotEntry, Status, StatusEvent, Target};
pub use monitor::{Monitor, MonitorSettings, Phase};
pub use prober::{IcmpProber, Prober, ProberSettings};
pub use registry::Registry;
