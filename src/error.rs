use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid target `{address}`: {reason}")]
    InvalidTarget { address: String, reason: &'static str },
}

#[derive(Debug, Error)]
pub enum ProberError {
    #[error("failed to open ICMP socket: {0}")]
    Socket(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no results to export")]
    NoResults,
    #[error("unsupported export format `{0}` (expected csv or json)")]
    UnsupportedFormat(String),
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode results: {0}")]
    Json(#[from] serde_json::Error),
}
