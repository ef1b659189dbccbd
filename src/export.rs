//! Snapshot export as CSV or JSON rows of (name, address, status).

use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::models::ResultSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ExportError> {
        if name.eq_ignore_ascii_case("csv") {
            Ok(ExportFormat::Csv)
        } else if name.eq_ignore_ascii_case("json") {
            Ok(ExportFormat::Json)
        } else {
            Err(ExportError::UnsupportedFormat(name.to_string()))
        }
    }

    /// Pick a format from a file extension. No extension means CSV.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension() {
            None => Ok(ExportFormat::Csv),
            Some(ext) => Self::from_name(&ext.to_string_lossy()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub name: String,
    pub address: String,
    pub status: String,
}

pub fn rows(snapshot: &ResultSnapshot) -> Vec<ExportRow> {
    snapshot
        .entries
        .iter()
        .map(|entry| ExportRow {
            name: entry.label.clone().unwrap_or_default(),
            address: entry.address.clone(),
            status: entry.status.to_string(),
        })
        .collect()
}

pub fn render(snapshot: &ResultSnapshot, format: ExportFormat) -> Result<String, ExportError> {
    if snapshot.is_empty() {
        return Err(ExportError::NoResults);
    }

    let rows = rows(snapshot);
    match format {
        ExportFormat::Csv => Ok(format_csv(&rows)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&rows)?),
    }
}

/// Write the snapshot to `path`, appending the format's extension if the
/// path has none. Returns the path actually written.
pub fn write_to_path(snapshot: &ResultSnapshot, path: &Path) -> Result<PathBuf, ExportError> {
    let format = ExportFormat::from_path(path)?;
    let content = render(snapshot, format)?;

    let mut path = path.to_path_buf();
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }

    std::fs::write(&path, content)?;
    Ok(path)
}

fn format_csv(rows: &[ExportRow]) -> String {
    let mut output = String::from("Name,IP Address,Status\n");
    for row in rows {
        let _ = writeln!(
            output,
            "{},{},{}",
            escape_csv_field(&row.name),
            escape_csv_field(&row.address),
            row.status
        );
    }
    output
}

fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SnapshotEntry, Status};
    use chrono::Utc;

    fn snapshot() -> ResultSnapshot {
        ResultSnapshot {
            taken_at: Utc::now(),
            entries: vec![
                SnapshotEntry { address: "10.0.0.1".into(), label: Some("core-sw".into()), status: Status::Up },
                SnapshotEntry { address: "10.0.0.2".into(), label: None, status: Status::Unknown },
                SnapshotEntry {
                    address: "edge.example.net".into(),
                    label: Some("Edge, \"rack 4\"".into()),
                    status: Status::Flapping,
                },
            ],
        }
    }

    #[test]
    fn csv_has_header_and_quotes_when_needed() {
        let csv = render(&snapshot(), ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Name,IP Address,Status");
        assert_eq!(lines[1], "core-sw,10.0.0.1,UP");
        assert_eq!(lines[2], ",10.0.0.2,UNKNOWN");
        assert_eq!(lines[3], "\"Edge, \"\"rack 4\"\"\",edge.example.net,FLAPPING");
    }

    #[test]
    fn json_rows_keep_order() {
        let json = render(&snapshot(), ExportFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["address"], "10.0.0.1");
        assert_eq!(parsed[2]["status"], "FLAPPING");
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        let empty = ResultSnapshot { taken_at: Utc::now(), entries: Vec::new() };
        assert!(matches!(render(&empty, ExportFormat::Csv), Err(ExportError::NoResults)));
    }

    #[test]
    fn missing_extension_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_to_path(&snapshot(), &dir.path().join("Ping_Results")).unwrap();
        assert_eq!(written, dir.path().join("Ping_Results.csv"));
        assert!(std::fs::read_to_string(written).unwrap().starts_with("Name,IP Address,Status"));

        let written = write_to_path(&snapshot(), &dir.path().join("out.json")).unwrap();
        assert_eq!(written.extension().unwrap(), "json");
    }

    #[test]
    fn unknown_extension_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.xlsx");

        let err = write_to_path(&snapshot(), &path).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(ref ext) if ext == "xlsx"));
        assert!(!path.exists());

        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")).unwrap(), ExportFormat::Csv);
    }
}
