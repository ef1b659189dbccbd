use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Dependencies that are chatty at `info` and only matter when debugging them.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "hickory_proto", "hickory_resolver", "surge_ping"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to compact and are returned for a warning.
    fn parse(value: Option<&str>) -> (Self, Option<String>) {
        match value.map(str::trim) {
            None | Some("") | Some("compact") => (LogFormat::Compact, None),
            Some("json") => (LogFormat::Json, None),
            Some(other) => (LogFormat::Compact, Some(other.to_string())),
        }
    }
}

/// Directives used when `RUST_LOG` is unset: `level` for everything, with
/// the networking dependencies held at warn.
fn default_directives(level: LevelFilter) -> String {
    let mut directives = vec![level.to_string().to_lowercase()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

fn build_filter(rust_log: Option<&str>, level: LevelFilter) -> EnvFilter {
    match rust_log.filter(|value| !value.trim().is_empty()) {
        Some(value) => EnvFilter::builder().with_default_directive(level.into()).parse_lossy(value),
        None => EnvFilter::new(default_directives(level)),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter and
/// `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init() {
    init_with_level(LevelFilter::INFO);
}

pub fn init_with_level(level: LevelFilter) {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), level);
    let (format, unknown) = LogFormat::parse(std::env::var("RUST_LOG_FORMAT").ok().as_deref());

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().flatten_event(true).with_filter(filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().with_target(false).with_filter(filter).boxed(),
    };

    tracing_subscriber::registry().with(layer).init();

    if let Some(value) = unknown {
        warn!("Unknown RUST_LOG_FORMAT {:?}, using compact output", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_network_crates() {
        let directives = default_directives(LevelFilter::DEBUG);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("hickory_proto=warn"));
        assert!(directives.contains("surge_ping=warn"));

        let filter = build_filter(None, LevelFilter::INFO).to_string();
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn rust_log_replaces_the_defaults() {
        let filter = build_filter(Some("pingops=trace"), LevelFilter::INFO).to_string();
        assert!(filter.contains("pingops=trace"));
        assert!(!filter.contains("hyper=warn"));
    }

    #[test]
    fn format_parsing() {
        assert_eq!(LogFormat::parse(None), (LogFormat::Compact, None));
        assert_eq!(LogFormat::parse(Some("json")), (LogFormat::Json, None));
        assert_eq!(LogFormat::parse(Some("pretty")), (LogFormat::Compact, Some("pretty".to_string())));
    }
}
