use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use pingops::config::{self, PingOpsConfig, TargetEntry};
use pingops::notify::WebhookNotifier;
use pingops::{api, export, logging, IcmpProber, Registry};

mod cli;

use crate::cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    if let Some(path) = &args.export {
        export::ExportFormat::from_path(path).with_context(|| format!("Invalid --export path {}", path.display()))?;
    }

    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from("config.json"));
    let config = PingOpsConfig::load(&config_path, args.config.is_some())?;

    let prober = IcmpProber::new(config.prober_settings())
        .context("Failed to create ICMP prober (raw socket permissions?)")?;
    let registry = Arc::new(Registry::new(Arc::new(prober), config.monitor_settings()));

    let mut targets = config.expand_targets();
    if let Some(path) = &args.targets {
        targets.extend(read_target_lists(path, args.names.as_deref())?);
    }
    register_targets(&registry, &targets);
    info!("{} targets registered", registry.len());

    if let Some(url) = &config.webhook_url {
        WebhookNotifier::new(url.clone()).spawn(registry.subscribe());
        info!("Webhook notifications enabled");
    }

    if !args.no_api {
        let port = args.port.unwrap_or(config.api_port);
        let api_registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = api::start_server(port, api_registry).await {
                tracing::error!("Control API failed: {}", e);
            }
        });
    }

    if config.autostart {
        registry.start_all();
    }

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping monitors...");
    registry.shutdown().await;

    if let Some(path) = &args.export {
        match export::write_to_path(&registry.snapshot(), path) {
            Ok(written) => info!("Results saved to {}", written.display()),
            Err(e) => warn!("Export skipped: {}", e),
        }
    }

    Ok(())
}

fn read_target_lists(targets: &std::path::Path, names: Option<&std::path::Path>) -> Result<Vec<TargetEntry>> {
    let addresses = std::fs::read_to_string(targets)
        .with_context(|| format!("Failed to read {}", targets.display()))?;
    let names = match names {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?,
        None => String::new(),
    };
    Ok(config::parse_target_lists(&addresses, &names))
}

fn register_targets(registry: &Registry, targets: &[TargetEntry]) {
    for entry in targets {
        match registry.register(&entry.address, entry.label.as_deref()) {
            Ok(true) => {}
            Ok(false) => info!("Skipping duplicate target {}", entry.address),
            Err(e) => warn!("{}", e),
        }
    }
}
