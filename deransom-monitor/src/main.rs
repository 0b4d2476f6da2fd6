mod config;

use anyhow::{Context, Result};
use clap::Parser;
use deransom_protocol::{
    websocket_url, EventHandler, EventSocket, RiskLevel, SecurityEvent, StatusUpdate,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use config::Config;

/// Headless client for the De-Ransom security event feed
#[derive(Parser, Debug)]
#[command(name = "deransom-monitor", version, about)]
struct Args {
    /// Server base URL, overriding the config file
    #[arg(short, long)]
    server: Option<String>,

    /// Alternate configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Logs every received event at a level matching its risk
struct LogHandler;

#[async_trait::async_trait]
impl EventHandler for LogHandler {
    async fn on_event(&self, event: SecurityEvent) {
        let detected = event
            .detected_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown time".to_string());

        match event.risk_level {
            Some(RiskLevel::High) => error!(
                "HIGH RISK: {} {} at {}",
                event.event_type, event.file_path, detected
            ),
            Some(RiskLevel::Medium) => warn!(
                "Suspicious: {} {} at {}",
                event.event_type, event.file_path, detected
            ),
            _ => info!("{} {} at {}", event.event_type, event.file_path, detected),
        }

        for reason in &event.detection_reasons {
            info!("  reason: {}", reason);
        }
    }

    async fn on_connect(&self) {
        info!("Connected to the event feed");
    }

    async fn on_disconnect(&self) {
        warn!("Disconnected from the event feed");
    }

    async fn on_status_update(&self, update: StatusUpdate) {
        info!(
            "Status update: {} {}",
            update.status,
            update.message.as_deref().unwrap_or("")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    // Load configuration
    let config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    let base_url = args.server.unwrap_or_else(|| config.server.base_url.clone());
    let url = websocket_url(&base_url)
        .with_context(|| format!("Failed to derive the push endpoint from {}", base_url))?;

    info!("Subscribing to security events at {}", url);

    let socket = EventSocket::with_policy(
        url,
        Arc::new(LogHandler),
        config.socket.reconnect_policy(),
    );
    socket.connect().await;

    info!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Received shutdown signal");
    socket.disconnect().await;

    Ok(())
}
