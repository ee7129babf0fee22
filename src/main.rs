use anyhow::Context;
use clap::Parser;
use heartline::bridge::{Bridge, BridgeMessage};
use heartline::config::Config;
use heartline::dispatch::Dispatcher;
use heartline::error::TransportError;
use heartline::publisher::{KenerSink, Publisher};
use heartline::resolver::StatusResolver;
use heartline::transport::KumaClient;
use heartline::watchdog::Watchdog;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line arguments for the status bridge
#[derive(Parser)]
#[command(
    name = "heartline",
    about = "Uptime Kuma to Kener status bridge",
    long_about = "Listens to the Uptime Kuma monitor feed, resolves every tagged monitor \
                  (including groups) into UP, DEGRADED or DOWN and publishes the result \
                  to the Kener status API."
)]
struct Cli {
    /// Bridge settings in TOML; KUMA_* and KENER_* variables override them
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Load and validate the bridge settings, then exit without connecting
    #[arg(long)]
    check: bool,

    /// Log feed events and publishes at debug level (sets RUST_LOG=debug)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Settings file to load, if one should be read at all
    ///
    /// A path that does not exist yet is passed through: the bridge then runs
    /// on defaults and environment variables alone.
    fn settings_file(&self) -> Result<Option<&Path>, String> {
        let Some(path) = self.config.as_deref() else {
            return Ok(None);
        };
        if path.as_os_str().is_empty() {
            return Err("--config was given an empty path".to_string());
        }
        if path.is_dir() {
            return Err(format!(
                "Bridge settings must be a file, {} is a directory",
                path.display()
            ));
        }
        if path.exists() && path.extension().map_or(true, |ext| ext != "toml") {
            warn!("Reading bridge settings from {} as TOML", path.display());
        }

        Ok(Some(path))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before the logger so RUST_LOG may come from .env too
    let dotenv = dotenvy::dotenv();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting heartline");
    if let Ok(path) = &dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let settings_file = match cli.settings_file() {
        Ok(path) => path,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            std::process::exit(1);
        }
    };

    let config = Config::load(settings_file).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    if cli.check {
        info!(
            "Configuration is valid: feed {}, status API {}",
            config.kuma.url, config.kener.url
        );
        return Ok(());
    }

    let sink = KenerSink::new(
        config.kener.url.clone(),
        config.kener.token.clone(),
        config.publish_timeout(),
    )
    .context("Failed to create status API client")?;
    let dispatcher = Dispatcher::new(
        StatusResolver::new(config.resolver_settings()),
        config.liveness_threshold(),
    );
    let (bridge, sender) = Bridge::new(dispatcher, Publisher::new(Arc::new(sink)));
    let bridge_task = tokio::spawn(bridge.run());

    let watchdog = Watchdog::new(config.watchdog_schedule()?).spawn(sender.clone());

    let client = KumaClient::new(config.kuma.url.clone(), config.credentials());
    let exit_on_disconnect = config.kuma.exit_on_disconnect;
    let feed_sender = sender.clone();
    let feed = tokio::spawn(async move {
        match client.run(feed_sender.clone()).await {
            Ok(()) => warn!(target: "kuma", "Feed connection closed by the server"),
            Err(TransportError::Auth(failure)) => {
                error!(target: "kuma", "Login to the monitoring backend failed: {}", failure)
            }
            Err(e) => error!(target: "kuma", "Feed connection failed: {}", e),
        }

        if exit_on_disconnect {
            info!("Feed is gone and exit_on_disconnect is set, shutting down");
            let _ = feed_sender.send(BridgeMessage::Shutdown);
        } else {
            warn!("No more feed events, statuses are only republished by the watchdog");
        }
    });

    let shutdown_sender = sender.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(BridgeMessage::Shutdown) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .context("Error setting SIGINT handler for graceful shutdown")?;
    drop(sender);

    info!("heartline is running. Press Ctrl+C to stop.");

    let dispatcher = bridge_task.await.context("Bridge task failed")?;
    feed.abort();
    watchdog.abort();

    info!(
        "Shutdown complete ({} monitors, {} heartbeats known)",
        dispatcher.registry().len(),
        dispatcher.store().len()
    );
    Ok(())
}
