//! presenced - The presence background service
//!
//! This is the main entry point for the presenced service.
//! It wires together all the components:
//! - Configuration loading (file plus environment overrides)
//! - Voice gateway
//! - Session scheduler
//! - Signal handling and graceful shutdown

mod dry_run;

use anyhow::{Context, Result};
use clap::Parser;
use presence_config::{ConfigOverrides, Policy, config_from_overrides, load_config_with};
use presence_core::{Scheduler, SystemClock};
use presence_gateway_api::Gateway;
use presence_util::{default_config_path, is_mock_time_active};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::dry_run::DryRunGateway;

/// How often gateway health is checked
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// presenced - Keeps a voice channel company on a randomized schedule
#[derive(Parser, Debug)]
#[command(name = "presenced")]
#[command(about = "Keeps a voice channel company on a randomized schedule", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/presenced/config.toml,
    /// skipped if absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Guild (server) containing the channel
    #[arg(long, env = "GUILD_ID")]
    guild_id: Option<String>,

    /// Voice channel to occupy
    #[arg(long, env = "VOICE_CHANNEL_ID")]
    channel_id: Option<String>,

    /// First hour (0-23) of the active window
    #[arg(long, env = "ACTIVE_HOUR_START")]
    active_hour_start: Option<u32>,

    /// Hour (0-23) at which the active window closes
    #[arg(long, env = "ACTIVE_HOUR_END")]
    active_hour_end: Option<u32>,

    /// Shortest session, in minutes
    #[arg(long, env = "SESSION_DURATION_MIN")]
    duration_min: Option<u32>,

    /// Longest session, in minutes
    #[arg(long, env = "SESSION_DURATION_MAX")]
    duration_max: Option<u32>,

    /// Shortest pause between sessions, in minutes
    #[arg(long, env = "SESSION_DELAY_MIN")]
    delay_min: Option<u32>,

    /// Longest pause between sessions, in minutes
    #[arg(long, env = "SESSION_DELAY_MAX")]
    delay_max: Option<u32>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            guild_id: self.guild_id.clone(),
            channel_id: self.channel_id.clone(),
            active_hour_start: self.active_hour_start,
            active_hour_end: self.active_hour_end,
            duration_min_minutes: self.duration_min,
            duration_max_minutes: self.duration_max,
            delay_min_minutes: self.delay_min,
            delay_max_minutes: self.delay_max,
        }
    }

    /// Explicit `--config` must exist; the default path is optional
    fn load_policy(&self) -> Result<Policy> {
        let overrides = self.overrides();

        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(default_config_path()).filter(|p| p.exists()),
        };

        match path {
            Some(path) => {
                let policy = load_config_with(&path, &overrides)
                    .with_context(|| format!("Failed to load config from {:?}", path))?;
                info!(config_path = %path.display(), "Configuration loaded");
                Ok(policy)
            }
            None => {
                let policy = config_from_overrides(&overrides)
                    .context("Invalid configuration (no config file found, using environment)")?;
                info!("Configuration loaded from environment");
                Ok(policy)
            }
        }
    }
}

/// Main service state
struct Service {
    scheduler: Scheduler,
    gateway: Arc<dyn Gateway>,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let policy = args.load_policy()?;

        info!(
            guild_id = %policy.target.guild_id,
            channel_id = %policy.target.channel_id,
            window = %policy.window,
            duration_minutes = ?policy.session.duration_range(),
            delay_minutes = ?policy.session.delay_range(),
            "Policy ready"
        );

        if policy.window.is_zero_width() {
            warn!(window = %policy.window, "Active window is empty, no sessions will run");
        }

        if is_mock_time_active() {
            warn!("Mock time is active, the wall clock is shifted");
        }

        // Real platform clients implement `Gateway`; the built-in one only logs
        let gateway: Arc<dyn Gateway> = Arc::new(DryRunGateway::new());
        info!("Using dry-run gateway");

        let scheduler = Scheduler::new(policy, gateway.clone(), Arc::new(SystemClock));

        Ok(Self { scheduler, gateway })
    }

    async fn run(self) -> Result<()> {
        let Service {
            mut scheduler,
            gateway,
        } = self;

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler_run = scheduler.run(shutdown_rx);
        tokio::pin!(scheduler_run);

        let mut health_timer = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        let mut was_healthy = true;

        info!("Service running");

        loop {
            tokio::select! {
                // Signal: SIGTERM or SIGINT - graceful shutdown
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = health_timer.tick() => {
                    let healthy = gateway.is_healthy();
                    if healthy != was_healthy {
                        if healthy {
                            info!("Gateway healthy again");
                        } else {
                            warn!("Gateway reports unhealthy");
                        }
                        was_healthy = healthy;
                    }
                }

                // Scheduler stopped on its own
                result = &mut scheduler_run => {
                    if let Err(e) = &result {
                        error!(error = %e, "Scheduler stopped unexpectedly");
                    }
                    return result.context("Scheduler failed");
                }
            }
        }

        // Graceful shutdown: the scheduler releases the channel before returning
        info!("Shutting down presenced");
        let _ = shutdown_tx.send(true);
        scheduler_run.await.context("Scheduler failed during shutdown")?;

        info!("Shutdown complete");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "presenced starting"
    );

    // Create and run the service
    let service = Service::new(&args)?;
    service.run().await
}
