use anyhow::{Context, Result};
use clap::Parser;
use jot_core::{Config, Db};
use jot_sync::{
    notice_channel, ConnectivityMonitor, EngineConfig, HttpRemote, NoteFeed, StatusHandle,
    SyncEngine, SyncTrigger,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "jot-syncd", about = "Background sync daemon for jot")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "~/.config/jot/config.toml")]
    config: String,

    /// Run in foreground mode (don't daemonize)
    #[arg(long)]
    foreground: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .init();

    // Expand config path
    let config_path = if let Some(rest) = args.config.strip_prefix("~/") {
        dirs::home_dir()
            .context("Cannot determine home directory")?
            .join(rest)
    } else {
        PathBuf::from(args.config)
    };
    let config = load_config(&config_path)?;

    let Some(server_url) = config.sync.server_url.clone() else {
        tracing::info!("no server configured - local-only mode, nothing to sync");
        return Ok(());
    };
    tracing::info!(server = %server_url, "jot-syncd starting");

    let db_path = config.db_path()?;
    let db = Db::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    let request_timeout = Duration::from_secs(config.sync.request_timeout_seconds);
    let remote = HttpRemote::new(&server_url, config.sync.auth_token.clone(), request_timeout)?;
    let feed = Arc::new(NoteFeed::new(config.sync.page_size));
    let (notices, mut notice_rx) = notice_channel();
    let (status, _status_rx) = StatusHandle::new();

    let mut monitor = ConnectivityMonitor::spawn(
        server_url,
        Duration::from_secs(config.sync.probe_interval_seconds),
        request_timeout,
    );
    let online = monitor.online();

    let mut engine = SyncEngine::new(
        &db,
        remote,
        EngineConfig::from_settings(&config.sync),
        feed,
        notices,
        status,
    );

    let mut interval =
        tokio::time::interval(Duration::from_secs(config.sync.interval_seconds.max(1)));

    if !args.foreground {
        tracing::info!("jot-syncd daemon started");
        // TODO: Daemonize process (platform-specific)
    }

    // Main event loop
    loop {
        tokio::select! {
            trigger = monitor.recv() => {
                match trigger {
                    Some(trigger) => engine.sync(trigger).await,
                    None => break,
                }
            }

            _ = interval.tick() => {
                if *online.borrow() {
                    engine.sync(SyncTrigger::Periodic).await;
                } else {
                    tracing::debug!("offline, skipping periodic sync");
                }
            }

            Some(notice) = notice_rx.recv() => {
                tracing::warn!(?notice, "sync notice");
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal, stopping jot-syncd");
                break;
            }
        }
    }

    db.close()?;
    Ok(())
}

/// Load the config file, writing a default one when none exists yet
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from(path)
    } else {
        let config = Config::default();
        config
            .save_to(path)
            .context("Failed to save default config")?;
        tracing::info!(path = %path.display(), "created default config");
        Ok(config)
    }
}
