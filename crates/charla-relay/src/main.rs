//! # charla
//!
//! Chat relay server binary: loads settings, starts logging and metrics,
//! and serves `/ws` until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use charla_core::logging::init_subscriber;
use charla_server::metrics::install_recorder;
use charla_server::{ChatServer, ServerConfig};
use charla_settings::CharlaSettings;
use clap::Parser;

/// How long open sessions get to close after Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Charla chat relay.
#[derive(Parser, Debug)]
#[command(name = "charla", version, about = "Real-time chat relay over WebSocket")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.charla/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Settings layers plus CLI flags, flags last.
    fn server_config(&self, settings: &CharlaSettings) -> ServerConfig {
        let mut config = ServerConfig::from(&settings.server);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(charla_settings::settings_path);
    let settings = charla_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

    let level = args.log_level.as_deref().unwrap_or(&settings.logging.level);
    init_subscriber(level, settings.logging.format);

    let metrics = install_recorder().context("failed to install metrics recorder")?;

    let config = args.server_config(&settings);
    tracing::info!(
        version = charla_core::constants::VERSION,
        host = %config.host,
        port = config.port,
        max_connections = config.max_connections,
        "starting charla"
    );

    let server = ChatServer::new(config).with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("failed to start server")?;
    tracing::info!(%addr, "ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received");

    server
        .shutdown()
        .graceful_shutdown(vec![handle], SHUTDOWN_TIMEOUT)
        .await;
    tracing::info!("bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from([
            "charla",
            "--host",
            "127.0.0.1",
            "--port",
            "4000",
            "--log-level",
            "debug",
            "--settings",
            "/tmp/s.json",
        ]);
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(4000));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
    }

    #[test]
    fn flags_override_settings() {
        let settings = CharlaSettings::default();
        let cli = Cli::parse_from(["charla", "--port", "0"]);
        let config = cli.server_config(&settings);
        assert_eq!(config.port, 0);
        assert_eq!(config.host, settings.server.host);
        assert_eq!(config.max_connections, settings.server.max_connections);
    }

    #[test]
    fn no_flags_keeps_settings() {
        let settings = CharlaSettings::default();
        let config = Cli::parse_from(["charla"]).server_config(&settings);
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn server_starts_and_stops() {
        let settings = CharlaSettings::default();
        let cli = Cli::parse_from(["charla", "--host", "127.0.0.1", "--port", "0"]);
        let server = ChatServer::new(cli.server_config(&settings));
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server
            .shutdown()
            .graceful_shutdown(vec![handle], Duration::from_secs(5))
            .await;
        assert!(server.shutdown().is_shutting_down());
    }
}
