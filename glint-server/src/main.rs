//! glint-server — entry point.
//!
//! ```text
//! glint-server                    Run with defaults (127.0.0.1:3000)
//! glint-server --config <path>    Load a config TOML
//! glint-server --address <addr>   Override the bind address
//! glint-server --port <port>      Override the bind port
//! glint-server --gen-config       Write default config to stdout
//! ```

mod config;
mod ports;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use glint_core::{
    engine, GdiScreenSource, ServerConfig, SessionPorts, ShareServer, SystemInputInjector,
};

use config::ServerSettings;
use ports::{
    EnvSecretStore, LoggingCommandPort, SpoolUploadPort, TracingUiPort, UnconfiguredChatPort,
};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "glint-server", about = "Adaptive screen-share server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "glint-server.toml")]
    config: PathBuf,

    /// Override the configured bind address.
    #[arg(long)]
    address: Option<String>,

    /// Override the configured bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerSettings::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut settings = ServerSettings::load(&cli.config)?;
    if let Some(address) = cli.address {
        settings.network.address = address;
    }
    if let Some(port) = cli.port {
        settings.network.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.logging.filter.clone())),
        )
        .init();

    let source = GdiScreenSource::new()?;
    let engine = engine::initialize(Box::new(source))?;

    let session_ports = SessionPorts {
        input: Arc::new(SystemInputInjector::new()),
        commands: Arc::new(LoggingCommandPort),
        uploads: Arc::new(SpoolUploadPort::new(settings.uploads.spool_dir.clone())),
        chat: Arc::new(UnconfiguredChatPort),
        ui: Arc::new(TracingUiPort),
        secrets: Arc::new(EnvSecretStore),
    };

    let server = ShareServer::new(
        engine.clone(),
        session_ports,
        ServerConfig {
            port: settings.network.port,
        },
    );
    server.start(&settings.network.address).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    server.stop().await;
    engine::shutdown().await;

    Ok(())
}
