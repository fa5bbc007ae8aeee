//! `plugin-host` binary: the HTTP edge. Loads configuration, builds the
//! axum app from [`plugin_host::create_server`], and serves it.
//!
//! ## Usage
//!
//! ```bash
//! plugin-host --config plugin-host.toml
//! plugin-host --config plugin-host.toml --host 0.0.0.0 --port 8080
//! ```
//!
//! Host/port flags override whatever the config file sets; everything else
//! (process limits, extensions path, package index) comes from the config
//! file and its `PLUGIN_HOST_*` environment overrides (`config.rs`).

use clap::Parser;
use plugin_host::config::Config;
use plugin_host::create_server;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "plugin-host.toml")]
    config: String,

    /// Overrides `server.host` from the config file.
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port` from the config file.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate_schema()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.logging.level.clone()))
        .init();

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let app = create_server(config).await?;

    tracing::info!(%addr, "plugin host listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
