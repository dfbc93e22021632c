//! mesh-dns binary entry point.

use clap::Parser;
use mesh_dns::{telemetry, Config, ControllerClient, DnsServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Authoritative DNS server for mesh VPN network members.
#[derive(Parser, Debug)]
#[command(name = "mesh-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "mesh-dns.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("MESH_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    // Bail early on anything the server cannot start without.
    config.validate()?;

    #[cfg(unix)]
    if nix::unistd::geteuid().is_root() {
        tracing::warn!("running this application as root is discouraged");
    }

    info!(
        config_file = %args.config.display(),
        suffix = %config.dns.suffix,
        networks = config.dns.networks.len(),
        controller = %config.controller.base_url,
        "starting mesh-dns"
    );

    // Setup graceful shutdown
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    // Run DNS server
    let client = ControllerClient::new(&config.controller)?;
    let server = DnsServer::new(config.dns);
    let result = server.run(client, cancel).await;

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("mesh-dns shutdown complete");
    Ok(())
}

#[cfg(unix)]
fn spawn_signal_handler(cancel: CancellationToken) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
        info!("shutdown signal received");
        cancel.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_handler(cancel: CancellationToken) -> std::io::Result<()> {
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        cancel.cancel();
    });
    Ok(())
}
