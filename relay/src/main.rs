use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use args::Args;
use clap::Parser;
use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

mod args;
mod logger;

const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    logger::init(&args);

    let _telemetry = telemetry::init(&config.telemetry).await?;
    let _tracing = telemetry::tracing::init_tracing(&config.telemetry).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    if let Err(e) = server::serve(serve_config(&args, config, shutdown)).await {
        log::error!("Server failed to start: {e}");
        std::process::exit(1);
    }

    log::info!("Server stopped");

    Ok(())
}

fn serve_config(args: &Args, config: Config, shutdown: CancellationToken) -> ServeConfig {
    let listen_address = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or(DEFAULT_LISTEN_ADDRESS);

    ServeConfig {
        listen_address,
        config,
        shutdown,
    }
}

async fn shutdown_on_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received shutdown signal, finishing in-flight requests"),
        Err(e) => {
            log::error!("Failed to listen for the shutdown signal: {e}");
            return;
        }
    }

    shutdown.cancel();
}
