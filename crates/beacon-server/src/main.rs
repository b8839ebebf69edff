//! beacon - Alertmanager webhook receiver.
//!
//! Loads destination and team configuration, then serves the webhook
//! endpoint until interrupted.

use std::sync::Arc;

use beacon_alerts::DestinationFactory;
use beacon_server::telemetry::init_tracing;
use beacon_server::{build_state, BeaconServer, ServerConfig};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(&config.log_level, config.log_format)?;

    info!(
        listen_addr = %config.listen_addr,
        destinations_config = %config.destinations_config.display(),
        teams_config = %config.teams_config.display(),
        "starting beacon"
    );

    let state = match build_state(&config, &DestinationFactory::new()) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    let server = BeaconServer::new(Arc::new(state));
    server
        .serve_with_shutdown(config.listen_addr, config.shutdown_timeout(), shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}
