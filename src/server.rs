use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::agent::Agent;
use crate::api::{self, state::AppState};
use crate::config::Config;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Run the agent (scheduler + local API) until SIGINT/SIGTERM
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);

    let agent = Arc::new(Agent::from_config(&config)?);
    agent.start();

    let app = api::router(AppState::new(agent.clone()));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "mediasync agent listening");

    let shutdown = agent.shutdown_token().clone();
    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await;

    agent.shutdown().await;
    served?;

    Ok(())
}

/// Run one sync and report the outcome
pub async fn sync_once(config: Config) -> Result<(), AnyError> {
    let agent = Agent::from_config(&config)?;

    let token = agent.shutdown_token().clone();
    let interrupt = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        interrupt.cancel();
    });

    match agent.sync.trigger_sync(&token).await {
        Ok(report) => {
            info!(
                downloaded = report.downloaded,
                up_to_date = report.up_to_date,
                invalid = report.invalid,
                removed = report.removed,
                "Sync finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Sync failed");
            Err(e.into())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
