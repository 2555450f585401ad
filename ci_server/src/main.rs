//! PushCI Server — webhook-activated build orchestrator.
//!
//! Receives GitHub push webhooks, syncs the pushed branch into a local
//! working copy, builds and tests it, reports commit statuses back to
//! GitHub and keeps a per-repository build history on disk.

mod config;
mod metrics;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use crate::services::build_service::BuildLedger;
use crate::services::command::ProcessRunner;
use crate::services::github_service::GithubStatusClient;
use crate::services::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "pushci", about = "Webhook-activated build orchestrator")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "CI_PORT", default_value = "8007")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }

    let cli = Cli::parse();
    tracing::info!("Starting PushCI Server...");

    let ci_config = config::CiConfig::from_env();
    tracing::info!(
        workspace_dir = %ci_config.workspace_dir.display(),
        ledger_dir = %ci_config.ledger_dir.display(),
        "Configuration loaded"
    );

    let ledger = Arc::new(BuildLedger::new(ci_config.ledger_dir.clone()));
    let orchestrator = Orchestrator::new(
        ci_config,
        Arc::new(ProcessRunner),
        Arc::new(GithubStatusClient::new()),
        ledger.clone(),
    );
    let app = routes::ci_router(routes::CiRouterState {
        orchestrator: Arc::new(orchestrator),
        ledger,
    });

    // Initialize metrics
    metrics::init_metrics();

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("PushCI Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
