//! GPT4All Chat API - HTTP front end for a local language model.

use clap::Parser;
use miette::IntoDiagnostic;
use std::sync::Arc;
use tracing::info;

use gpt4all_local::ModelManager;

mod config;
mod error;
mod routes;
mod startup;
mod types;

use config::{Cli, ServiceConfig};
use routes::{router, AppState};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let config = ServiceConfig::from_cli(Cli::parse());

    // Set up logging
    let filter = if config.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Starting GPT4All API server...");

    let manager = Arc::new(ModelManager::new(config.model.clone()));
    let preload = startup::spawn_preload(Arc::clone(&manager));

    let addr = config.bind_addr().into_diagnostic()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| miette::miette!("Failed to bind {}: {}", addr, e))?;
    info!(%addr, "listening");

    axum::serve(listener, router(AppState::new(Arc::clone(&manager))))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    // Dropping the last handle stops the llama-server child.
    preload.abort();
    let _ = preload.await;
    drop(manager);
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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
