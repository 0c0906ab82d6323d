pub mod accumulator;
pub mod api;
pub mod auth;
pub mod config;
pub mod metrics_defs;
pub mod pagination;
pub mod types;
pub mod upstream;

#[cfg(test)]
mod testutils;

use config::ValidationError;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use upstream::GitHubClient;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
    #[error("could not build upstream client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    config.validate()?;

    let source = Arc::new(GitHubClient::new(&config.upstream)?);
    let state = api::AppState::new(source, &config);

    let listener = TcpListener::bind(config.listener.addr()).await?;
    let admin_listener = TcpListener::bind(config.admin_listener.addr()).await?;

    let ready = Arc::new(AtomicBool::new(false));
    let admin_ready = ready.clone();
    let admin = AdminService::new(move || admin_ready.load(Ordering::Relaxed));

    tracing::info!(
        listener = %listener.local_addr()?,
        admin_listener = %admin_listener.local_addr()?,
        upstream = config.upstream.url.as_str(),
        "gateway started"
    );
    ready.store(true, Ordering::Relaxed);

    // The admin listener has no shutdown of its own and stops with the API.
    tokio::select! {
        result = api::serve(listener, state, shutdown_signal(ready)) => result?,
        result = run_http_service(admin_listener, admin) => result?,
    }

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal(ready: Arc<AtomicBool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for ctrl-c");
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
                tracing::error!(error = %e, "could not listen for SIGTERM");
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

    ready.store(false, Ordering::Relaxed);
    tracing::info!("shutting down");
}
