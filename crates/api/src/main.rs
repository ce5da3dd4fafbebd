use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ansiweb_api::config::ServerConfig;
use ansiweb_api::router::build_app_router;
use ansiweb_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ansiweb_api=debug,ansiweb_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        host = %config.host,
        port = %config.port,
        jobs_dir = %config.jobs.jobs_dir.display(),
        engine = %config.jobs.engine.program_name(),
        max_concurrent_jobs = config.jobs.max_concurrent_jobs,
        "Loaded server configuration",
    );

    // --- App state ---
    let state = AppState::new(config.clone());

    // --- Orphaned jobs from a previous run ---
    match state
        .jobs
        .registry()
        .reconcile_orphans(config.orphan_policy)
        .await
    {
        Ok(orphans) if !orphans.is_empty() => {
            tracing::warn!(count = orphans.len(), "Reconciled orphaned jobs");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to reconcile orphaned jobs");
        }
    }

    let jobs = std::sync::Arc::clone(&state.jobs);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    let running = jobs.supervisor().running_count().await;
    tracing::info!(running, "Server stopped accepting connections, cancelling jobs");

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, jobs.supervisor().shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Timed out waiting for jobs to stop",
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
