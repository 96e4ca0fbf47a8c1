use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_api::config::{DeliveryMode, ServerConfig};
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;
use atelier_replicate::{ImageGenerator, ReplicateClient};
use atelier_store::{JobStore, MemoryJobStore};
use atelier_worker::reconciler::Reconciler;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_api=debug,atelier_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    if config.generation.replicate_api_token.is_empty() {
        tracing::warn!(
            "REPLICATE_API_TOKEN is not set; generation attempts will fail at the provider"
        );
    }

    // --- Job store ---
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());

    // --- Replicate client ---
    let mut client = ReplicateClient::new(
        config.generation.replicate_api_url.clone(),
        config.generation.replicate_api_token.clone(),
    );
    if let Some(base) = &config.generation.webhook_base_url {
        client = client.with_webhook_base(base.clone());
    }
    let generator: Arc<dyn ImageGenerator> = Arc::new(client);

    // --- Reconciler (webhook mode only) ---
    let reconciler_cancel = tokio_util::sync::CancellationToken::new();
    let reconciler_handle = if config.generation.delivery == DeliveryMode::Webhook {
        let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&generator));
        let cancel = reconciler_cancel.clone();
        tracing::info!("Reconciler started");
        Some(tokio::spawn(reconciler.run(cancel)))
    } else {
        None
    };

    // --- App state ---
    let state = AppState {
        store,
        generator,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    if let Some(handle) = reconciler_handle {
        reconciler_cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Reconciler stopped");
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
