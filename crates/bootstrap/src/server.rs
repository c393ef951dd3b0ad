//! Serving gateway: router, runtime and graceful shutdown.

use std::future::Future;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::handlers;
use crate::middleware::{enforce_allowed_hosts, AllowedHosts};
use crate::state::AppState;

/// Build the gateway router.
///
/// Collected static assets are mounted under the configured prefix when
/// `STATIC_ROOT` is set.
pub fn build_router(state: AppState) -> Router {
    let gateway = &state.settings.gateway;
    let allowed = Arc::new(AllowedHosts::new(gateway.allowed_hosts()));
    let static_prefix = gateway.static_prefix();
    let static_root = state.settings.assets.root.clone();

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health))
        .route("/api/schema", get(handlers::schema::list_applied))
        .with_state(state);

    if let Some(root) = static_root {
        router = router.nest_service(&static_prefix, ServeDir::new(root));
    }

    router
        .layer(middleware::from_fn_with_state(allowed, enforce_allowed_hosts))
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Build the tokio runtime the whole process runs on.
///
/// Multi-thread with `worker_threads()` workers when threads are enabled,
/// current-thread otherwise.
pub fn build_runtime(config: &GatewayConfig) -> std::io::Result<Runtime> {
    if config.enable_threads {
        Builder::new_multi_thread()
            .worker_threads(config.worker_threads())
            .thread_name("recipe-worker")
            .enable_all()
            .build()
    } else {
        Builder::new_current_thread().enable_all().build()
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
