//! Hand-off to the serving gateway.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::{Stage, StartupContext, Step};
use crate::error::{SequencerError, SequencerResult};
use crate::server::{build_router, serve, shutdown_signal};
use crate::state::AppState;

type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Step 4: bind the gateway socket and serve until shutdown.
#[derive(Default)]
pub struct Serve {
    shutdown: Option<ShutdownFuture>,
    bound: Option<oneshot::Sender<SocketAddr>>,
}

impl Serve {
    /// Serve until Ctrl+C or SIGTERM.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve until `shutdown` completes instead of waiting for a signal.
    pub fn with_shutdown(mut self, shutdown: impl Future<Output = ()> + Send + 'static) -> Self {
        self.shutdown = Some(Box::pin(shutdown));
        self
    }

    /// Report the bound address once the socket is listening.
    pub fn notify_bound(mut self, tx: oneshot::Sender<SocketAddr>) -> Self {
        self.bound = Some(tx);
        self
    }
}

#[async_trait]
impl Step for Serve {
    fn name(&self) -> &'static str {
        "serve"
    }

    fn stage(&self) -> Stage {
        Stage::Serving
    }

    async fn run(self: Box<Self>, ctx: &mut StartupContext) -> SequencerResult<()> {
        let pool = ctx.pool()?.clone();
        let settings = ctx.settings.clone();
        let address = settings.gateway.bind_address();

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| SequencerError::Serve(format!("cannot bind {}: {}", address, e)))?;
        let local = listener
            .local_addr()
            .map_err(|e| SequencerError::Serve(e.to_string()))?;

        tracing::info!(
            address = %local,
            worker_threads = settings.gateway.worker_threads(),
            enable_threads = settings.gateway.enable_threads,
            "Server listening"
        );

        let Serve { shutdown, bound } = *self;
        if let Some(tx) = bound {
            let _ = tx.send(local);
        }
        let shutdown = shutdown.unwrap_or_else(|| Box::pin(shutdown_signal()));

        let router = build_router(AppState::new(pool, settings));
        serve(listener, router, shutdown)
            .await
            .map_err(|e| SequencerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
