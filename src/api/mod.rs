//! HTTP control API for `BrewBot`

pub mod dialogue;
pub mod health;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::dialogue::DialogueHandle;

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Control handle of the running dialogue session
    pub handle: DialogueHandle,

    /// Whether microphone and speaker adapters are in use
    pub voice_enabled: bool,
}

/// Control API server
#[derive(Debug)]
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(handle: DialogueHandle, voice_enabled: bool, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState {
                handle,
                voice_enabled,
            }),
            port,
        }
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .nest("/api", dialogue::router(Arc::clone(&self.state)))
            .merge(health::router())
            .merge(health::ready_router(Arc::clone(&self.state)))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Spawn the API server as a background task
    ///
    /// A failure is logged as soon as it happens and also returned through
    /// the handle.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move {
            self.run()
                .await
                .inspect_err(|e| tracing::error!(error = %e, "API server stopped"))
        })
    }
}
