//! HTTP API server: audio serving, session control, health

pub mod audio;
pub mod health;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::session::{SessionCommand, SessionState};
use crate::store::BlobRepo;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Blob repository backing the audio endpoint
    pub blobs: BlobRepo,
    /// Session state read by the UI poll endpoint
    pub session: Arc<SessionState>,
    /// Command channel into the session loop
    pub commands: mpsc::Sender<SessionCommand>,
}

/// Build the full router
#[must_use]
pub fn build_router(state: Arc<ApiState>, static_dir: Option<&PathBuf>) -> Router {
    let mut router = Router::new()
        .merge(audio::router(state.clone()))
        .merge(health::router())
        .nest("/api/session", session::router(state));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
        tracing::info!(path = %dir.display(), "serving static files");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Create a new API server
    #[must_use]
    pub fn new(state: ApiState, port: u16, static_dir: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(state),
            port,
            static_dir,
        }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or serve
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        let router = build_router(self.state, self.static_dir.as_ref());
        axum::serve(listener, router)
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
