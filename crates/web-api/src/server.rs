use crate::handlers;
use axum::{routing::get, Router};
use contest_store::LeaderboardRepository;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Read-only HTTP surface over the leaderboard repository.
pub struct ApiServer {
    repo: Arc<LeaderboardRepository>,
}

impl ApiServer {
    #[must_use]
    pub const fn new(repo: Arc<LeaderboardRepository>) -> Self {
        Self { repo }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/data", get(handlers::get_data))
            .route("/health", get(handlers::health))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.repo.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Leaderboard API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
