//! Router, shared state and the serve loop.

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use referral_core::ReferralService;

use crate::google::OAuthFlow;
use crate::routes;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: ReferralService,
    /// `None` when no Google client is configured
    pub oauth: Option<Arc<OAuthFlow>>,
}

impl AppState {
    pub fn new(service: ReferralService) -> Self {
        Self { service, oauth: None }
    }

    pub fn with_oauth(mut self, oauth: Arc<OAuthFlow>) -> Self {
        self.oauth = Some(oauth);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/register", post(routes::register))
        .route("/progress/:ref_id", get(routes::progress))
        .route("/public", get(routes::public_leaderboard))
        .route("/sync-now", get(routes::sync_now).post(routes::sync_now))
        .route(
            "/migrate-team-links",
            get(routes::migrate_team_links).post(routes::migrate_team_links),
        )
        .route("/daily-progress", get(routes::daily_progress))
        .route("/daily-progress/snapshot", post(routes::snapshot_now))
        .route("/auth", get(routes::auth))
        .route("/oauth2callback", get(routes::oauth2callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn run(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
}
