use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    api_chat_handler, chat_handler, clear_handler, health_handler, history_handler,
};
use crate::manager::Manager;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/clear", post(clear_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(api_chat_handler))
        .route("/api/history", get(history_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("Server shutting down signal received");
        })
        .await?;

    Ok(())
}

/// Periodically purge idle sessions until shutdown. Returns `None` when the
/// store has no TTL, as there is nothing to sweep.
pub fn spawn_session_sweeper(
    manager: Arc<Manager>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    manager.sessions().limits().ttl?;

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = manager.purge_expired();
                    if purged > 0 {
                        tracing::debug!(
                            "Session sweep removed {} sessions, {} remain",
                            purged,
                            manager.session_count()
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Session sweeper stopped");
                    break;
                }
            }
        }
    }))
}
