pub mod handler;
pub mod types;

pub use self::types::HttpRequestContext;

use crate::engine::ScopeRouter;
use crate::stats::VerifierStats;
use anyhow::Result;
use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerState {
    pub scopes: ScopeRouter,
    pub stats: Arc<VerifierStats>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/verify", get(handler::verify))
        .route("/api/stats", get(handler::get_stats))
        .with_state(state)
}

/// Serves access checks on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<ServerState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}
