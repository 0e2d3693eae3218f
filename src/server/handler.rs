use super::types::HttpRequestContext;
use super::ServerState;
use crate::engine::Outcome;
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;

pub const ORIGINAL_URI_HEADER: &str = "x-original-uri";
pub const DECISION_HEADER: &str = "x-bot-verifier";

pub async fn verify(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let path = original_path(&headers);
    let engine = state.scopes.select(path);

    let ctx = HttpRequestContext {
        peer: Some(peer.ip()),
        headers: &headers,
    };
    let decision = engine.decide(&ctx).await;

    match decision.outcome {
        Outcome::Allow => (StatusCode::OK, [(DECISION_HEADER, "allow")]).into_response(),
        Outcome::Continue => (StatusCode::OK, [(DECISION_HEADER, "continue")]).into_response(),
        Outcome::Deny => (
            StatusCode::FORBIDDEN,
            [(DECISION_HEADER, "deny")],
            "403 Forbidden",
        )
            .into_response(),
    }
}

pub async fn get_stats(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.stats.get_snapshot())
}

fn original_path(headers: &HeaderMap) -> &str {
    let uri = headers
        .get(ORIGINAL_URI_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/");
    let path = uri.split(['?', '#']).next().unwrap_or("/");
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
