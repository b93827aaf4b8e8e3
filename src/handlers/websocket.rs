use axum::{
    extract::State,
    extract::ws::{WebSocket, WebSocketUpgrade},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{app_state::AppState, handlers::auth, protocol::split_socket, service::handle_terminal_session};

/// Authorize, then upgrade `/ws` into a terminal session
pub async fn websocket_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = auth::authorize(&state, &uri, &headers) {
        return rejection;
    }
    if state.config.enforce_origin && !auth::is_origin_allowed(&headers, &state.config.allowed_origins) {
        warn!("Rejected WebSocket upgrade from disallowed origin {:?}", headers.get("origin"));
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    match ws {
        Some(ws) => ws.on_upgrade(|socket| handle_socket(socket, state)),
        None => (StatusCode::UPGRADE_REQUIRED, "websocket upgrade required").into_response(),
    }
}

pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, source) = split_socket(socket);

    // Use the shared session handler to handle this connection
    handle_terminal_session(sink, source, state).await;
}
