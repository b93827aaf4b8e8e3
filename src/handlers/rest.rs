/// Plain HTTP handlers: the terminal page and the health probe
use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::{Html, IntoResponse, Response},
};

use crate::{app_state::AppState, handlers::auth};

/// Browser client bundled into the binary
const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Serve the terminal page to authorized clients
pub async fn index(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    match auth::authorize(&state, &uri, &headers) {
        Ok(()) => Html(INDEX_HTML).into_response(),
        Err(rejection) => rejection,
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}
