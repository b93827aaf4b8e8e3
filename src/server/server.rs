/// Server implementation for rs_tty_host
use axum::{Router, http::Method, routing::get};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::{app_state::AppState, handlers};

/// Build the application router with routes
pub fn build_router(state: AppState) -> Router {
    // 令牌控制访问，允许任意来源的浏览器客户端
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::rest::index))
        .route("/healthz", get(handlers::rest::health_check))
        .route("/ws", get(handlers::websocket::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server with graceful shutdown support
pub async fn run_server_with_graceful_shutdown(router: Router, listener: TcpListener) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    info!("Server running on http://{}", addr);
    info!("WebSocket endpoint available at ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal, initiating graceful shutdown..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

/// Pick the access secret: explicit value first, then configuration, else a fresh random one.
/// The flag reports whether it was generated.
pub fn resolve_token(explicit: Option<&str>, configured: Option<&str>) -> (String, bool) {
    let provided = [explicit, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|token| !token.is_empty());
    match provided {
        Some(token) => (token.to_string(), false),
        None => (Uuid::new_v4().simple().to_string(), true),
    }
}

/// Host and port a browser on this machine should use to reach `addr`
pub fn advertised_host(addr: &str) -> String {
    let addr = addr.trim();
    if addr.is_empty() {
        return "127.0.0.1".to_string();
    }

    match split_host_port(addr) {
        Some((host, port)) => {
            let host = match host {
                "" | "0.0.0.0" | "::" => "127.0.0.1",
                other => other,
            };
            if host.contains(':') {
                format!("[{host}]:{port}")
            } else {
                format!("{host}:{port}")
            }
        }
        None if !addr.contains(':') => format!("127.0.0.1:{addr}"),
        None => addr.to_string(),
    }
}

/// URL printed at start-up for opening the terminal page
pub fn access_url(addr: &str, token: &str) -> String {
    format!("http://{}/?token={}", advertised_host(addr), urlencoding::encode(token))
}

fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, port) = rest.split_once("]:")?;
        return Some((host, port));
    }
    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') {
        return None;
    }
    Some((host, port))
}
