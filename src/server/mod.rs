/// Server management for rs_tty_host
mod server;

pub use server::{access_url, build_router, resolve_token, run_server_with_graceful_shutdown};
