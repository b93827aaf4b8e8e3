/// Application state implementation for rs_tty_host
use std::sync::Arc;

use crate::config::HostConfig;
use crate::pty::PtyFactory;

/// Application state shared by every handler.
/// Read-only after start-up; sessions keep their own state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<HostConfig>,
    /// Shared access secret resolved at start-up
    pub token: Arc<str>,
    /// Backend used to start the hosted program
    pub pty_factory: Arc<dyn PtyFactory>,
}

impl AppState {
    /// Create a new instance of AppState with configuration
    pub fn new(config: HostConfig, token: Arc<str>, pty_factory: Arc<dyn PtyFactory>) -> Self {
        Self {
            config: Arc::new(config),
            token,
            pty_factory,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("listen_addr", &self.config.listen_addr)
            .field("pty_factory", &self.pty_factory.name())
            .finish_non_exhaustive()
    }
}
