/// Per-connection session bookkeeping
use std::fmt;

use tracing::info;
use uuid::Uuid;

/// How a session came to an end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The hosted process exited and its output was drained
    ProcessExited,
    /// The browser disconnected
    ClientClosed,
    /// An I/O error on either side
    Error(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ProcessExited => write!(f, "process exited"),
            SessionEnd::ClientClosed => write!(f, "client closed"),
            SessionEnd::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Totals reported once a session has been torn down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: Uuid,
    pub end: SessionEnd,
    pub exit_code: Option<u32>,
    /// Raw bytes read from the PTY, side-channel spans included
    pub bytes_from_pty: u64,
    /// Input bytes delivered to the PTY
    pub bytes_to_pty: u64,
    pub payloads_forwarded: u64,
    pub payloads_dropped: u64,
}

impl SessionSummary {
    pub fn log(&self) {
        info!(
            session = %self.id,
            end = %self.end,
            exit_code = ?self.exit_code,
            bytes_from_pty = self.bytes_from_pty,
            bytes_to_pty = self.bytes_to_pty,
            payloads_forwarded = self.payloads_forwarded,
            payloads_dropped = self.payloads_dropped,
            "Terminal session finished"
        );
    }
}
