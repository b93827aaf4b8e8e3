/// Error types for the service layer
use thiserror::Error;

/// Service layer error type
#[derive(Error, Debug)]
pub enum ServiceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PTY error
    #[error("PTY error: {0}")]
    Pty(#[from] crate::pty::PtyError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] crate::protocol::ConnectionError),

    /// Relay task failed to complete
    #[error("Task error: {0}")]
    Task(String),
}
