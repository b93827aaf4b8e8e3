/// Service layer for terminal sessions
/// Size negotiation, process start-up and the relay bridge for one connection
mod bridge;
mod debug_capture;
mod error;
mod session;
mod session_handler;

// Re-export public types and functions
pub use error::ServiceError;
pub use session_handler::handle_terminal_session;
