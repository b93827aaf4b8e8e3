/// Protocol abstraction between the terminal bridge and browser clients
mod connection;
mod messages;
mod websocket_connection;

#[cfg(test)]
pub mod testing;

pub use connection::{ConnectionError, ConnectionResult, ControlSource, FrameSink};
pub use messages::{ControlMessage, encode_payload};
pub use websocket_connection::split_socket;
