/// Transport abstraction between the bridge and the browser client
use thiserror::Error;

use crate::protocol::ControlMessage;
use crate::tokenizer::Payload;

/// 连接错误类型
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket 错误
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 消息序列化错误
    #[error("Message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 连接结果类型
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Outbound half of a client connection. Owned by the output loop only.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Forward raw terminal bytes as a binary frame
    async fn send_terminal(&mut self, data: &[u8]) -> ConnectionResult<()>;

    /// Forward one extracted payload as a text frame
    async fn send_payload(&mut self, payload: &Payload) -> ConnectionResult<()>;

    /// Close the connection
    async fn close(&mut self) -> ConnectionResult<()>;
}

/// Inbound half of a client connection
#[async_trait::async_trait]
pub trait ControlSource: Send {
    /// Receive the next actionable control message.
    /// Malformed and no-op messages are skipped. Returns None once the client is gone.
    async fn receive(&mut self) -> Option<ConnectionResult<ControlMessage>>;
}
