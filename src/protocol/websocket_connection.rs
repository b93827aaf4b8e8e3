/// WebSocket implementation of the connection traits
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, trace};

use crate::protocol::{ConnectionError, ConnectionResult, ControlMessage, ControlSource, FrameSink, encode_payload};
use crate::tokenizer::Payload;

/// Split an upgraded socket into its sending and receiving halves
pub fn split_socket(socket: WebSocket) -> (WebSocketSink, WebSocketSource) {
    let (sink, stream) = socket.split();
    (WebSocketSink { sink }, WebSocketSource { stream })
}

/// Sending half of a WebSocket
pub struct WebSocketSink {
    sink: SplitSink<WebSocket, Message>,
}

impl std::fmt::Debug for WebSocketSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSink").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl FrameSink for WebSocketSink {
    async fn send_terminal(&mut self, data: &[u8]) -> ConnectionResult<()> {
        trace!("Sending {} terminal bytes to client", data.len());
        self.sink
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| ConnectionError::WebSocket(e.to_string()))
    }

    async fn send_payload(&mut self, payload: &Payload) -> ConnectionResult<()> {
        let frame = encode_payload(payload)?;
        trace!("Sending payload frame of {} bytes to client", frame.len());
        self.sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| ConnectionError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        // 客户端可能已经关闭，关闭帧发送失败不影响后续释放
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            debug!("WebSocket close frame not sent: {}", e);
        }
        self.sink
            .close()
            .await
            .map_err(|e| ConnectionError::WebSocket(e.to_string()))
    }
}

/// Receiving half of a WebSocket
pub struct WebSocketSource {
    stream: SplitStream<WebSocket>,
}

impl std::fmt::Debug for WebSocketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSource").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ControlSource for WebSocketSource {
    async fn receive(&mut self) -> Option<ConnectionResult<ControlMessage>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Binary(bin)) => bin,
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => {
                    debug!("WebSocket received close message");
                    return None;
                }
                Err(e) => return Some(Err(ConnectionError::WebSocket(e.to_string()))),
            };

            match ControlMessage::parse(&frame) {
                Ok(message) if message.is_noop() => {
                    debug!("Ignoring no-op control message: {:?}", message);
                }
                Ok(message) => return Some(Ok(message)),
                Err(e) => debug!("Skipping malformed control message ({} bytes): {}", frame.len(), e),
            }
        }
    }
}
