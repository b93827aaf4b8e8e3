/// Channel-backed connection halves for exercising the bridge without a socket
use tokio::sync::mpsc;

use crate::protocol::{ConnectionError, ConnectionResult, ControlMessage, ControlSource, FrameSink};
use crate::tokenizer::Payload;

fn closed() -> ConnectionError {
    std::io::Error::from(std::io::ErrorKind::BrokenPipe).into()
}

/// What a [`ChannelSink`] was asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentFrame {
    Terminal(Vec<u8>),
    Payload(String),
    Closed,
}

/// Records every outbound frame on a channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SentFrame>,
    fail_sends: bool,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail_sends: false }, rx)
    }

    /// A sink whose every send fails, as if the client vanished
    pub fn broken() -> (Self, mpsc::UnboundedReceiver<SentFrame>) {
        let (mut sink, rx) = Self::new();
        sink.fail_sends = true;
        (sink, rx)
    }

    fn record(&self, frame: SentFrame) -> ConnectionResult<()> {
        if self.fail_sends {
            return Err(closed());
        }
        self.tx.send(frame).map_err(|_| closed())
    }
}

#[async_trait::async_trait]
impl FrameSink for ChannelSink {
    async fn send_terminal(&mut self, data: &[u8]) -> ConnectionResult<()> {
        self.record(SentFrame::Terminal(data.to_vec()))
    }

    async fn send_payload(&mut self, payload: &Payload) -> ConnectionResult<()> {
        self.record(SentFrame::Payload(payload.as_str().to_string()))
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        let _ = self.tx.send(SentFrame::Closed);
        Ok(())
    }
}

/// Yields control messages pushed by the test; dropping the sender closes it
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<ConnectionResult<ControlMessage>>,
}

impl ChannelSource {
    pub fn new() -> (mpsc::UnboundedSender<ConnectionResult<ControlMessage>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait::async_trait]
impl ControlSource for ChannelSource {
    async fn receive(&mut self) -> Option<ConnectionResult<ControlMessage>> {
        self.rx.recv().await
    }
}
