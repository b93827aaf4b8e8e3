/// Relay loops connecting one PTY session to one client connection
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use crate::protocol::{ControlMessage, ControlSource, FrameSink};
use crate::pty::{PtyControl, PtyOutput, PtySession};
use crate::service::debug_capture::DebugCapture;
use crate::service::session::{SessionEnd, SessionSummary};
use crate::service::ServiceError;
use crate::tokenizer::Tokenizer;

/// Upper bound on waiting for the hosted process to die during teardown
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a relay loop returned
#[derive(Debug)]
enum LoopEnd {
    /// The other loop finished first
    Cancelled,
    ProcessExited,
    ClientClosed,
    Failed(ServiceError),
}

/// Resources handed back by the output loop
struct OutputHalf<S> {
    output: PtyOutput,
    sink: S,
    tokenizer: Tokenizer,
    capture: Option<DebugCapture>,
    bytes: u64,
    end: LoopEnd,
}

/// Resources handed back by the input loop
struct InputHalf {
    control: Box<dyn PtyControl>,
    bytes: u64,
    end: LoopEnd,
}

/// Everything the bridge needs for one session
pub struct Bridge<S, C> {
    pub id: Uuid,
    pub pty: PtySession,
    pub sink: S,
    pub source: C,
    pub capture: Option<DebugCapture>,
    pub read_buffer_size: usize,
}

impl<S, C> Bridge<S, C>
where
    S: FrameSink + 'static,
    C: ControlSource + 'static,
{
    /// Relay until either side ends, then tear the session down once.
    pub async fn run(self) -> SessionSummary {
        let Bridge {
            id,
            pty,
            sink,
            source,
            capture,
            read_buffer_size,
        } = self;
        let PtySession { output, control } = pty;
        let cancel = CancellationToken::new();

        let output_task = tokio::spawn(
            output_loop(
                output,
                sink,
                Tokenizer::new(),
                capture,
                read_buffer_size.max(1),
                cancel.clone(),
            )
            .instrument(Span::current()),
        );
        let input_task = tokio::spawn(input_loop(control, source, cancel.clone()).instrument(Span::current()));

        let (output_half, input_half) = tokio::join!(output_task, input_task);
        teardown(id, join_half(output_half), join_half(input_half)).await
    }
}

fn join_half<T>(joined: Result<T, tokio::task::JoinError>) -> Result<T, ServiceError> {
    joined.map_err(|e| {
        error!("Relay task did not complete: {}", e);
        ServiceError::Task(e.to_string())
    })
}

async fn output_loop<S: FrameSink>(
    mut output: PtyOutput,
    mut sink: S,
    mut tokenizer: Tokenizer,
    mut capture: Option<DebugCapture>,
    buffer_size: usize,
    cancel: CancellationToken,
) -> OutputHalf<S> {
    let mut buffer = vec![0u8; buffer_size];
    let mut bytes = 0u64;

    let end = loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break LoopEnd::Cancelled,
            read = output.read(&mut buffer) => read,
        };

        let n = match read {
            Ok(0) => {
                debug!("PTY output reached EOF");
                break LoopEnd::ProcessExited;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Error reading PTY output: {}", e);
                break LoopEnd::Failed(e.into());
            }
        };
        bytes += n as u64;

        let chunk = &buffer[..n];
        if let Some(capture) = capture.as_mut() {
            capture.record(chunk).await;
        }

        let tokenized = tokenizer.feed(chunk);
        if let Err(e) = forward(&mut sink, tokenized).await {
            debug!("Client stopped accepting output: {}", e);
            break LoopEnd::Failed(e);
        }
    };

    cancel.cancel();
    OutputHalf {
        output,
        sink,
        tokenizer,
        capture,
        bytes,
        end,
    }
}

/// Terminal bytes first, then payloads, in the order the tokenizer produced them
async fn forward<S: FrameSink>(sink: &mut S, tokenized: crate::tokenizer::Tokenized) -> Result<(), ServiceError> {
    if tokenized.is_empty() {
        return Ok(());
    }
    if !tokenized.terminal.is_empty() {
        sink.send_terminal(&tokenized.terminal).await?;
    }
    for payload in &tokenized.payloads {
        debug!("Forwarding side-channel payload of {} bytes", payload.len());
        sink.send_payload(payload).await?;
    }
    Ok(())
}

async fn input_loop<C: ControlSource>(
    mut control: Box<dyn PtyControl>,
    mut source: C,
    cancel: CancellationToken,
) -> InputHalf {
    let mut bytes = 0u64;

    let end = loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break LoopEnd::Cancelled,
            message = source.receive() => message,
        };

        match message {
            None => {
                debug!("Client connection closed");
                break LoopEnd::ClientClosed;
            }
            Some(Err(e)) => {
                debug!("Client connection failed: {}", e);
                break LoopEnd::Failed(e.into());
            }
            Some(Ok(ControlMessage::Input { data })) => {
                // 子进程不读输入时写入会阻塞，需要能被取消
                let written = tokio::select! {
                    _ = cancel.cancelled() => break LoopEnd::Cancelled,
                    written = control.write(data.as_bytes()) => written,
                };
                if let Err(e) = written {
                    warn!("Failed to write to PTY: {}", e);
                    break LoopEnd::Failed(e.into());
                }
                bytes += data.len() as u64;
            }
            Some(Ok(ControlMessage::Resize { cols, rows })) => {
                // 调整大小失败不终止会话
                if let Err(e) = control.resize(cols, rows).await {
                    warn!("Failed to resize PTY to {}x{}: {}", cols, rows, e);
                }
            }
        }
    };

    cancel.cancel();
    InputHalf {
        control,
        bytes,
        end,
    }
}

/// Terminate the process, release the device, then close the socket.
async fn teardown<S: FrameSink>(
    id: Uuid,
    output_half: Result<OutputHalf<S>, ServiceError>,
    input_half: Result<InputHalf, ServiceError>,
) -> SessionSummary {
    let mut summary = SessionSummary {
        id,
        end: SessionEnd::ClientClosed,
        exit_code: None,
        bytes_from_pty: 0,
        bytes_to_pty: 0,
        payloads_forwarded: 0,
        payloads_dropped: 0,
    };

    let (output_end, output_rest) = match output_half {
        Ok(half) => {
            summary.bytes_from_pty = half.bytes;
            summary.payloads_forwarded = half.tokenizer.forwarded();
            summary.payloads_dropped = half.tokenizer.dropped();
            if half.tokenizer.is_capturing() {
                debug!("Session ended inside an unterminated side-channel span");
            }
            (half.end, Some((half.output, half.sink, half.capture)))
        }
        Err(e) => (LoopEnd::Failed(e), None),
    };
    let (input_end, control) = match input_half {
        Ok(half) => {
            summary.bytes_to_pty = half.bytes;
            (half.end, Some(half.control))
        }
        Err(e) => (LoopEnd::Failed(e), None),
    };
    summary.end = session_end(output_end, input_end);

    if let Some(mut control) = control {
        match timeout(TERMINATE_TIMEOUT, control.terminate()).await {
            Ok(Ok(code)) => summary.exit_code = code,
            Ok(Err(e)) => warn!("Failed to terminate PTY process: {}", e),
            Err(_) => warn!("PTY process did not exit within {:?}", TERMINATE_TIMEOUT),
        }
    }

    if let Some((output, mut sink, capture)) = output_rest {
        drop(output);
        if let Some(capture) = capture {
            capture.finish().await;
        }
        if let Err(e) = sink.close().await {
            debug!("Closing client connection: {}", e);
        }
    }

    info!("Session {} torn down ({})", id, summary.end);
    summary
}

/// The loop that stopped on its own decides how the session ended
fn session_end(output: LoopEnd, input: LoopEnd) -> SessionEnd {
    let decided = match (output, input) {
        (LoopEnd::Cancelled, other) => other,
        (other, _) => other,
    };
    match decided {
        LoopEnd::ProcessExited => SessionEnd::ProcessExited,
        LoopEnd::ClientClosed | LoopEnd::Cancelled => SessionEnd::ClientClosed,
        LoopEnd::Failed(e) => SessionEnd::Error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::{ChannelSink, ChannelSource, SentFrame};
    use crate::pty::{MemoryPtyFactory, PtyConfig, PtyFactory};
    use crate::tokenizer::{MARKER, TERMINATOR};
    use tokio::sync::mpsc;

    fn pty_config() -> PtyConfig {
        PtyConfig {
            command: "fake".into(),
            args: Vec::new(),
            cols: 80,
            rows: 24,
            env: Vec::new(),
            cwd: None,
            read_buffer_size: 64,
        }
    }

    fn span(body: &str) -> Vec<u8> {
        let mut bytes = MARKER.to_vec();
        bytes.extend_from_slice(body.as_bytes());
        bytes.push(TERMINATOR);
        bytes
    }

    async fn bridge_for<S: FrameSink + 'static, C: ControlSource + 'static>(
        factory: &MemoryPtyFactory,
        sink: S,
        source: C,
    ) -> Bridge<S, C> {
        Bridge {
            id: Uuid::new_v4(),
            pty: factory.spawn(&pty_config()).await.unwrap(),
            sink,
            source,
            capture: None,
            read_buffer_size: 64,
        }
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<SentFrame>) -> Vec<SentFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        frames
    }

    fn terminal_text(frames: &[SentFrame]) -> Vec<u8> {
        frames
            .iter()
            .filter_map(|frame| match frame {
                SentFrame::Terminal(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[tokio::test]
    async fn relays_terminal_bytes_and_payloads_until_process_exits() {
        let mut first = b"hello ".to_vec();
        first.extend_from_slice(&span(r#"{"root":"a"}"#)[..10]);
        let mut second = span(r#"{"root":"a"}"#)[10..].to_vec();
        second.extend_from_slice(b"world");
        second.extend_from_slice(&span("oops"));
        let factory = MemoryPtyFactory::exiting(vec![first, second]);
        let probe = factory.probe();

        let (sink, mut rx) = ChannelSink::new();
        let (_input, source) = ChannelSource::new();
        let summary = bridge_for(&factory, sink, source).await.run().await;

        let frames = drain(&mut rx).await;
        assert_eq!(
            frames,
            [
                SentFrame::Terminal(b"hello ".to_vec()),
                SentFrame::Terminal(b"world".to_vec()),
                SentFrame::Payload(r#"{"root":"a"}"#.into()),
                SentFrame::Closed,
            ]
        );
        assert_eq!(summary.end, SessionEnd::ProcessExited);
        assert_eq!(summary.payloads_forwarded, 1);
        assert_eq!(summary.payloads_dropped, 1);
        assert_eq!(probe.snapshot().terminations, 1);
    }

    #[tokio::test]
    async fn input_and_resize_reach_the_pty() {
        let factory = MemoryPtyFactory::new(vec![b"$ ".to_vec()]);
        let probe = factory.probe();
        let (sink, mut rx) = ChannelSink::new();
        let (input, source) = ChannelSource::new();
        let session = tokio::spawn(bridge_for(&factory, sink, source).await.run());

        input.send(Ok(ControlMessage::Resize { cols: 100, rows: 30 })).unwrap();
        input.send(Ok(ControlMessage::Input { data: "ls\r".into() })).unwrap();

        let mut seen = Vec::new();
        while seen != b"$ ls\r" {
            match rx.recv().await.unwrap() {
                SentFrame::Terminal(bytes) => seen.extend_from_slice(&bytes),
                other => panic!("unexpected frame {other:?}"),
            }
        }

        drop(input);
        let summary = session.await.unwrap();
        assert_eq!(summary.end, SessionEnd::ClientClosed);
        assert_eq!(summary.bytes_to_pty, 3);

        let state = probe.snapshot();
        assert_eq!(state.input, b"ls\r");
        assert_eq!(state.resizes, [(100, 30)]);
        assert_eq!(state.terminations, 1);
        assert_eq!(rx.recv().await, Some(SentFrame::Closed));
    }

    #[tokio::test]
    async fn broken_client_ends_the_session() {
        let factory = MemoryPtyFactory::new(vec![b"output".to_vec()]);
        let probe = factory.probe();
        let (sink, _rx) = ChannelSink::broken();
        let (_input, source) = ChannelSource::new();

        let summary = bridge_for(&factory, sink, source).await.run().await;
        assert!(matches!(summary.end, SessionEnd::Error(_)));
        assert_eq!(probe.snapshot().terminations, 1);
    }

    #[tokio::test]
    async fn chunking_does_not_change_what_the_client_sees() {
        let mut stream = b"a\x1b[1mb".to_vec();
        stream.extend_from_slice(&span(r#"{"k":[1,2]}"#));
        stream.extend_from_slice(b"\x1b]99c");
        stream.extend_from_slice(&span(r#"{"k":3}"#));
        stream.extend_from_slice(b"d");

        let whole = {
            let factory = MemoryPtyFactory::exiting(vec![stream.clone()]);
            let (sink, mut rx) = ChannelSink::new();
            let (_input, source) = ChannelSource::new();
            bridge_for(&factory, sink, source).await.run().await;
            drain(&mut rx).await
        };
        let split = {
            let factory = MemoryPtyFactory::exiting(stream.chunks(3).map(<[u8]>::to_vec).collect());
            let (sink, mut rx) = ChannelSink::new();
            let (_input, source) = ChannelSource::new();
            bridge_for(&factory, sink, source).await.run().await;
            drain(&mut rx).await
        };

        assert_eq!(terminal_text(&whole), b"a\x1b[1mb\x1b]99cd");
        assert_eq!(terminal_text(&split), terminal_text(&whole));
        let payloads = |frames: &[SentFrame]| {
            frames
                .iter()
                .filter(|frame| matches!(frame, SentFrame::Payload(_)))
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(payloads(&split), payloads(&whole));
        assert_eq!(payloads(&whole).len(), 2);
    }

    #[tokio::test]
    async fn blocked_input_write_does_not_hold_up_teardown() {
        let factory = MemoryPtyFactory::stalled(vec![b"busy".to_vec()]);
        let probe = factory.probe();
        let (sink, _rx) = ChannelSink::new();
        let (input, source) = ChannelSource::new();
        let bridge = bridge_for(&factory, sink, source).await;

        input.send(Ok(ControlMessage::Input { data: "typed".into() })).unwrap();
        let summary = tokio::time::timeout(std::time::Duration::from_secs(5), bridge.run())
            .await
            .expect("session stuck behind a blocked PTY write");

        assert_eq!(summary.end, SessionEnd::ProcessExited);
        assert_eq!(summary.bytes_to_pty, 0);
        let state = probe.snapshot();
        assert_eq!(state.input, b"typed");
        assert_eq!(state.terminations, 1);
    }

    #[test]
    fn first_loop_to_stop_decides_the_outcome() {
        assert_eq!(session_end(LoopEnd::Cancelled, LoopEnd::ClientClosed), SessionEnd::ClientClosed);
        assert_eq!(session_end(LoopEnd::ProcessExited, LoopEnd::Cancelled), SessionEnd::ProcessExited);
        assert!(matches!(
            session_end(
                LoopEnd::Cancelled,
                LoopEnd::Failed(ServiceError::Task("boom".into()))
            ),
            SessionEnd::Error(_)
        ));
    }
}
