/// Terminal session handler for processing client connections
use std::time::Duration;

use tokio::time::timeout;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::config::TerminalSize;
use crate::protocol::{ControlMessage, ControlSource, FrameSink};
use crate::pty::pty_config_for;
use crate::service::bridge::Bridge;
use crate::service::debug_capture::DebugCapture;
use crate::service::session::SessionSummary;

/// Handle one authorized client connection from size negotiation to teardown.
/// Returns `None` when no process was started.
pub async fn handle_terminal_session<S, C>(sink: S, source: C, state: AppState) -> Option<SessionSummary>
where
    S: FrameSink + 'static,
    C: ControlSource + 'static,
{
    let id = Uuid::new_v4();
    let span = info_span!("session", id = %id);
    run_session(id, sink, source, state).instrument(span).await
}

async fn run_session<S, C>(id: Uuid, mut sink: S, mut source: C, state: AppState) -> Option<SessionSummary>
where
    S: FrameSink + 'static,
    C: ControlSource + 'static,
{
    let config = &state.config;
    info!("New terminal connection");

    let Some(size) = await_initial_size(&mut source, config.resize_wait(), config.default_size).await else {
        info!("Client left before the terminal was started");
        return None;
    };

    let pty_config = pty_config_for(config, size);
    let pty = match state.pty_factory.spawn(&pty_config).await {
        Ok(pty) => pty,
        Err(e) => {
            warn!("Failed to start {:?} with {}: {}", pty_config.command, state.pty_factory.name(), e);
            let notice = format!("\r\nfailed to start terminal program: {e}\r\n");
            if let Err(e) = sink.send_terminal(notice.as_bytes()).await {
                debug!("Could not deliver spawn failure notice: {}", e);
            }
            if let Err(e) = sink.close().await {
                debug!("Closing client connection: {}", e);
            }
            return None;
        }
    };
    info!(
        "Started {:?} (pid {:?}) at {}x{}",
        pty_config.command,
        pty.control.pid(),
        size.columns,
        size.rows
    );

    let capture = match &config.debug_capture_path {
        Some(path) => DebugCapture::open(path).await,
        None => None,
    };

    let summary = Bridge {
        id,
        pty,
        sink,
        source,
        capture,
        read_buffer_size: config.read_buffer_size,
    }
    .run()
    .await;
    summary.log();
    Some(summary)
}

/// Wait up to `wait` for the client's first valid resize.
///
/// Other messages received meanwhile are discarded. Falls back to `default`
/// on timeout, and returns `None` if the client goes away first.
pub async fn await_initial_size<C: ControlSource>(
    source: &mut C,
    wait: Duration,
    default: TerminalSize,
) -> Option<TerminalSize> {
    let negotiate = async {
        loop {
            match source.receive().await {
                Some(Ok(ControlMessage::Resize { cols, rows })) => return Some(TerminalSize::new(cols, rows)),
                Some(Ok(other)) => debug!("Discarding {:?} received before the terminal started", other),
                Some(Err(e)) => {
                    debug!("Connection failed during size negotiation: {}", e);
                    return None;
                }
                None => return None,
            }
        }
    };

    match timeout(wait, negotiate).await {
        Ok(size) => size,
        Err(_) => {
            debug!(
                "No resize within {:?}, using default {}x{}",
                wait, default.columns, default.rows
            );
            Some(default)
        }
    }
}
