/// PTY (Pseudo Terminal) handling for rs_tty_host
/// This module provides a trait abstraction for PTY backends with a focus on
/// pure async operations
mod portable_pty_impl;
mod pty_trait;

#[cfg(test)]
mod memory_pty;

use std::io::Cursor;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio_util::io::StreamReader;

use crate::config::{HostConfig, TerminalSize};

// Export all public types and traits
pub use portable_pty_impl::PortablePtyFactory;
pub use pty_trait::*;

#[cfg(test)]
pub use memory_pty::{MemoryPtyFactory, MemoryPtyProbe};

/// Create the production PTY backend
pub fn default_factory() -> Arc<dyn PtyFactory> {
    Arc::new(PortablePtyFactory)
}

/// Build the PTY configuration for one session from the application config
pub fn pty_config_for(config: &HostConfig, size: TerminalSize) -> PtyConfig {
    let command = config.command.first().cloned().unwrap_or_default();
    let args = config.command.iter().skip(1).cloned().collect();

    // 默认环境变量，可被配置覆盖
    let mut env = vec![
        ("TERM".to_string(), "xterm-256color".to_string()),
        ("COLORTERM".to_string(), "truecolor".to_string()),
    ];
    for (key, value) in config.environment_pairs() {
        match env.iter().position(|(k, _)| *k == key) {
            Some(index) => env[index] = (key, value),
            None => env.push((key, value)),
        }
    }

    PtyConfig {
        command,
        args,
        cols: size.columns,
        rows: size.rows,
        env,
        // 未配置时继承宿主进程的工作目录
        cwd: config
            .working_directory
            .clone()
            .or_else(|| std::env::current_dir().ok()),
        read_buffer_size: config.read_buffer_size,
    }
}

/// Adapt a stream of output chunks into the [`PtyOutput`] reader
pub(crate) fn chunk_reader<S>(chunks: S) -> PtyOutput
where
    S: Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static,
{
    let buffers = chunks.map(|chunk| chunk.map(Cursor::new));
    Box::new(StreamReader::new(Box::pin(buffers)))
}
