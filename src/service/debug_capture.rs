/// Raw PTY output capture for diagnosing rendering problems
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Appends every PTY chunk to a file as `--- chunk N bytes ---` followed by the escaped bytes.
/// The first write failure disables the capture; the session carries on.
#[derive(Debug)]
pub struct DebugCapture {
    path: PathBuf,
    file: Option<File>,
}

impl DebugCapture {
    /// Open `path` for appending, or return `None` with a warning
    pub async fn open(path: &Path) -> Option<Self> {
        match OpenOptions::new().create(true).append(true).open(path).await {
            Ok(file) => {
                info!("Capturing raw PTY output to {}", path.display());
                Some(Self {
                    path: path.to_path_buf(),
                    file: Some(file),
                })
            }
            Err(e) => {
                warn!("Cannot open debug capture file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn record(&mut self, chunk: &[u8]) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let entry = format_entry(chunk);
        if let Err(e) = file.write_all(entry.as_bytes()).await {
            warn!("Debug capture to {} disabled: {}", self.path.display(), e);
            self.file = None;
        }
    }

    pub async fn finish(mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush().await {
                warn!("Failed to flush debug capture {}: {}", self.path.display(), e);
            }
        }
    }
}

fn format_entry(chunk: &[u8]) -> String {
    format!("--- chunk {} bytes ---\n\"{}\"\n", chunk.len(), chunk.escape_ascii())
}
