/// In-memory PTY backend used by tests
/// Plays back scripted output and echoes written input, like a terminal in
/// cooked mode, while recording every call for assertions.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::pty::chunk_reader;
use crate::pty::pty_trait::{PtyConfig, PtyControl, PtyError, PtyFactory, PtySession};

/// Everything a [`MemoryPtyFactory`] and its sessions observed
#[derive(Debug, Default, Clone)]
pub struct ProbeState {
    pub spawned: Vec<PtyConfig>,
    pub input: Vec<u8>,
    pub resizes: Vec<(u16, u16)>,
    pub terminations: usize,
}

/// Shared handle onto the recorded state
#[derive(Debug, Default, Clone)]
pub struct MemoryPtyProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl MemoryPtyProbe {
    pub fn snapshot(&self) -> ProbeState {
        self.inner.lock().unwrap().clone()
    }

    fn update(&self, f: impl FnOnce(&mut ProbeState)) {
        f(&mut self.inner.lock().unwrap());
    }
}

/// Factory for in-memory PTY sessions
pub struct MemoryPtyFactory {
    script: Vec<Vec<u8>>,
    exit_after_script: bool,
    fail_spawn: bool,
    stall_writes: bool,
    probe: MemoryPtyProbe,
}

impl MemoryPtyFactory {
    /// Sessions emit `script` and then keep running, echoing input
    pub fn new(script: Vec<Vec<u8>>) -> Self {
        Self {
            script,
            exit_after_script: false,
            fail_spawn: false,
            stall_writes: false,
            probe: MemoryPtyProbe::default(),
        }
    }

    /// Sessions emit `script` and then reach EOF, as if the process exited
    pub fn exiting(script: Vec<Vec<u8>>) -> Self {
        Self {
            exit_after_script: true,
            ..Self::new(script)
        }
    }

    /// Sessions emit `script`; the first write is recorded, then the output
    /// reaches EOF and the write never completes, like a process that exited
    /// with its input queue full
    pub fn stalled(script: Vec<Vec<u8>>) -> Self {
        Self {
            stall_writes: true,
            ..Self::new(script)
        }
    }

    /// Every spawn fails
    pub fn failing() -> Self {
        Self {
            fail_spawn: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn probe(&self) -> MemoryPtyProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl PtyFactory for MemoryPtyFactory {
    async fn spawn(&self, config: &PtyConfig) -> Result<PtySession, PtyError> {
        if self.fail_spawn {
            return Err(PtyError::SpawnFailed(format!("{}: not found", config.command)));
        }
        info!("MemoryPty: spawning {:?} at {}x{}", config.command, config.cols, config.rows);
        self.probe.update(|state| state.spawned.push(config.clone()));

        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &self.script {
            let _ = tx.send(Ok(chunk.clone()));
        }
        let echo = (!self.exit_after_script).then_some(tx);

        let chunks = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });

        Ok(PtySession {
            output: chunk_reader(chunks),
            control: Box::new(MemoryPtyControl {
                echo,
                probe: self.probe.clone(),
                stall_writes: self.stall_writes,
                terminated: false,
            }),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryPtyControl {
    echo: Option<mpsc::UnboundedSender<std::io::Result<Vec<u8>>>>,
    probe: MemoryPtyProbe,
    stall_writes: bool,
    terminated: bool,
}

#[async_trait]
impl PtyControl for MemoryPtyControl {
    async fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        if self.terminated {
            return Err(PtyError::ProcessTerminated);
        }
        self.probe.update(|state| state.input.extend_from_slice(data));
        if self.stall_writes {
            self.echo = None;
            std::future::pending::<()>().await;
        }
        if let Some(echo) = &self.echo {
            let _ = echo.send(Ok(data.to_vec()));
        }
        Ok(())
    }

    async fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.probe.update(|state| state.resizes.push((cols, rows)));
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    async fn terminate(&mut self) -> Result<Option<u32>, PtyError> {
        if !self.terminated {
            self.terminated = true;
            self.echo = None;
            self.probe.update(|state| state.terminations += 1);
        }
        Ok(Some(0))
    }
}
