use crate::pty::pty_trait::{PtyConfig, PtyControl, PtyError, PtyFactory, PtySession};
use crate::pty::chunk_reader;
use async_trait::async_trait;
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, trace, warn};

/// 读取线程与异步端之间的通道深度，提供背压控制
const READ_QUEUE_DEPTH: usize = 64;

/// Errno returned by a Linux PTY master once the slave side has gone away
#[cfg(unix)]
const EIO: i32 = 5;

/// Control half of a PTY backed by the portable-pty crate
pub struct PortablePtyControl {
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    pid: Option<u32>,
    cols: u16,
    rows: u16,
    terminated: bool,
    exit_code: Option<u32>,
}

impl PortablePtyControl {
    fn spawn(config: &PtyConfig) -> Result<PtySession, PtyError> {
        info!(
            "PortablePty: Creating PTY with command: {:?}, args: {:?}, size: {}x{}",
            config.command, config.args, config.cols, config.rows
        );

        let pty_system = portable_pty::native_pty_system();

        // 这是阻塞操作，但只在初始化时执行一次
        let pair = pty_system.openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })?;

        let mut cmd = CommandBuilder::new(&config.command);
        cmd.args(&config.args);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("{}: {}", config.command, e)))?;
        // the child holds its own copy of the slave; ours would keep the master from seeing EOF
        drop(pair.slave);

        let pid = child.process_id();
        let reader = pair.master.try_clone_reader()?;
        let writer = pair.master.take_writer()?;

        let control = Self {
            master: Some(pair.master),
            writer: Some(Arc::new(Mutex::new(writer))),
            child: Arc::new(Mutex::new(child)),
            pid,
            cols: config.cols,
            rows: config.rows,
            terminated: false,
            exit_code: None,
        };

        let (data_tx, data_rx) = mpsc::channel(READ_QUEUE_DEPTH);
        let buffer_size = config.read_buffer_size.max(1);
        thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || read_loop(reader, data_tx, buffer_size))?;

        info!("PortablePty: spawned process {:?}", pid);

        let chunks = futures_util::stream::unfold(data_rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });

        Ok(PtySession {
            output: chunk_reader(chunks),
            control: Box::new(control),
        })
    }
}

/// Blocking read loop run on a dedicated thread
fn read_loop(
    mut reader: Box<dyn Read + Send>,
    data_tx: mpsc::Sender<std::io::Result<Vec<u8>>>,
    buffer_size: usize,
) {
    let mut buffer = vec![0u8; buffer_size];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("PTY EOF reached, stopping background reader");
                break;
            }
            Ok(n) => {
                trace!("PTY background reader: read {} bytes", n);
                if data_tx.blocking_send(Ok(buffer[..n].to_vec())).is_err() {
                    debug!("PTY background reader: receiver dropped, stopping");
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            #[cfg(unix)]
            Err(e) if e.raw_os_error() == Some(EIO) => {
                debug!("PTY slave closed, stopping background reader");
                break;
            }
            Err(e) => {
                error!("Error reading from PTY: {}", e);
                let _ = data_tx.blocking_send(Err(e));
                break;
            }
        }
    }
}

#[async_trait]
impl PtyControl for PortablePtyControl {
    async fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        let writer = self.writer.clone().ok_or(PtyError::ProcessTerminated)?;
        let data = data.to_vec();
        let len = data.len();

        // 写入可能在子进程不读取输入时阻塞，放到阻塞线程池中执行
        spawn_blocking(move || -> std::io::Result<()> {
            let mut writer = writer
                .lock()
                .map_err(|_| std::io::Error::other("PTY writer lock poisoned"))?;
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(|e| PtyError::BackgroundTask(e.to_string()))??;

        trace!("PTY write: {} bytes", len);
        Ok(())
    }

    async fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let master = self.master.as_ref().ok_or(PtyError::ProcessTerminated)?;
        if (cols, rows) == (self.cols, self.rows) {
            return Ok(());
        }

        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))?;

        debug!("PortablePty: Resized PTY to {}x{}", cols, rows);
        self.cols = cols;
        self.rows = rows;
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn terminate(&mut self) -> Result<Option<u32>, PtyError> {
        if self.terminated {
            return Ok(self.exit_code);
        }
        self.terminated = true;
        self.writer = None;

        let child = self.child.clone();
        let waited = spawn_blocking(move || -> std::io::Result<portable_pty::ExitStatus> {
            let mut child = child
                .lock()
                .map_err(|_| std::io::Error::other("PTY child lock poisoned"))?;
            if child.try_wait()?.is_none() {
                if let Err(e) = child.kill() {
                    // the process may have exited between try_wait and kill
                    debug!("PortablePty: kill failed: {}", e);
                }
            }
            child.wait()
        })
        .await
        .map_err(|e| PtyError::BackgroundTask(e.to_string()));

        // 释放终端设备
        self.master = None;

        let status = waited??;
        self.exit_code = Some(status.exit_code());
        info!(
            "PortablePty: process {:?} exited with code {}",
            self.pid,
            status.exit_code()
        );
        Ok(self.exit_code)
    }
}

impl Drop for PortablePtyControl {
    fn drop(&mut self) {
        if self.terminated {
            return;
        }
        // 会话异常结束时兜底，避免遗留子进程
        match self.child.lock() {
            Ok(mut child) => {
                if let Ok(None) = child.try_wait() {
                    warn!("PortablePty: killing process {:?} left running", self.pid);
                    let _ = child.kill();
                }
            }
            Err(_) => error!("PortablePty: child lock poisoned during drop"),
        }
    }
}

// ================ 工厂实现 ================

/// 基于 portable-pty 的 PTY 工厂
#[derive(Debug, Default, Clone, Copy)]
pub struct PortablePtyFactory;

#[async_trait]
impl PtyFactory for PortablePtyFactory {
    async fn spawn(&self, config: &PtyConfig) -> Result<PtySession, PtyError> {
        // 使用 spawn_blocking 确保它不会阻塞异步运行时
        let config = config.clone();
        spawn_blocking(move || PortablePtyControl::spawn(&config))
            .await
            .map_err(|e| PtyError::BackgroundTask(format!("Failed to create PTY: {e}")))?
    }

    fn name(&self) -> &'static str {
        "portable-pty"
    }
}
