use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

// ================ 配置与错误类型 ================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyConfig {
    pub command: String,
    pub args: Vec<String>,
    pub cols: u16,
    pub rows: u16,
    pub env: Vec<(String, String)>,
    pub cwd: Option<std::path::PathBuf>,
    pub read_buffer_size: usize,
}

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),
    #[error("Process already terminated")]
    ProcessTerminated,
    #[error("Resize failed: {0}")]
    ResizeFailed(String),
    #[error("Background task error: {0}")]
    BackgroundTask(String),
    #[error("Other error: {0}")]
    Other(String),
}

// 添加From<anyhow::Error>实现
impl From<anyhow::Error> for PtyError {
    fn from(error: anyhow::Error) -> Self {
        PtyError::Other(error.to_string())
    }
}

// ================ 核心Trait定义 ================

/// Combined stdout/stderr of the hosted process, as seen on the PTY master.
/// Reaches EOF once the process is gone and the device is drained.
pub type PtyOutput = Box<dyn AsyncRead + Send + Unpin>;

/// A spawned process attached to a pseudo-terminal.
///
/// The output half and the control half are separate so that one task can
/// block on reads while another writes keystrokes and resizes.
pub struct PtySession {
    pub output: PtyOutput,
    pub control: Box<dyn PtyControl>,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("pid", &self.control.pid())
            .finish()
    }
}

/// Input side of a PTY session
#[async_trait]
pub trait PtyControl: Send {
    /// Deliver bytes to the process as if typed
    async fn write(&mut self, data: &[u8]) -> Result<(), PtyError>;

    /// 调整终端大小
    async fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// 获取进程ID（如果可用）
    fn pid(&self) -> Option<u32>;

    /// Kill the process, wait for it to exit and release the device.
    ///
    /// Calling it again returns the exit code recorded the first time.
    async fn terminate(&mut self) -> Result<Option<u32>, PtyError>;
}

/// PTY工厂Trait
#[async_trait]
pub trait PtyFactory: Send + Sync {
    /// 创建新的PTY实例
    async fn spawn(&self, config: &PtyConfig) -> Result<PtySession, PtyError>;

    /// 工厂名称
    fn name(&self) -> &'static str;
}
