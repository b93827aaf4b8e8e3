/// Configuration data structures for rs_tty_host
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Host configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HostConfig {
    /// Listen address for the HTTP/WebSocket server
    pub listen_addr: String,

    /// Shared access secret; generated per run when unset
    pub token: Option<String>,

    /// Hosted program followed by its arguments
    pub command: Vec<String>,

    /// Working directory for the hosted program
    pub working_directory: Option<PathBuf>,

    /// Extra environment variables for the hosted program, as `KEY=VALUE`
    pub environment: Vec<String>,

    /// Geometry used when the client never reports its size
    pub default_size: TerminalSize,

    /// How long to wait for the client's first resize, in milliseconds
    pub resize_wait_ms: u64,

    /// PTY read buffer size in bytes
    pub read_buffer_size: usize,

    /// Require a same-origin or allow-listed Origin header on /ws
    pub enforce_origin: bool,

    /// Extra origins accepted when `enforce_origin` is set
    pub allowed_origins: Vec<String>,

    /// Append every raw PTY chunk to this file
    pub debug_capture_path: Option<PathBuf>,

    pub logging: LoggingConfig,
}

/// Terminal size configuration
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    /// Number of columns
    pub columns: u16,

    /// Number of rows
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self {
            columns: 120,
            rows: 36,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,

    /// Also write daily rolling log files into this directory
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".to_string(),
            token: None,
            command: vec!["bash".to_string()],
            working_directory: None,
            environment: Vec::new(),
            default_size: TerminalSize::default(),
            resize_wait_ms: 3000,
            read_buffer_size: 8192,
            enforce_origin: false,
            allowed_origins: Vec::new(),
            debug_capture_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl HostConfig {
    /// Reject configurations that cannot start a session
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.command.first() {
            Some(program) if !program.trim().is_empty() => {}
            _ => return Err(ConfigError::Invalid("command must name a program".into())),
        }
        if self.default_size.columns == 0 || self.default_size.rows == 0 {
            return Err(ConfigError::Invalid(
                "default_size needs non-zero columns and rows".into(),
            ));
        }
        if let Some(entry) = self.environment.iter().find(|e| parse_env_entry(e).is_none()) {
            return Err(ConfigError::Invalid(format!(
                "environment entry {entry:?} is not KEY=VALUE"
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid("read_buffer_size must be positive".into()));
        }
        Ok(())
    }

    pub fn resize_wait(&self) -> Duration {
        Duration::from_millis(self.resize_wait_ms)
    }

    /// Configured environment as key/value pairs
    pub fn environment_pairs(&self) -> Vec<(String, String)> {
        self.environment
            .iter()
            .filter_map(|entry| parse_env_entry(entry))
            .collect()
    }
}

fn parse_env_entry(entry: &str) -> Option<(String, String)> {
    let (key, value) = entry.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}
