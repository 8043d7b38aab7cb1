// Transport configuration: builder, environment overrides and IPC directory
// resolution.

use std::env;
use std::ffi::{CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::Codec::Primitive::MAX_EVENT_LEN;
use crate::Core::error::{ConfigError, Result, TransportError};

pub const MAX_WORKERS: usize = 16;
pub const DEFAULT_BUFFERS: usize = 8;
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;
/// Room for the longest event plus End.
pub const MIN_BUFFER_BYTES: usize = MAX_EVENT_LEN + 1;
pub const DEFAULT_BASE_NAME: &str = "evpipe";

pub const ENV_WORKERS: &str = "EVPIPE_WORKERS";
pub const ENV_BUFFERS: &str = "EVPIPE_BUFFERS";
pub const ENV_BUFFER_BYTES: &str = "EVPIPE_BUFFER_BYTES";
pub const ENV_TIMEOUT_MS: &str = "EVPIPE_TIMEOUT_MS";
pub const ENV_SHM_DIR: &str = "EVPIPE_SHM_DIR";
pub const ENV_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    workers: usize,
    buffers: usize,
    buffer_bytes: usize,
    timestamps: bool,
    ipc_dir: Option<PathBuf>,
    base_name: String,
    liveness_timeout: Option<Duration>,
    exit_on_error: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            buffers: DEFAULT_BUFFERS,
            buffer_bytes: DEFAULT_BUFFER_BYTES, // 64KB of events per buffer
            timestamps: false,
            ipc_dir: None,
            base_name: DEFAULT_BASE_NAME.to_string(),
            liveness_timeout: None,
            exit_on_error: true,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the `EVPIPE_*` environment variables that are set.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = read_env(ENV_WORKERS)? {
            cfg.workers = v as usize;
        }
        if let Some(v) = read_env(ENV_BUFFERS)? {
            cfg.buffers = v as usize;
        }
        if let Some(v) = read_env(ENV_BUFFER_BYTES)? {
            cfg.buffer_bytes = v as usize;
        }
        if let Some(ms) = read_env(ENV_TIMEOUT_MS)? {
            cfg.liveness_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_buffers(mut self, buffers: usize) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn with_buffer_bytes(mut self, bytes: usize) -> Self {
        self.buffer_bytes = bytes;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn with_ipc_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ipc_dir = Some(dir.into());
        self
    }

    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = name.into();
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn exit_on_error(mut self, exit: bool) -> Self {
        self.exit_on_error = exit;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn buffers(&self) -> usize {
        self.buffers
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn liveness_timeout(&self) -> Option<Duration> {
        self.liveness_timeout
    }

    pub fn exits_on_error(&self) -> bool {
        self.exit_on_error
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Workers { value: self.workers });
        }
        if self.buffers < 2 || !self.buffers.is_power_of_two() {
            return Err(ConfigError::Buffers { value: self.buffers });
        }
        if self.buffer_bytes < MIN_BUFFER_BYTES {
            return Err(ConfigError::BufferBytes {
                value: self.buffer_bytes,
            });
        }
        Ok(())
    }

    /// Parent directory for IPC artifacts.
    ///
    /// Checked in order: the explicit override, `EVPIPE_SHM_DIR`,
    /// `XDG_RUNTIME_DIR`, then `/dev/shm`. The chosen directory must exist.
    pub fn ipc_base(&self) -> std::result::Result<PathBuf, ConfigError> {
        let candidate = self
            .ipc_dir
            .clone()
            .or_else(|| env_path(ENV_SHM_DIR))
            .or_else(|| env_path(ENV_RUNTIME_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHM_DIR));

        if !candidate.is_dir() {
            return Err(ConfigError::IpcDirMissing { path: candidate });
        }
        Ok(candidate)
    }

    /// Create a fresh private `evpipe-XXXXXX` directory under [`ipc_base`](Self::ipc_base).
    pub fn create_ipc_dir(&self) -> Result<PathBuf> {
        let base = self.ipc_base()?;
        let dir = make_temp_dir(&base, &self.base_name)
            .map_err(|e| TransportError::artifact("failed to create IPC directory under", &base, e))?;
        debug!(path = %dir.display(), "created IPC directory");
        Ok(dir)
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn read_env(var: &'static str) -> std::result::Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value: raw }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(raw)) => Err(ConfigError::Env {
            var,
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}

fn make_temp_dir(base: &Path, prefix: &str) -> io::Result<PathBuf> {
    let template = base.join(format!("{}-XXXXXX", prefix));
    let template = CString::new(template.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut bytes = template.into_bytes_with_nul();

    let ret = unsafe { libc::mkdtemp(bytes.as_mut_ptr() as *mut libc::c_char) };
    if ret.is_null() {
        return Err(io::Error::last_os_error());
    }

    bytes.pop(); // trailing nul
    Ok(PathBuf::from(OsStr::from_bytes(&bytes)))
}
