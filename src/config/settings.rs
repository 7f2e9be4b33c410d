use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::ToolPaths;
use crate::cli::{Args, BackendChoice};
use crate::error::ConfigError;

use super::defaults::*;

/// Runtime settings shared by the CLI and the job service
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub target_mb: f64,
    pub backend: BackendChoice,
    /// Suppress progress output (CLI only)
    pub quiet: bool,

    // Explicit tool locations; `None` means probe the environment
    pub ghostscript: Option<PathBuf>,
    pub qpdf: Option<PathBuf>,

    // Job service
    pub workers: usize,
    pub poll_interval: Duration,
    pub max_upload_bytes: u64,
    /// `None` keeps finished jobs for the life of the process
    pub registry_ttl: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_mb: DEFAULT_TARGET_MB,
            backend: BackendChoice::Auto,
            quiet: false,
            ghostscript: None,
            qpdf: None,
            workers: DEFAULT_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            registry_ttl: Some(DEFAULT_REGISTRY_TTL),
        }
    }
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_args(args: &Args) -> Self {
        Self::default().with_args(args)
    }

    /// Overlay CLI arguments. Apply after `with_env` so an explicit flag
    /// wins over the environment.
    pub fn with_args(mut self, args: &Args) -> Self {
        if let Some(target_mb) = args.target_mb {
            self.target_mb = target_mb;
        }
        self.backend = args.backend;
        self.quiet = args.quiet;
        self
    }

    /// Overlay values from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup (used by `with_env` and tests)
    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_TARGET_MB) {
            self.target_mb = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_TARGET_MB.to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            self.workers = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_WORKERS.to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_GHOSTSCRIPT).filter(|v| !v.is_empty()) {
            self.ghostscript = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_QPDF).filter(|v| !v.is_empty()) {
            self.qpdf = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_mb.is_finite() || self.target_mb <= 0.0 {
            return Err(ConfigError::InvalidTarget(self.target_mb));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        Ok(())
    }

    /// Configured tool paths; unset entries are probed when a run starts
    pub fn tool_overrides(&self) -> ToolPaths {
        ToolPaths {
            ghostscript: self.ghostscript.clone(),
            qpdf: self.qpdf.clone(),
        }
    }
}
