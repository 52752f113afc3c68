//! Dispatch configuration.
//!
//! Resolved from defaults, then the environment, then explicit overrides
//! (CLI flags), so the CLI and the worker agree on where modules live.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Environment variable naming the modules directory.
pub const MODULES_DIR_ENV: &str = "AOC_MODULES_DIR";
/// Environment variable selecting the isolation flavour.
pub const ISOLATION_ENV: &str = "AOC_ISOLATION";
/// Environment variable pointing at the `aoc-worker` binary.
pub const WORKER_PATH_ENV: &str = "AOC_WORKER_PATH";

/// How execution contexts are isolated from the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    /// Separate `aoc-worker` process, killed on stop.
    #[default]
    Process,
    /// Dedicated thread inside this process, abandoned on stop.
    Thread,
}

impl FromStr for Isolation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(Isolation::Process),
            "thread" => Ok(Isolation::Thread),
            other => Err(Error::Config(format!(
                "unknown isolation mode '{}', expected 'process' or 'thread'",
                other
            ))),
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isolation::Process => write!(f, "process"),
            Isolation::Thread => write!(f, "thread"),
        }
    }
}

/// Settings shared by the coordinator side and the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Directory holding the compiled solver modules.
    pub modules_dir: PathBuf,
    /// Isolation flavour for execution contexts.
    pub isolation: Isolation,
    /// Explicit worker binary; discovered when `None`.
    pub worker_path: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("modules"),
            isolation: Isolation::Process,
            worker_path: None,
        }
    }
}

impl DispatchConfig {
    /// Defaults overlaid with `AOC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup(MODULES_DIR_ENV).filter(|v| !v.is_empty()) {
            config.modules_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup(ISOLATION_ENV).filter(|v| !v.is_empty()) {
            config.isolation = mode.parse()?;
        }
        if let Some(path) = lookup(WORKER_PATH_ENV).filter(|v| !v.is_empty()) {
            config.worker_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }
}
