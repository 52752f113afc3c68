//! Worker process management.
//!
//! Provides `WorkerHandle` for spawning and talking to an `aoc-worker`
//! process over its stdin/stdout.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::config::WORKER_PATH_ENV;
use crate::error::{Error, Result};

use super::protocol::{Request, Response, read_message, write_message};

const WORKER_NAME: &str = if cfg!(windows) {
    "aoc-worker.exe"
} else {
    "aoc-worker"
};

/// Handle to a worker process.
pub struct WorkerHandle {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    /// Taken by whoever pumps responses on a separate thread.
    stdout: Option<BufReader<ChildStdout>>,
    killed: bool,
}

impl WorkerHandle {
    /// Spawn a worker serving modules from `modules_dir`.
    ///
    /// Returns as soon as the process is running; the caller sends `init`
    /// and reads `ready` like any other exchange.
    pub fn spawn(worker_path: &Path, modules_dir: &Path) -> Result<Self> {
        let mut child = Command::new(worker_path)
            .arg("--modules-dir")
            .arg(modules_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Let worker logs pass through
            .spawn()
            .map_err(|e| {
                Error::Spawn(format!(
                    "failed to spawn worker process '{}': {}",
                    worker_path.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdout".to_string()))?;

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: Some(BufReader::new(stdout)),
            killed: false,
        })
    }

    /// Locate the `aoc-worker` binary.
    ///
    /// Checked in order:
    /// 1. `explicit` (from configuration)
    /// 2. `AOC_WORKER_PATH` environment variable
    /// 3. Same directory as the current executable
    /// 4. System PATH
    /// 5. `target/{debug,release}` of this workspace (development)
    pub fn find_worker_binary(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(Error::Spawn(format!(
                "configured worker binary {} does not exist",
                path.display()
            )));
        }

        if let Ok(path) = std::env::var(WORKER_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
        }

        if let Ok(exe_path) = std::env::current_exe()
            && let Some(exe_dir) = exe_path.parent()
        {
            let worker_path = exe_dir.join(WORKER_NAME);
            if worker_path.exists() {
                return Ok(worker_path);
            }
        }

        if let Ok(path) = which::which(WORKER_NAME) {
            return Ok(path);
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            for profile in ["debug", "release"] {
                let path = PathBuf::from(&manifest_dir)
                    .join("..")
                    .join("..")
                    .join("target")
                    .join(profile)
                    .join(WORKER_NAME);
                if path.exists() {
                    return Ok(path.canonicalize().unwrap_or(path));
                }
            }
        }

        Err(Error::Spawn(format!(
            "could not find {}. Set {} or ensure it's in PATH.",
            WORKER_NAME, WORKER_PATH_ENV
        )))
    }

    /// Send a request to the worker.
    pub fn send(&mut self, request: &Request) -> Result<()> {
        if self.killed {
            return Err(Error::Ipc("Worker has been killed".to_string()));
        }
        write_message(&mut self.stdin, request)
    }

    /// Receive a response, unless the reader has been taken.
    pub fn recv(&mut self) -> Result<Response> {
        if self.killed {
            return Err(Error::Ipc("Worker has been killed".to_string()));
        }
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| Error::Ipc("Worker stdout is owned by a reader thread".to_string()))?;
        read_message(stdout)
    }

    /// Hand the response stream to a dedicated reader.
    pub fn take_reader(&mut self) -> Option<BufReader<ChildStdout>> {
        self.stdout.take()
    }

    /// Kill the worker process immediately.
    ///
    /// Needs no cooperation from the solver, so a hung `invoke` dies with it.
    pub fn kill(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;

        if let Err(e) = self.child.kill() {
            // InvalidInput means the process already exited
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("Failed to kill worker {}: {}", self.pid(), e);
            }
        }

        // Wait to reap zombie
        let _ = self.child.wait();

        Ok(())
    }

    /// Check if the worker process is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.killed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.kill();
    }
}
