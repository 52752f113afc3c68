//! Process-isolated execution context.
//!
//! Each context is an `aoc-worker` process. Requests are written to its
//! stdin; a reader thread pumps responses off its stdout into the shared
//! event channel. Terminating kills the process, so a solver that never
//! returns is reclaimed immediately.

use std::io::BufReader;
use std::path::PathBuf;
use std::process::ChildStdout;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{DispatchConfig, Isolation};
use crate::error::{Error, Result};
use crate::ipc::{Request, Response, WorkerHandle, read_message};
use crate::module::DylibLoader;

use super::context::{ContextFactory, Envelope, EventSender, ExecutionContext, Generation};
use super::thread::ThreadContextFactory;

/// Build the factory matching the configured isolation.
pub fn factory_for(config: &DispatchConfig) -> Result<Box<dyn ContextFactory>> {
    match config.isolation {
        Isolation::Process => Ok(Box::new(ProcessContextFactory::new(config)?)),
        Isolation::Thread => Ok(Box::new(ThreadContextFactory::new(Arc::new(
            DylibLoader::new(&config.modules_dir),
        )))),
    }
}

/// Spawns worker processes.
pub struct ProcessContextFactory {
    worker_path: PathBuf,
    modules_dir: PathBuf,
}

impl ProcessContextFactory {
    /// Resolve the worker binary up front so a missing binary fails early.
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let worker_path = WorkerHandle::find_worker_binary(config.worker_path.as_deref())?;
        tracing::debug!("Using worker binary {}", worker_path.display());
        Ok(Self {
            worker_path,
            modules_dir: config.modules_dir.clone(),
        })
    }
}

impl ContextFactory for ProcessContextFactory {
    fn spawn(
        &self,
        generation: Generation,
        events: EventSender,
    ) -> Result<Box<dyn ExecutionContext>> {
        let context = ProcessContext::spawn(&self.worker_path, &self.modules_dir, generation, events)?;
        Ok(Box::new(context))
    }
}

/// Execution context backed by a worker process.
pub struct ProcessContext {
    generation: Generation,
    worker: WorkerHandle,
    terminated: Arc<AtomicBool>,
}

impl ProcessContext {
    pub fn spawn(
        worker_path: &std::path::Path,
        modules_dir: &std::path::Path,
        generation: Generation,
        events: EventSender,
    ) -> Result<Self> {
        let mut worker = WorkerHandle::spawn(worker_path, modules_dir)?;
        let reader = worker
            .take_reader()
            .ok_or_else(|| Error::Ipc("Worker stdout already taken".to_string()))?;

        let terminated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&terminated);
        std::thread::Builder::new()
            .name(format!("solver-worker-reader-{}", generation.as_u64()))
            .spawn(move || pump_responses(reader, generation, events, flag))
            .map_err(|e| Error::Spawn(format!("failed to start worker reader: {}", e)))?;

        tracing::info!("Started worker {} for context {}", worker.pid(), generation);

        Ok(Self {
            generation,
            worker,
            terminated,
        })
    }

    /// OS process id of the worker.
    pub fn pid(&self) -> u32 {
        self.worker.pid()
    }
}

/// Classify a failed write to the worker.
///
/// An oversized message is refused before any byte reaches the pipe, so the
/// worker is still usable. Every other failure means the pipe is gone.
fn send_failure(generation: Generation, error: Error) -> Error {
    match error {
        Error::MessageTooLarge { .. } => error,
        other => Error::ContextLost(format!("context {}: {}", generation, other)),
    }
}

fn pump_responses(
    mut reader: BufReader<ChildStdout>,
    generation: Generation,
    events: EventSender,
    terminated: Arc<AtomicBool>,
) {
    loop {
        match read_message::<_, Response>(&mut reader) {
            Ok(response) => {
                if events.send(Envelope::response(generation, response)).is_err() {
                    return;
                }
            }
            Err(e) => {
                if !terminated.load(Ordering::SeqCst) {
                    tracing::error!("Worker for context {} lost: {}", generation, e);
                    let _ = events.send(Envelope::lost(generation, e.to_string()));
                }
                return;
            }
        }
    }
}

impl ExecutionContext for ProcessContext {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn send(&mut self, request: Request) -> Result<()> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(Error::ContextLost(format!(
                "context {} was terminated",
                self.generation
            )));
        }
        self.worker
            .send(&request)
            .map_err(|e| send_failure(self.generation, e))
    }

    fn terminate(&mut self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            "Killing worker {} of context {}",
            self.worker.pid(),
            self.generation
        );
        let _ = self.worker.kill();
    }

    fn is_alive(&mut self) -> bool {
        !self.terminated.load(Ordering::SeqCst) && self.worker.is_alive()
    }
}

impl Drop for ProcessContext {
    fn drop(&mut self) {
        self.terminate();
    }
}
