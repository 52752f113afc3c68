//! In-process execution context.
//!
//! Runs [`ContextRuntime`] on a dedicated thread with its own current-thread
//! tokio runtime. Termination stops the loop and shuts the runtime down in
//! the background; a solver stuck inside `invoke` keeps its blocking thread
//! until it returns, but nothing it produces can reach the coordinator under
//! a live generation. Use the process context when a runaway solver must be
//! reclaimed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::ipc::{Request, Response};
use crate::module::ModuleLoader;
use crate::module::ffi::panic_message;

use super::context::{ContextFactory, Envelope, EventSender, ExecutionContext, Generation};
use super::runtime::ContextRuntime;

/// Spawns [`ThreadContext`]s sharing one loader. Each context gets a fresh cache.
pub struct ThreadContextFactory {
    loader: Arc<dyn ModuleLoader>,
}

impl ThreadContextFactory {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self { loader }
    }
}

impl ContextFactory for ThreadContextFactory {
    fn spawn(
        &self,
        generation: Generation,
        events: EventSender,
    ) -> Result<Box<dyn ExecutionContext>> {
        Ok(Box::new(ThreadContext::spawn(
            Arc::clone(&self.loader),
            generation,
            events,
        )?))
    }
}

/// Execution context living on its own thread.
pub struct ThreadContext {
    generation: Generation,
    mailbox: Option<mpsc::UnboundedSender<Request>>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadContext {
    pub fn spawn(
        loader: Arc<dyn ModuleLoader>,
        generation: Generation,
        events: EventSender,
    ) -> Result<Self> {
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name(format!("solver-context-{}", generation.as_u64()))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_context(loader, generation, events.clone(), mailbox_rx, shutdown_rx)
                }));
                if let Err(payload) = result {
                    let reason = format!("context thread panicked: {}", panic_message(&*payload));
                    tracing::error!("Context {}: {}", generation, reason);
                    let _ = events.send(Envelope::lost(generation, reason));
                }
            })
            .map_err(|e| Error::Spawn(format!("failed to start context thread: {}", e)))?;

        tracing::info!("Started thread context {}", generation);

        Ok(Self {
            generation,
            mailbox: Some(mailbox_tx),
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

fn run_context(
    loader: Arc<dyn ModuleLoader>,
    generation: Generation,
    events: EventSender,
    mailbox: mpsc::UnboundedReceiver<Request>,
    shutdown: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = events.send(Envelope::lost(
                generation,
                format!("failed to build context runtime: {}", e),
            ));
            return;
        }
    };

    runtime.block_on(async move {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_responses(generation, outbox_rx, events));

        let context = ContextRuntime::new(loader, outbox_tx);
        tokio::select! {
            _ = shutdown => tracing::debug!("Context {} terminated", generation),
            _ = context.run(mailbox) => {}
        }
    });

    runtime.shutdown_background();
}

async fn forward_responses(
    generation: Generation,
    mut outbox: mpsc::UnboundedReceiver<Response>,
    events: EventSender,
) {
    while let Some(response) = outbox.recv().await {
        if events.send(Envelope::response(generation, response)).is_err() {
            break;
        }
    }
}

impl ExecutionContext for ThreadContext {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn send(&mut self, request: Request) -> Result<()> {
        let mailbox = self
            .mailbox
            .as_ref()
            .ok_or_else(|| Error::ContextLost(format!("context {} was terminated", self.generation)))?;
        mailbox
            .send(request)
            .map_err(|_| Error::ContextLost(format!("context {} has exited", self.generation)))
    }

    fn terminate(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            tracing::info!("Terminating thread context {}", self.generation);
        }
        self.mailbox = None;
        // The thread is detached; it exits as soon as its loop observes shutdown.
        self.thread = None;
    }

    fn is_alive(&mut self) -> bool {
        self.mailbox.is_some()
            && self
                .thread
                .as_ref()
                .is_some_and(|thread| !thread.is_finished())
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.terminate();
    }
}
