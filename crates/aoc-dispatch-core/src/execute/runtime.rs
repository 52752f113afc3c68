//! The execution context's message loop.
//!
//! Shared by the in-process thread context and the `aoc-worker` process.
//! Requests are handled one at a time in arrival order. Preloads are started
//! as background tasks, so a later run of the same key joins the in-flight
//! load instead of loading twice.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::error::FailureKind;
use crate::ipc::{Request, Response};
use crate::key::SolverKey;
use crate::module::ffi::panic_message;
use crate::module::{ModuleCache, ModuleLoader};

/// Owns a module cache and turns requests into responses.
pub struct ContextRuntime {
    cache: Arc<ModuleCache>,
    outbox: mpsc::UnboundedSender<Response>,
}

impl ContextRuntime {
    pub fn new(loader: Arc<dyn ModuleLoader>, outbox: mpsc::UnboundedSender<Response>) -> Self {
        Self {
            cache: Arc::new(ModuleCache::new(loader)),
            outbox,
        }
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Process requests until the mailbox closes.
    pub async fn run(self, mut mailbox: mpsc::UnboundedReceiver<Request>) {
        while let Some(request) = mailbox.recv().await {
            self.handle(request).await;
        }
        tracing::debug!("Mailbox closed, context loop exiting");
    }

    /// Handle a single request. Must be called within a tokio runtime.
    pub async fn handle(&self, request: Request) {
        match request {
            Request::Init => self.reply(Response::Ready),
            Request::Load { key } => self.preload(key),
            Request::Run { key, input } => {
                let response = self.invoke(key, input).await;
                self.reply(response);
            }
        }
    }

    fn reply(&self, response: Response) {
        if self.outbox.send(response).is_err() {
            tracing::debug!("Outbox closed, dropping response");
        }
    }

    fn preload(&self, key: SolverKey) {
        let cache = Arc::clone(&self.cache);
        let outbox = self.outbox.clone();

        tokio::spawn(async move {
            if let Err(e) = cache.ensure(key).await {
                tracing::warn!("Preload of {} failed: {}", key, e);
                let _ = outbox.send(Response::LoadFailed {
                    key,
                    message: e.to_string(),
                });
            }
        });
    }

    async fn invoke(&self, key: SolverKey, input: String) -> Response {
        let handle = match self.cache.ensure(key).await {
            Ok(handle) => handle,
            Err(e) => {
                return Response::Failed {
                    part: key.part,
                    kind: FailureKind::Load,
                    message: e.to_string(),
                };
            }
        };

        let language = handle.language().to_string();
        tracing::debug!("Invoking {} ({} bytes of input)", key, input.len());

        let started = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || handle.invoke(&input)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(result)) => Response::Solved {
                part: key.part,
                result,
                elapsed_ms,
                language,
            },
            Ok(Err(message)) => Response::Failed {
                part: key.part,
                kind: FailureKind::Runtime,
                message,
            },
            Err(e) => Response::Failed {
                part: key.part,
                kind: FailureKind::Runtime,
                message: if e.is_panic() {
                    format!("solver panicked: {}", panic_message(&*e.into_panic()))
                } else {
                    e.to_string()
                },
            },
        }
    }
}
