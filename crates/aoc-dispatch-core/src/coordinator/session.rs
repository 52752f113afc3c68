//! The session's single live execution context.

use crate::error::{Error, Result};
use crate::execute::{ContextFactory, EventSender, ExecutionContext, Generation};
use crate::ipc::Request;

/// Owns at most one live context and the generation counter.
///
/// Replacement spawns the successor before swapping it in, then destroys
/// the predecessor. Anything the predecessor still emits carries a
/// generation that no longer matches [`Session::live_generation`].
pub struct Session<F> {
    factory: F,
    events: EventSender,
    context: Option<Box<dyn ExecutionContext>>,
    next_generation: Generation,
    closed: bool,
}

impl<F: ContextFactory> Session<F> {
    pub fn new(factory: F, events: EventSender) -> Self {
        Self {
            factory,
            events,
            context: None,
            next_generation: Generation::FIRST,
            closed: false,
        }
    }

    pub fn live_generation(&self) -> Option<Generation> {
        self.context.as_ref().map(|context| context.generation())
    }

    pub fn is_live(&self, generation: Generation) -> bool {
        self.live_generation() == Some(generation)
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    fn spawn(&mut self) -> Result<Box<dyn ExecutionContext>> {
        if self.closed {
            return Err(Error::InvalidOperation("session has ended".to_string()));
        }

        let generation = self.next_generation;
        self.next_generation = generation.next();

        let mut context = self.factory.spawn(generation, self.events.clone())?;
        context.send(Request::Init)?;
        Ok(context)
    }

    /// Spawn a context if none is live.
    pub fn ensure_context(&mut self) -> Result<&mut (dyn ExecutionContext + 'static)> {
        if self.context.is_none() {
            let context = self.spawn()?;
            self.context = Some(context);
        }
        self.context
            .as_deref_mut()
            .ok_or_else(|| Error::ContextLost("no live context".to_string()))
    }

    /// Send to the live context, spawning one first if needed.
    ///
    /// A context that refuses the message is dropped, so the next call
    /// starts a fresh one.
    pub fn send(&mut self, request: Request) -> Result<()> {
        let result = self.ensure_context()?.send(request);
        if let Err(Error::ContextLost(reason)) = &result {
            tracing::warn!("Dropping unreachable context: {}", reason);
            self.teardown();
        }
        result
    }

    /// Destroy the live context and start its successor.
    ///
    /// The old context is destroyed even when the spawn fails; the session
    /// is then left without a context until the next [`send`](Self::send).
    pub fn respawn(&mut self) -> Result<()> {
        let successor = self.spawn();
        let previous = match successor {
            Ok(context) => {
                tracing::info!("Swapping in context {}", context.generation());
                self.context.replace(context)
            }
            Err(e) => {
                tracing::error!("Failed to respawn execution context: {}", e);
                self.teardown();
                return Err(e);
            }
        };

        if let Some(mut previous) = previous {
            previous.terminate();
        }
        Ok(())
    }

    /// Destroy the live context without replacing it.
    pub fn teardown(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.terminate();
        }
    }

    /// End the session. Every later spawn is refused.
    pub fn close(&mut self) {
        self.closed = true;
        self.teardown();
    }
}

impl<F> Drop for Session<F> {
    fn drop(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.terminate();
        }
    }
}
